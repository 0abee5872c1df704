use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crate::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

/// Events emitted by command input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// Command submitted
  Submitted(String),
  /// Command cancelled
  Cancelled,
}

/// Command palette opened with `:`, with autocomplete over [`commands::COMMANDS`]
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.input.value())
  }

  /// Handle a key event
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.active = false;
        self.input.clear();
        self.selected_suggestion = 0;
        return KeyResult::Event(CommandEvent::Cancelled);
      }
      KeyCode::Enter => {
        self.active = false;
        let cmd = self.resolve_command();
        self.input.clear();
        self.selected_suggestion = 0;
        return KeyResult::Event(CommandEvent::Submitted(cmd));
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = self.suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = self.suggestions().len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.input.handle_key(key) {
      InputResult::Consumed => {
        self.selected_suggestion = 0;
        KeyResult::Handled
      }
      InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
      // Swallow everything else while the palette is open
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// The highlighted suggestion, or the raw input when nothing matches
  fn resolve_command(&self) -> String {
    match self.suggestions().get(self.selected_suggestion) {
      Some(cmd) => cmd.name.to_string(),
      None => self.input.value().trim().to_lowercase(),
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let shown = suggestions.len().min(8) as u16;
    let height = (3 + shown).min(area.height);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width.saturating_sub(1), height);

    frame.render_widget(Clear, overlay_area);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.warn))
      .title(" Command ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);
    if inner.height == 0 {
      return;
    }

    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(inner);

    let input_line = Line::from(vec![
      Span::styled(":", Style::default().fg(palette.warn)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(palette.warn)),
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    if suggestions.is_empty() || chunks[1].height == 0 {
      return;
    }
    let items: Vec<ListItem> = suggestions
      .iter()
      .take(8)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(palette.accent)),
          Span::styled(cmd.description, Style::default().fg(palette.muted)),
        ]))
      })
      .collect();
    let list = List::new(items).highlight_style(
      Style::default()
        .bg(palette.highlight_bg)
        .fg(palette.text),
    );
    let mut state = ListState::default();
    state.select(Some(self.selected_suggestion));
    frame.render_stateful_widget(list, chunks[1], &mut state);
  }
}
