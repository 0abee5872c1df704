use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Query changed (on each keystroke, empty string on cancel)
  Changed(String),
  /// Overlay closed, filter persists
  Submitted,
}

/// `/` filter for list views
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> String {
    self.input.value()
  }

  /// Case-insensitive match of the current query against `haystack`
  pub fn matches(&self, haystack: &str) -> bool {
    if self.input.is_empty() {
      return true;
    }
    haystack.to_lowercase().contains(&self.query().to_lowercase())
  }

  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.active = true;
        self.input.clear();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => KeyResult::Event(SearchEvent::Changed(self.input.value())),
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    if !self.active {
      return;
    }
    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width.saturating_sub(1), 3.min(area.height));

    frame.render_widget(Clear, overlay_area);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.warn))
      .title(" Filter ");
    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);
    if inner.height == 0 {
      return;
    }

    let line = Line::from(vec![
      Span::styled("/", Style::default().fg(palette.warn)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(palette.warn)),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_filter_persists_after_submit() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('R')));
    search.handle_key(key(KeyCode::Char('u')));
    assert_eq!(search.handle_key(key(KeyCode::Enter)), KeyResult::Event(SearchEvent::Submitted));
    assert!(search.matches("Morning run"));
    assert!(!search.matches("Yoga"));
  }

  #[test]
  fn test_cancel_clears_filter() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('x')));
    search.handle_key(key(KeyCode::Esc));
    assert!(search.matches("anything"));
  }
}
