use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Enter pressed; values in field order
  Submitted(Vec<String>),
  Cancelled,
}

#[derive(Debug, Clone)]
struct Field {
  label: &'static str,
  hint: &'static str,
  input: TextInput,
}

/// A stack of labelled text inputs with an inline error line.
///
/// Tab and the arrow keys move between fields; Enter submits the whole form.
#[derive(Debug, Clone)]
pub struct Form {
  title: String,
  fields: Vec<Field>,
  focus: usize,
  error: Option<String>,
  busy: bool,
}

impl Form {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      fields: Vec::new(),
      focus: 0,
      error: None,
      busy: false,
    }
  }

  pub fn field(mut self, label: &'static str, hint: &'static str) -> Self {
    self.fields.push(Field {
      label,
      hint,
      input: TextInput::new(),
    });
    self
  }

  pub fn prefilled(mut self, label: &'static str, hint: &'static str, value: &str) -> Self {
    self.fields.push(Field {
      label,
      hint,
      input: TextInput::with_value(value),
    });
    self
  }

  pub fn secret(mut self, label: &'static str) -> Self {
    self.fields.push(Field {
      label,
      hint: "",
      input: TextInput::masked(),
    });
    self
  }

  pub fn values(&self) -> Vec<String> {
    self.fields.iter().map(|f| f.input.value()).collect()
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn set_error(&mut self, error: impl Into<String>) {
    self.error = Some(error.into());
    self.busy = false;
  }

  /// Mark a submission as running; keys are ignored until it finishes
  pub fn set_busy(&mut self, busy: bool) {
    self.busy = busy;
    if busy {
      self.error = None;
    }
  }

  pub fn is_busy(&self) -> bool {
    self.busy
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if self.busy {
      return KeyResult::Handled;
    }
    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancelled),
      KeyCode::Enter => return KeyResult::Event(FormEvent::Submitted(self.values())),
      KeyCode::Tab | KeyCode::Down => {
        if !self.fields.is_empty() {
          self.focus = (self.focus + 1) % self.fields.len();
        }
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        if !self.fields.is_empty() {
          self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
        return KeyResult::Handled;
      }
      _ => {}
    }
    let Some(field) = self.fields.get_mut(self.focus) else {
      return KeyResult::NotHandled;
    };
    match field.input.handle_key(key) {
      InputResult::Consumed => KeyResult::Handled,
      _ => KeyResult::NotHandled,
    }
  }

  /// Draw as a centered popup over `area`
  pub fn render_popup(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let height = (self.fields.len() as u16 * 2 + 4).min(area.height);
    let width = (area.width * 70 / 100).clamp(40.min(area.width), 80);
    let popup = Rect::new(
      area.x + area.width.saturating_sub(width) / 2,
      area.y + area.height.saturating_sub(height) / 2,
      width,
      height,
    );
    frame.render_widget(Clear, popup);
    self.render(frame, popup, palette);
  }

  pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let title = if self.is_busy() {
      format!(" {} (working...) ", self.title)
    } else {
      format!(" {} ", self.title)
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label_width = self.fields.iter().map(|f| f.label.len()).max().unwrap_or(0) + 2;
    let mut lines = Vec::new();
    for (i, field) in self.fields.iter().enumerate() {
      let focused = i == self.focus;
      let label_style = if focused {
        Style::default().fg(palette.accent).bold()
      } else {
        Style::default().fg(palette.text)
      };
      let shown: Vec<char> = field.input.display().chars().collect();
      let at = field.input.cursor_position().min(shown.len());
      let text = Style::default().fg(palette.text);
      let mut spans = vec![
        Span::styled(format!("{:<w$}", field.label, w = label_width), label_style),
        Span::styled(shown[..at].iter().collect::<String>(), text),
      ];
      if focused {
        spans.push(Span::styled("_", Style::default().fg(palette.accent)));
      }
      spans.push(Span::styled(shown[at..].iter().collect::<String>(), text));
      lines.push(Line::from(spans));
      lines.push(Line::from(Span::styled(
        format!("{:<w$}{}", "", field.hint, w = label_width),
        Style::default().fg(palette.muted),
      )));
    }
    if let Some(error) = self.error() {
      lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(palette.bad))));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(form: &mut Form, s: &str) {
    for c in s.chars() {
      form.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_tab_and_submit_collects_values() {
    let mut form = Form::new("Sign in").field("Email", "").secret("Password");
    type_str(&mut form, "a@b.co");
    form.handle_key(key(KeyCode::Tab));
    type_str(&mut form, "hunter22");
    let result = form.handle_key(key(KeyCode::Enter));
    assert_eq!(
      result,
      KeyResult::Event(FormEvent::Submitted(vec!["a@b.co".into(), "hunter22".into()]))
    );
  }

  #[test]
  fn test_busy_ignores_keys_and_error_clears_busy() {
    let mut form = Form::new("x").field("A", "");
    form.set_busy(true);
    type_str(&mut form, "abc");
    assert_eq!(form.values(), vec![String::new()]);

    form.set_error("nope");
    assert!(!form.is_busy());
    assert_eq!(form.error(), Some("nope"));
  }

  #[test]
  fn test_prefilled_field() {
    let form = Form::new("Profile").prefilled("Weight", "kg", "70");
    assert_eq!(form.values(), vec!["70".to_string()]);
  }
}
