use crate::theme::Palette;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const TOAST_TTL: Duration = Duration::from_secs(6);
const MAX_TOASTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
  Info,
  Success,
  Error,
}

#[derive(Debug, Clone)]
struct Toast {
  title: String,
  body: String,
  level: ToastLevel,
  shown_at: Instant,
}

/// Short-lived messages stacked in the bottom-right corner
#[derive(Debug, Default)]
pub struct Toasts {
  queue: VecDeque<Toast>,
}

impl Toasts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, level: ToastLevel, title: impl Into<String>, body: impl Into<String>) {
    if self.queue.len() == MAX_TOASTS {
      self.queue.pop_front();
    }
    self.queue.push_back(Toast {
      title: title.into(),
      body: body.into(),
      level,
      shown_at: Instant::now(),
    });
  }

  pub fn info(&mut self, title: impl Into<String>) {
    self.push(ToastLevel::Info, title, "");
  }

  pub fn error(&mut self, title: impl Into<String>) {
    self.push(ToastLevel::Error, title, "");
  }

  /// Drop expired toasts
  pub fn tick(&mut self) {
    self.queue.retain(|t| t.shown_at.elapsed() < TOAST_TTL);
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  pub fn render(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let width = 44.min(area.width);
    let mut bottom = area.y + area.height;
    for toast in self.queue.iter().rev() {
      let height = if toast.body.is_empty() { 3 } else { 4 };
      if bottom < area.y + height {
        break;
      }
      bottom -= height;
      let rect = Rect::new(area.x + area.width - width, bottom, width, height);
      let color = match toast.level {
        ToastLevel::Info => palette.accent,
        ToastLevel::Success => palette.good,
        ToastLevel::Error => palette.bad,
      };
      let mut lines = vec![Line::from(Span::styled(
        toast.title.clone(),
        Style::default().fg(color).bold(),
      ))];
      if !toast.body.is_empty() {
        lines.push(Line::from(Span::styled(
          toast.body.clone(),
          Style::default().fg(palette.text),
        )));
      }
      frame.render_widget(Clear, rect);
      frame.render_widget(
        Paragraph::new(lines)
          .wrap(Wrap { trim: true })
          .block(
            Block::default()
              .borders(Borders::ALL)
              .border_style(Style::default().fg(color)),
          ),
        rect,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_oldest_dropped_when_full() {
    let mut toasts = Toasts::new();
    for i in 0..5 {
      toasts.info(format!("t{}", i));
    }
    assert_eq!(toasts.len(), MAX_TOASTS);
    assert_eq!(toasts.queue.front().unwrap().title, "t2");
  }

  #[test]
  fn test_fresh_toasts_survive_tick() {
    let mut toasts = Toasts::new();
    toasts.error("boom");
    toasts.tick();
    assert_eq!(toasts.len(), 1);
  }
}
