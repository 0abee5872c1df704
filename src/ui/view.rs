use crate::theme::Palette;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Leave the current page, back to the dashboard
  Pop,
  /// Replace the stack with the view for this path, through the route guard
  Navigate(String),
}

/// Trait for view behavior
///
/// Views handle their own input modes (filter, forms) and return actions for
/// the App to execute: App → View → Components.
///
/// Views that load data asynchronously use Query<T> internally and poll it
/// in tick().
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette);

  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to allow views to poll async queries
  fn tick(&mut self) {}

  /// Whether a text field has focus; global single-key shortcuts are off then
  fn captures_input(&self) -> bool {
    false
  }

  /// Keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
