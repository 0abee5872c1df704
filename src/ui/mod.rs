pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use crate::query::{Query, QueryState};
use crate::theme::Palette;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, ListState, Paragraph, Wrap};
use std::future::Future;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let palette = app.palette();
  let chunks = Layout::vertical([
    Constraint::Length(1), // Header
    Constraint::Min(1),    // Main content
    Constraint::Length(1), // Footer
  ])
  .split(frame.area());

  let shortcuts = app.shortcuts();
  let user = app.user_email();
  renderfns::draw_header(
    frame,
    chunks[0],
    app.header_title(),
    user.as_deref(),
    &shortcuts,
    &palette,
  );

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1], &palette);
  }

  let breadcrumb = app.view_breadcrumb();
  renderfns::draw_footer(frame, chunks[2], &breadcrumb, app.theme().as_str(), &palette);

  app.command_input().render_overlay(frame, chunks[1], &palette);
  app.toasts().render(frame, chunks[1], &palette);
}

/// Keep the list selection inside `len` items (or clear it when empty)
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    _ => {}
  }
}

/// Bordered block titled with the query state, e.g. " Workouts (12) "
pub fn titled_block<'a, T>(
  label: &str,
  query: &Query<T>,
  count: Option<usize>,
  palette: &Palette,
) -> Block<'a> {
  let title = match query.state() {
    QueryState::Loading => format!(" {} (loading...) ", label),
    QueryState::Error(e) => format!(" {} (error: {}) ", label, e),
    _ => match count {
      Some(n) => format!(" {} ({}) ", label, n),
      None => format!(" {} ", label),
    },
  };
  Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(palette.border))
}

/// Dimmed message inside `block`
pub fn placeholder(frame: &mut Frame, area: Rect, block: Block, text: &str, palette: &Palette) {
  let paragraph = Paragraph::new(text.to_string())
    .block(block)
    .wrap(Wrap { trim: true })
    .style(Style::default().fg(palette.muted));
  frame.render_widget(paragraph, area);
}

/// Start a one-shot write. It is polled like any other query and resolves to
/// the message to show on success.
pub fn mutation<F, Fut>(run: F) -> Query<String>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<String, String>> + Send + 'static,
{
  let mut query = Query::new(run);
  query.fetch();
  query
}

/// Poll a pending write. Returns its result once, when it finishes.
pub fn poll_mutation(pending: &mut Option<Query<String>>) -> Option<Result<String, String>> {
  let query = pending.as_mut()?;
  if !query.poll() {
    return None;
  }
  let result = match query.state() {
    QueryState::Success(msg) => Ok(msg.clone()),
    QueryState::Error(e) => Err(e.clone()),
    _ => return None,
  };
  *pending = None;
  Some(result)
}
