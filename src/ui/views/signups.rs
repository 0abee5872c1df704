use crate::context::AppContext;
use crate::data::signups;
use crate::models::{PendingSignup, SignupStatus};
use crate::query::Query;
use crate::router::Route;
use crate::theme::Palette;
use crate::ui::renderfns::{local_time, signup_status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{ensure_valid_selection, mutation, placeholder, poll_mutation, titled_block};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use std::sync::Arc;

/// Admin queue of signups waiting for approval
pub struct SignupsView {
  ctx: Arc<AppContext>,
  query: Query<Vec<PendingSignup>>,
  list_state: ListState,
  pending: Option<Query<String>>,
  status: Option<String>,
}

impl SignupsView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let fetch_ctx = ctx.clone();
    let mut query = Query::new(move || {
      let ctx = fetch_ctx.clone();
      async move {
        signups::list_pending_signups(ctx.remote.as_ref())
          .await
          .into_result()
          .map_err(|e| e.to_string())
      }
    });
    query.fetch();
    Self {
      ctx,
      query,
      list_state: ListState::default(),
      pending: None,
      status: None,
    }
  }

  fn rows(&self) -> &[PendingSignup] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn review(&mut self, decision: SignupStatus) {
    let Some(signup) = self.list_state.selected().and_then(|i| self.rows().get(i)) else {
      return;
    };
    let (id, email) = (signup.id, signup.email.clone());
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let email = email.clone();
      async move {
        let reviewer = ctx.user_id().map_err(|e| e.to_string())?;
        let reviewed = signups::review_signup(ctx.remote.as_ref(), &reviewer, id, decision)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("{} {}", reviewed.status, email))
      }
    }));
  }
}

impl View for SignupsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('a') => self.review(SignupStatus::Approved),
      KeyCode::Char('x') => self.review(SignupStatus::Rejected),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let len = self.rows().len();
    ensure_valid_selection(&mut self.list_state, len);
    let block = titled_block("Pending signups", &self.query, Some(len), palette);

    if len == 0 {
      let text = if self.query.is_error() {
        "Failed to load signups. Press 'r' to retry."
      } else if self.query.is_loading() {
        "Loading..."
      } else {
        "No signups waiting for review."
      };
      placeholder(frame, chunks[0], block, text, palette);
    } else {
      let items: Vec<ListItem> = self
        .rows()
        .iter()
        .map(|s| {
          ListItem::new(Line::from(vec![
            Span::styled(
              format!("{:<18}", local_time(s.requested_at)),
              Style::default().fg(palette.muted),
            ),
            Span::styled(format!("{:<32}", truncate(&s.email, 32)), Style::default().fg(palette.text)),
            Span::raw(format!("{:<24}", truncate(s.full_name.as_deref().unwrap_or("-"), 24))),
            Span::styled(
              s.status.to_string(),
              Style::default().fg(signup_status_color(s.status, palette)),
            ),
          ]))
        })
        .collect();
      let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(palette.highlight_bg).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
      frame.render_stateful_widget(list, chunks[0], &mut self.list_state);
    }

    if let Some(status) = &self.status {
      frame.render_widget(
        Paragraph::new(format!(" {}", status)).style(Style::default().fg(palette.muted)),
        chunks[1],
      );
    }
  }

  fn breadcrumb_label(&self) -> String {
    Route::AdminSignups.title().to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.status = Some(message);
        self.query.refetch();
      }
      Some(Err(e)) => self.status = Some(e),
      None => {}
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("a", "approve"),
      ShortcutInfo::new("x", "reject"),
      ShortcutInfo::new("r", "refresh"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::tables;
  use crate::context::tests::harness;
  use crossterm::event::KeyModifiers;
  use serde_json::json;

  async fn settle(view: &mut SignupsView) {
    for _ in 0..20 {
      tokio::task::yield_now().await;
      view.tick();
    }
  }

  #[tokio::test]
  async fn test_approve_removes_from_queue() {
    let h = harness();
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    h.remote.seed(
      tables::PENDING_SIGNUPS,
      vec![json!({
        "id": "6a2f1c1e-0000-4000-8000-000000000001",
        "email": "bob@example.com",
        "status": "pending",
        "requested_at": "2026-01-02T10:00:00Z",
      })],
    );

    let mut view = SignupsView::new(h.ctx.clone());
    settle(&mut view).await;
    assert_eq!(view.rows().len(), 1);
    view.list_state.select(Some(0));

    view.handle_key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
    settle(&mut view).await;
    assert_eq!(view.status.as_deref(), Some("approved bob@example.com"));
    assert!(view.rows().is_empty());
  }
}
