use super::{opt_parse, opt_text, CachedQuery};
use crate::backend::tables;
use crate::context::AppContext;
use crate::data::{activities, parse_local_datetime, DateRange};
use crate::models::{ActivityCategory, ActivityDraft, HealthActivity};
use crate::query::Query;
use crate::router::Route;
use crate::theme::Palette;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::{local_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{ensure_valid_selection, mutation, placeholder, poll_mutation, titled_block};
use chrono::{Duration, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use std::sync::Arc;

const SCHEDULE_DAYS: i64 = 14;

/// Scheduled wellness activities for the next two weeks
pub struct ActivitiesView {
  ctx: Arc<AppContext>,
  list: CachedQuery<Vec<HealthActivity>>,
  list_state: ListState,
  form: Option<Form>,
  pending: Option<Query<String>>,
  status: Option<String>,
}

fn schedule_range() -> DateRange {
  let today = Utc::now().date_naive();
  DateRange::new(today, today + Duration::days(SCHEDULE_DAYS))
}

impl ActivitiesView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let fetch_ctx = ctx.clone();
    let list = CachedQuery::new(move || {
      let ctx = fetch_ctx.clone();
      async move { ctx.activities(schedule_range()).await }
    });
    Self {
      ctx,
      list,
      list_state: ListState::default(),
      form: None,
      pending: None,
      status: None,
    }
  }

  fn rows(&self) -> &[HealthActivity] {
    self.list.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&HealthActivity> {
    self.rows().get(self.list_state.selected()?)
  }

  fn new_form() -> Form {
    Form::new("Schedule activity")
      .field("Title", "")
      .prefilled(
        "Category",
        "meditation, stretching, walk, hydration, medication, other",
        "other",
      )
      .field("When", "YYYY-MM-DD HH:MM or HH:MM today")
      .field("Minutes", "optional")
      .prefilled("Remind before", "minutes, empty for no reminder", "15")
      .field("Notes", "optional")
  }

  fn draft_from(values: &[String]) -> Result<ActivityDraft, String> {
    let [title, category, when, minutes, remind, notes] = values else {
      return Err("Form is incomplete".to_string());
    };
    if when.trim().is_empty() {
      return Err("When is required".to_string());
    }
    let draft = ActivityDraft {
      title: title.trim().to_string(),
      category: category
        .trim()
        .parse::<ActivityCategory>()
        .map_err(|e| e.to_string())?,
      scheduled_at: parse_local_datetime(when).map_err(|e| e.to_string())?,
      duration_minutes: opt_parse(minutes, "Minutes")?,
      remind_before: opt_parse(remind, "Remind before")?,
      notes: opt_text(notes),
    };
    draft.validate().map_err(|e| e.to_string())?;
    Ok(draft)
  }

  fn submit(&mut self, values: Vec<String>) {
    let Some(form) = self.form.as_mut() else {
      return;
    };
    let draft = match Self::draft_from(&values) {
      Ok(draft) => draft,
      Err(e) => return form.set_error(e),
    };
    form.set_busy(true);
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let draft = draft.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        let activity = activities::create_activity(ctx.remote.as_ref(), &user_id, draft)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!(
          "Scheduled {} for {}",
          activity.title,
          local_time(activity.scheduled_at)
        ))
      }
    }));
  }

  fn toggle_completed(&mut self) {
    let Some(activity) = self.selected() else {
      return;
    };
    let (id, completed) = (activity.id, !activity.completed);
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        let activity =
          activities::complete_activity(ctx.remote.as_ref(), &user_id, id, completed)
            .await
            .into_result()
            .map_err(|e| e.to_string())?;
        let verb = if activity.completed { "Completed" } else { "Reopened" };
        Ok(format!("{} {}", verb, activity.title))
      }
    }));
  }

  fn delete_selected(&mut self) {
    let Some(activity) = self.selected() else {
      return;
    };
    let (id, title) = (activity.id, activity.title.clone());
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let title = title.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        activities::delete_activity(ctx.remote.as_ref(), &user_id, id)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("Deleted {}", title))
      }
    }));
  }

  fn item(activity: &HealthActivity, palette: &Palette) -> ListItem<'static> {
    let (mark, mark_color) = if activity.completed {
      ("✓", palette.good)
    } else {
      ("·", palette.muted)
    };
    let reminder = match (activity.reminder_time, activity.reminder_sent) {
      (Some(_), true) => "reminded".to_string(),
      (Some(at), false) => format!("remind {}", at.with_timezone(&chrono::Local).format("%H:%M")),
      (None, _) => String::new(),
    };
    let minutes = activity
      .duration_minutes
      .map(|m| format!("{} min", m))
      .unwrap_or_default();
    let title_style = if activity.completed {
      Style::default().fg(palette.muted).add_modifier(Modifier::CROSSED_OUT)
    } else {
      Style::default().fg(palette.text)
    };
    ListItem::new(Line::from(vec![
      Span::styled(format!("{} ", mark), Style::default().fg(mark_color)),
      Span::styled(
        format!("{:<18}", local_time(activity.scheduled_at)),
        Style::default().fg(palette.muted),
      ),
      Span::styled(format!("{:<26}", truncate(&activity.title, 26)), title_style),
      Span::styled(
        format!("{:<12}", activity.category.to_string()),
        Style::default().fg(palette.accent),
      ),
      Span::raw(format!("{:<8}", minutes)),
      Span::styled(reminder, Style::default().fg(palette.warn)),
    ]))
  }
}

impl View for ActivitiesView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit(values),
        _ => {}
      }
      return ViewAction::None;
    }
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('c') | KeyCode::Enter => self.toggle_completed(),
      KeyCode::Char('a') => self.form = Some(Self::new_form()),
      KeyCode::Char('d') => self.delete_selected(),
      KeyCode::Char('r') => {
        self.ctx.invalidate(tables::HEALTH_ACTIVITIES);
        self.list.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let len = self.rows().len();
    ensure_valid_selection(&mut self.list_state, len);
    let label = format!("Next {} days{}", SCHEDULE_DAYS, self.list.freshness());
    let block = titled_block(&label, self.list.query(), Some(len), palette);
    if len == 0 {
      let text = if self.list.query().is_error() {
        "Failed to load activities. Press 'r' to retry."
      } else if self.list.query().is_loading() {
        "Loading..."
      } else {
        "Nothing scheduled. Press 'a' to plan an activity."
      };
      placeholder(frame, chunks[0], block, text, palette);
    } else {
      let items: Vec<ListItem> = self.rows().iter().map(|a| Self::item(a, palette)).collect();
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
    if let Some(form) = &self.form {
      form.render_popup(frame, area, palette);
    }
  }

  fn breadcrumb_label(&self) -> String {
    Route::Activities.title().to_string()
  }

  fn tick(&mut self) {
    self.list.tick();
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.form = None;
        self.status = Some(message);
        self.ctx.invalidate(tables::HEALTH_ACTIVITIES);
        self.list.refetch();
      }
      Some(Err(e)) => match self.form.as_mut() {
        Some(form) => form.set_error(e),
        None => self.status = Some(e),
      },
      None => {}
    }
  }

  fn captures_input(&self) -> bool {
    self.form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("c", "done"),
      ShortcutInfo::new("a", "add"),
      ShortcutInfo::new("d", "delete"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn values(v: [&str; 6]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_reminder_offset_from_form() {
    let draft = ActivitiesView::draft_from(&values([
      "Breathing",
      "meditation",
      "2030-01-05 08:00",
      "10",
      "15",
      "",
    ]))
    .unwrap();
    assert_eq!(draft.category, ActivityCategory::Meditation);
    assert_eq!(draft.remind_before, Some(15));
    let activity = draft.into_activity("u1");
    assert_eq!(
      activity.scheduled_at - activity.reminder_time.unwrap(),
      Duration::minutes(15)
    );
  }

  #[tokio::test]
  async fn test_renders_scheduled_activities() {
    let h = crate::context::tests::harness();
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    let draft = ActivityDraft {
      title: "Evening stretch".into(),
      category: ActivityCategory::Stretching,
      scheduled_at: Utc::now() + Duration::hours(2),
      duration_minutes: Some(15),
      remind_before: Some(10),
      notes: None,
    };
    activities::create_activity(h.ctx.remote.as_ref(), "u1", draft)
      .await
      .into_result()
      .unwrap();

    let mut view = ActivitiesView::new(h.ctx.clone());
    for _ in 0..20 {
      tokio::task::yield_now().await;
      view.tick();
    }
    assert_eq!(view.rows().len(), 1);

    let palette = crate::theme::Theme::Dark.palette();
    let mut terminal = Terminal::new(ratatui::backend::TestBackend::new(100, 8)).unwrap();
    terminal
      .draw(|frame| view.render(frame, frame.area(), &palette))
      .unwrap();
    let screen: String = terminal
      .backend()
      .buffer()
      .content
      .iter()
      .map(|cell| cell.symbol())
      .collect();
    assert!(screen.contains("Evening stretch"));
    assert_eq!(view.list_state.selected(), Some(0));
  }

  #[test]
  fn test_when_is_required() {
    let err = ActivitiesView::draft_from(&values(["Walk", "walk", " ", "", "", ""])).unwrap_err();
    assert_eq!(err, "When is required");
    assert!(ActivitiesView::draft_from(&values(["Walk", "juggling", "08:00", "", "", ""])).is_err());
  }
}
