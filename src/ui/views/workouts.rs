use super::{opt_parse, opt_text, required, CachedQuery};
use crate::backend::tables;
use crate::context::AppContext;
use crate::data::{parse_local_datetime, workouts, DateRange};
use crate::models::{Intensity, Workout, WorkoutDraft};
use crate::query::Query;
use crate::router::Route;
use crate::theme::Palette;
use crate::ui::components::{Form, FormEvent, KeyResult, SearchInput};
use crate::ui::renderfns::{intensity_color, local_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{ensure_valid_selection, mutation, placeholder, poll_mutation, titled_block};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use std::sync::Arc;

const HISTORY_DAYS: u32 = 30;

/// Workout log for the last month
pub struct WorkoutsView {
  ctx: Arc<AppContext>,
  list: CachedQuery<Vec<Workout>>,
  list_state: ListState,
  search: SearchInput,
  form: Option<Form>,
  pending: Option<Query<String>>,
  status: Option<String>,
}

impl WorkoutsView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let fetch_ctx = ctx.clone();
    let list = CachedQuery::new(move || {
      let ctx = fetch_ctx.clone();
      async move {
        let range = DateRange::last_days(HISTORY_DAYS, Utc::now().date_naive());
        ctx.workouts(range).await
      }
    });
    Self {
      ctx,
      list,
      list_state: ListState::default(),
      search: SearchInput::new(),
      form: None,
      pending: None,
      status: None,
    }
  }

  fn visible(&self) -> Vec<&Workout> {
    self
      .list
      .data()
      .map(|rows| {
        rows
          .iter()
          .filter(|w| {
            self.search.matches(&w.workout_type)
              || w.notes.as_deref().is_some_and(|n| self.search.matches(n))
          })
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected(&self) -> Option<Workout> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).map(|w| (*w).clone())
  }

  fn new_form() -> Form {
    Form::new("Log workout")
      .field("Type", "e.g. Run, Cycling, Strength")
      .field("Minutes", "")
      .field("Calories", "optional")
      .prefilled("Intensity", "low, moderate or high", "moderate")
      .field("When", "YYYY-MM-DD HH:MM, empty for now")
      .field("Notes", "optional")
  }

  fn draft_from(values: &[String]) -> Result<WorkoutDraft, String> {
    let [kind, minutes, calories, intensity, when, notes] = values else {
      return Err("Form is incomplete".to_string());
    };
    let performed_at = match when.trim() {
      "" => Utc::now(),
      raw => parse_local_datetime(raw).map_err(|e| e.to_string())?,
    };
    let draft = WorkoutDraft {
      workout_type: kind.trim().to_string(),
      duration_minutes: required(minutes, "Minutes")?,
      calories_burned: opt_parse(calories, "Calories")?,
      intensity: intensity.parse::<Intensity>().map_err(|e| e.to_string())?,
      notes: opt_text(notes),
      performed_at,
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
        let workout = workouts::create_workout(ctx.remote.as_ref(), &user_id, draft)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("Logged {} ({} min)", workout.workout_type, workout.duration_minutes))
      }
    }));
  }

  fn delete_selected(&mut self) {
    let Some(workout) = self.selected() else {
      return;
    };
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let workout = workout.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        workouts::delete_workout(ctx.remote.as_ref(), &user_id, workout.id)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("Deleted {}", workout.workout_type))
      }
    }));
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);
    let label = format!("Workouts · last {} days{}", HISTORY_DAYS, self.list.freshness());
    let block = titled_block(&label, self.list.query(), Some(len), palette);

    if len == 0 {
      let text = if self.list.query().is_error() {
        "Failed to load workouts. Press 'r' to retry."
      } else if self.list.query().is_loading() {
        "Loading..."
      } else {
        "No workouts yet. Press 'a' to log one."
      };
      placeholder(frame, area, block, text, palette);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|w| {
        let calories = w
          .calories_burned
          .map(|c| format!("{} kcal", c))
          .unwrap_or_default();
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<18}", local_time(w.performed_at)),
            Style::default().fg(palette.muted),
          ),
          Span::styled(
            format!("{:<16}", truncate(&w.workout_type, 16)),
            Style::default().fg(palette.accent),
          ),
          Span::raw(format!("{:>4} min  ", w.duration_minutes)),
          Span::styled(
            format!("{:<9}", w.intensity.to_string()),
            Style::default().fg(intensity_color(w.intensity, palette)),
          ),
          Span::raw(format!("{:>9}  ", calories)),
          Span::styled(
            truncate(w.notes.as_deref().unwrap_or(""), 40),
            Style::default().fg(palette.muted),
          ),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(palette.highlight_bg)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for WorkoutsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit(values),
        _ => {}
      }
      return ViewAction::None;
    }
    if self.search.handle_key(key).consumed() {
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => {
        self.ctx.invalidate(tables::WORKOUTS);
        self.list.refetch();
      }
      KeyCode::Char('a') => self.form = Some(Self::new_form()),
      KeyCode::Char('d') => self.delete_selected(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    self.render_list(frame, chunks[0], palette);
    if let Some(status) = &self.status {
      frame.render_widget(
        Paragraph::new(format!(" {}", status)).style(Style::default().fg(palette.muted)),
        chunks[1],
      );
    }
    self.search.render_overlay(frame, chunks[0], palette);
    if let Some(form) = &self.form {
      form.render_popup(frame, area, palette);
    }
  }

  fn breadcrumb_label(&self) -> String {
    Route::Workouts.title().to_string()
  }

  fn tick(&mut self) {
    self.list.tick();
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.form = None;
        self.status = Some(message);
        self.ctx.invalidate(tables::WORKOUTS);
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
    self.form.is_some() || self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("a", "add"),
      ShortcutInfo::new("d", "delete"),
      ShortcutInfo::new("r", "refresh"),
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
  fn test_draft_from_form() {
    let draft =
      WorkoutsView::draft_from(&values(["Run", "42", "", "high", "", "easy"])).unwrap();
    assert_eq!(draft.workout_type, "Run");
    assert_eq!(draft.duration_minutes, 42);
    assert_eq!(draft.calories_burned, None);
    assert_eq!(draft.intensity, Intensity::High);
    assert_eq!(draft.notes.as_deref(), Some("easy"));
  }

  #[test]
  fn test_draft_validation_errors_are_inline() {
    let err = WorkoutsView::draft_from(&values(["Run", "", "", "moderate", "", ""])).unwrap_err();
    assert_eq!(err, "Minutes is required");
    let err = WorkoutsView::draft_from(&values(["", "10", "", "moderate", "", ""])).unwrap_err();
    assert_eq!(err, "Workout type is required");
  }
}
