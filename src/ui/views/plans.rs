use super::{opt_text, required, CachedQuery};
use crate::backend::tables;
use crate::context::AppContext;
use crate::data::plans;
use crate::models::{PlanDraft, PlannedExercise, WorkoutPlan};
use crate::query::Query;
use crate::router::Route;
use crate::theme::Palette;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{ensure_valid_selection, mutation, placeholder, poll_mutation, titled_block};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::sync::Arc;

/// Workout plans with the selected plan's exercises alongside
pub struct PlansView {
  ctx: Arc<AppContext>,
  list: CachedQuery<Vec<WorkoutPlan>>,
  list_state: ListState,
  form: Option<Form>,
  pending: Option<Query<String>>,
  status: Option<String>,
}

impl PlansView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let fetch_ctx = ctx.clone();
    let list = CachedQuery::new(move || {
      let ctx = fetch_ctx.clone();
      async move { ctx.plans().await }
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

  fn plans(&self) -> &[WorkoutPlan] {
    self.list.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn selected(&self) -> Option<&WorkoutPlan> {
    self.plans().get(self.list_state.selected()?)
  }

  fn draft_from(values: &[String]) -> Result<PlanDraft, String> {
    let [name, days, exercises, description] = values else {
      return Err("Form is incomplete".to_string());
    };
    let exercises = exercises
      .split(';')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| s.parse::<PlannedExercise>())
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| e.to_string())?;
    let draft = PlanDraft {
      name: name.trim().to_string(),
      description: opt_text(description),
      days_per_week: required(days, "Days per week")?,
      exercises,
    };
    draft.validate().map_err(|e| e.to_string())?;
    Ok(draft)
  }

  /// Run a write, then report `done` and reload the list.
  fn run<F, Fut>(&mut self, write: F)
  where
    F: Fn(Arc<AppContext>, String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<String, String>> + Send + 'static,
  {
    let ctx = self.ctx.clone();
    let write = Arc::new(write);
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let write = write.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        write(ctx, user_id).await
      }
    }));
  }

  fn submit(&mut self, values: Vec<String>) {
    let draft = match Self::draft_from(&values) {
      Ok(draft) => draft,
      Err(e) => {
        if let Some(form) = self.form.as_mut() {
          form.set_error(e);
        }
        return;
      }
    };
    if let Some(form) = self.form.as_mut() {
      form.set_busy(true);
    }
    self.run(move |ctx, user_id| {
      let draft = draft.clone();
      async move {
        let plan = plans::create_plan(ctx.remote.as_ref(), &user_id, draft)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("Created plan {}", plan.name))
      }
    });
  }

  fn toggle_active(&mut self) {
    let Some(plan) = self.selected() else {
      return;
    };
    let (id, active) = (plan.id, !plan.is_active);
    self.run(move |ctx, user_id| async move {
      let plan = plans::set_active_plan(ctx.remote.as_ref(), &user_id, id, active)
        .await
        .into_result()
        .map_err(|e| e.to_string())?;
      let state = if plan.is_active { "active" } else { "inactive" };
      Ok(format!("{} is now {}", plan.name, state))
    });
  }

  fn delete_selected(&mut self) {
    let Some(plan) = self.selected() else {
      return;
    };
    let (id, name) = (plan.id, plan.name.clone());
    self.run(move |ctx, user_id| {
      let name = name.clone();
      async move {
        plans::delete_plan(ctx.remote.as_ref(), &user_id, id)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("Deleted plan {}", name))
      }
    });
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let block = Block::default()
      .title(" Exercises ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.border));
    let Some(plan) = self.selected() else {
      frame.render_widget(block, area);
      return;
    };
    let mut lines = vec![
      Line::from(Span::styled(plan.name.clone(), Style::default().fg(palette.accent).bold())),
      Line::from(Span::styled(
        format!("{} days per week", plan.days_per_week),
        Style::default().fg(palette.muted),
      )),
    ];
    if let Some(description) = &plan.description {
      lines.push(Line::from(description.clone()));
    }
    lines.push(Line::from(""));
    for ex in &plan.exercises {
      let rest = if ex.rest_seconds > 0 {
        format!("  rest {}s", ex.rest_seconds)
      } else {
        String::new()
      };
      lines.push(Line::from(vec![
        Span::styled(format!("{:<22}", truncate(&ex.name, 22)), Style::default().fg(palette.text)),
        Span::styled(format!("{} x {}", ex.sets, ex.reps), Style::default().fg(palette.accent)),
        Span::styled(rest, Style::default().fg(palette.muted)),
      ]));
    }
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
  }
}

impl View for PlansView {
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
      KeyCode::Enter | KeyCode::Char(' ') => self.toggle_active(),
      KeyCode::Char('a') => {
        self.form = Some(
          Form::new("New plan")
            .field("Name", "")
            .prefilled("Days per week", "1-7", "3")
            .field("Exercises", "Squat:5x5@120; Bench:3x8")
            .field("Description", "optional"),
        )
      }
      KeyCode::Char('d') => self.delete_selected(),
      KeyCode::Char('r') => {
        self.ctx.invalidate(tables::WORKOUT_PLANS);
        self.list.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let rows = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let cols = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)]).split(rows[0]);

    let len = self.plans().len();
    ensure_valid_selection(&mut self.list_state, len);
    let label = format!("Plans{}", self.list.freshness());
    let block = titled_block(&label, self.list.query(), Some(len), palette);
    if len == 0 {
      let text = if self.list.query().is_loading() {
        "Loading..."
      } else {
        "No plans yet. Press 'a' to create one."
      };
      placeholder(frame, cols[0], block, text, palette);
    } else {
      let items: Vec<ListItem> = self
        .plans()
        .iter()
        .map(|p| {
          let marker = if p.is_active { "●" } else { "○" };
          let color = if p.is_active { palette.good } else { palette.muted };
          ListItem::new(Line::from(vec![
            Span::styled(format!("{} ", marker), Style::default().fg(color)),
            Span::raw(truncate(&p.name, 30)),
            Span::styled(format!("  {}x/wk", p.days_per_week), Style::default().fg(palette.muted)),
          ]))
        })
        .collect();
      let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(palette.highlight_bg).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
      frame.render_stateful_widget(list, cols[0], &mut self.list_state);
    }
    self.render_detail(frame, cols[1], palette);

    if let Some(status) = &self.status {
      frame.render_widget(
        Paragraph::new(format!(" {}", status)).style(Style::default().fg(palette.muted)),
        rows[1],
      );
    }
    if let Some(form) = &self.form {
      form.render_popup(frame, area, palette);
    }
  }

  fn breadcrumb_label(&self) -> String {
    Route::Plans.title().to_string()
  }

  fn tick(&mut self) {
    self.list.tick();
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.form = None;
        self.status = Some(message);
        self.ctx.invalidate(tables::WORKOUT_PLANS);
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
      ShortcutInfo::new("enter", "toggle active"),
      ShortcutInfo::new("a", "add"),
      ShortcutInfo::new("d", "delete"),
    ]
  }
}
