use super::{opt_parse, opt_text};
use crate::context::AppContext;
use crate::data::profile;
use crate::load::{BoundedLoader, LoadState};
use crate::models::{Profile, ProfilePatch};
use crate::query::Query;
use crate::router::Route;
use crate::theme::Palette;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::opt_value;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{mutation, poll_mutation};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

type ProfileLoader = BoundedLoader<Option<Profile>>;

#[derive(Debug, Clone, Copy)]
enum Reload {
  Initial,
  Retry,
  Refresh,
}

enum Editing {
  Details(Form),
  Avatar(Form),
}

impl Editing {
  fn form_mut(&mut self) -> &mut Form {
    match self {
      Editing::Details(form) | Editing::Avatar(form) => form,
    }
  }
}

/// The signed-in user's profile, loaded with bounded retries
pub struct ProfileView {
  ctx: Arc<AppContext>,
  loader: Option<Arc<ProfileLoader>>,
  state_rx: Option<watch::Receiver<LoadState<Option<Profile>>>>,
  state: LoadState<Option<Profile>>,
  editing: Option<Editing>,
  pending: Option<Query<String>>,
  status: Option<String>,
}

impl ProfileView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let mut view = Self {
      ctx: ctx.clone(),
      loader: None,
      state_rx: None,
      state: LoadState::Idle,
      editing: None,
      pending: None,
      status: None,
    };
    match ctx.profile_loader() {
      Ok(loader) => {
        view.state_rx = Some(loader.subscribe());
        view.loader = Some(Arc::new(loader));
        view.reload(Reload::Initial);
      }
      Err(e) => {
        view.state = LoadState::Failed {
          attempts: 0,
          error: e,
        }
      }
    }
    view
  }

  fn reload(&self, how: Reload) {
    let Some(loader) = self.loader.clone() else {
      return;
    };
    tokio::spawn(async move {
      match how {
        Reload::Initial => loader.load().await,
        Reload::Retry => loader.retry().await,
        Reload::Refresh => loader.refresh().await,
      };
    });
  }

  fn profile(&self) -> Option<&Profile> {
    self.state.data().and_then(|p| p.as_ref())
  }

  fn details_form(current: Option<&Profile>) -> Form {
    let text = |f: fn(&Profile) -> Option<String>| current.and_then(f).unwrap_or_default();
    Form::new(if current.is_some() { "Edit profile" } else { "Create profile" })
      .prefilled("Full name", "", &text(|p| p.full_name.clone()))
      .prefilled(
        "Date of birth",
        "YYYY-MM-DD",
        &text(|p| p.date_of_birth.map(|d| d.to_string())),
      )
      .prefilled("Height (cm)", "", &text(|p| p.height_cm.map(|v| v.to_string())))
      .prefilled("Weight (kg)", "", &text(|p| p.weight_kg.map(|v| v.to_string())))
      .prefilled("Fitness goal", "optional", &text(|p| p.fitness_goal.clone()))
  }

  fn patch_from(values: &[String]) -> Result<ProfilePatch, String> {
    let [name, dob, height, weight, goal] = values else {
      return Err("Form is incomplete".to_string());
    };
    let date_of_birth = match dob.trim() {
      "" => None,
      raw => Some(
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
          .map_err(|_| "Date of birth must look like 1990-04-21".to_string())?,
      ),
    };
    let patch = ProfilePatch {
      full_name: opt_text(name),
      date_of_birth,
      height_cm: opt_parse(height, "Height")?,
      weight_kg: opt_parse(weight, "Weight")?,
      fitness_goal: opt_text(goal),
      avatar_url: None,
    };
    patch.validate().map_err(|e| e.to_string())?;
    Ok(patch)
  }

  /// A first save creates the row from the patch; later saves update it.
  fn save_details(&mut self, values: Vec<String>) {
    let patch = match Self::patch_from(&values) {
      Ok(patch) => patch,
      Err(e) => return self.form_error(e),
    };
    let existing = self.profile().is_some();
    self.set_busy();
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let patch = patch.clone();
      async move {
        let user = ctx.auth.require_user().map_err(|e| e.to_string())?;
        let result = if existing {
          profile::update_profile(ctx.remote.as_ref(), &user.id, &patch).await
        } else {
          let mut fresh = Profile::empty(&user.id, &user.email);
          fresh.full_name = user.full_name;
          fresh.apply(&patch);
          profile::upsert_profile(ctx.remote.as_ref(), &user.id, &fresh).await
        };
        result.into_result().map_err(|e| e.to_string())?;
        Ok("Profile saved".to_string())
      }
    }));
  }

  fn upload_avatar(&mut self, values: Vec<String>) {
    let Some(path) = values.first().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
      return self.form_error("Path is required".to_string());
    };
    self.set_busy();
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let path = path.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        let bytes = tokio::fs::read(&path)
          .await
          .map_err(|e| format!("Cannot read {}: {}", path, e))?;
        let file_name = Path::new(&path)
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_else(|| path.clone());
        profile::upload_avatar(
          ctx.remote.as_ref(),
          ctx.files.as_ref(),
          &ctx.config.backend.avatar_bucket,
          &user_id,
          &file_name,
          bytes,
        )
        .await
        .into_result()
        .map_err(|e| e.to_string())?;
        Ok("Profile picture updated".to_string())
      }
    }));
  }

  fn form_error(&mut self, error: String) {
    if let Some(editing) = self.editing.as_mut() {
      editing.form_mut().set_error(error);
    }
  }

  fn set_busy(&mut self) {
    if let Some(editing) = self.editing.as_mut() {
      editing.form_mut().set_busy(true);
    }
  }

  fn detail_lines(&self, profile: &Profile, palette: &Palette) -> Vec<Line<'static>> {
    let row = |label: &str, value: String| {
      Line::from(vec![
        Span::styled(format!("{:<16}", label), Style::default().fg(palette.muted)),
        Span::styled(value, Style::default().fg(palette.text)),
      ])
    };
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    vec![
      row("Name", or_dash(profile.full_name.clone())),
      row("Email", profile.email.clone()),
      row("Role", profile.role.to_string()),
      row("Date of birth", or_dash(profile.date_of_birth.map(|d| d.to_string()))),
      row("Height", opt_value(profile.height_cm, "cm")),
      row("Weight", opt_value(profile.weight_kg, "kg")),
      row("BMI", opt_value(profile.bmi(), "")),
      row("Goal", or_dash(profile.fitness_goal.clone())),
      row("Picture", or_dash(profile.avatar_url.clone())),
    ]
  }
}

impl View for ProfileView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(editing) = self.editing.as_mut() {
      let is_avatar = matches!(editing, Editing::Avatar(_));
      match editing.form_mut().handle_key(key) {
        KeyResult::Event(FormEvent::Cancelled) => self.editing = None,
        KeyResult::Event(FormEvent::Submitted(values)) if is_avatar => self.upload_avatar(values),
        KeyResult::Event(FormEvent::Submitted(values)) => self.save_details(values),
        _ => {}
      }
      return ViewAction::None;
    }
    match key.code {
      KeyCode::Char('r') => self.reload(Reload::Retry),
      KeyCode::Char('R') if !self.state.is_loading() => self.reload(Reload::Refresh),
      KeyCode::Char('e') if matches!(self.state, LoadState::Loaded(_)) => {
        self.editing = Some(Editing::Details(Self::details_form(self.profile())));
      }
      KeyCode::Char('u') if self.profile().is_some() => {
        self.editing = Some(Editing::Avatar(
          Form::new("Upload profile picture").field("Path", "png, jpeg or webp image"),
        ));
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let (title, lines) = match &self.state {
      LoadState::Idle => (" Profile ", vec![Line::from("Waiting to load...")]),
      LoadState::Loading { attempt } => (
        " Profile ",
        vec![Line::from(format!(
          "Loading your profile (attempt {} of {})...",
          attempt, self.ctx.config.profile.max_load_attempts
        ))],
      ),
      LoadState::Failed { attempts, error } => (
        " Profile [error] ",
        vec![
          Line::from(Span::styled(error.to_string(), Style::default().fg(palette.bad))),
          Line::from(""),
          Line::from(Span::styled(
            format!("Gave up after {} attempts. Press 'r' to try again.", attempts),
            Style::default().fg(palette.muted),
          )),
        ],
      ),
      LoadState::Loaded(None) => (
        " Profile ",
        vec![Line::from(Span::styled(
          "You have not set up a profile yet. Press 'e' to create one.",
          Style::default().fg(palette.muted),
        ))],
      ),
      LoadState::Loaded(Some(profile)) => (" Profile ", self.detail_lines(profile, palette)),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.border));
    frame.render_widget(
      Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
      chunks[0],
    );
    if let Some(status) = &self.status {
      frame.render_widget(
        Paragraph::new(format!(" {}", status)).style(Style::default().fg(palette.muted)),
        chunks[1],
      );
    }
    if let Some(editing) = self.editing.as_mut() {
      editing.form_mut().render_popup(frame, area, palette);
    }
  }

  fn breadcrumb_label(&self) -> String {
    Route::Profile.title().to_string()
  }

  fn tick(&mut self) {
    if let Some(rx) = self.state_rx.as_mut() {
      if rx.has_changed().unwrap_or(false) {
        self.state = rx.borrow_and_update().clone();
      }
    }
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.editing = None;
        self.status = Some(message);
        self.reload(Reload::Refresh);
      }
      Some(Err(e)) => match self.editing.as_mut() {
        Some(editing) => editing.form_mut().set_error(e),
        None => self.status = Some(e),
      },
      None => {}
    }
  }

  fn captures_input(&self) -> bool {
    self.editing.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("e", "edit"),
      ShortcutInfo::new("u", "picture"),
      ShortcutInfo::new("R", "reload"),
    ];
    if self.state.error().is_some() {
      shortcuts.push(ShortcutInfo::new("r", "retry").with_priority(5));
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::CallKind;
  use crate::backend::tables;
  use crate::context::tests::harness;

  fn values(v: [&str; 5]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_blank_fields_are_left_alone() {
    let patch = ProfileView::patch_from(&values(["Ann", "", "170", "", ""])).unwrap();
    assert_eq!(patch.full_name.as_deref(), Some("Ann"));
    assert_eq!(patch.height_cm, Some(170.0));
    assert_eq!(patch.weight_kg, None);
    assert!(ProfileView::patch_from(&values(["", "21/04/1990", "", "", ""])).is_err());
  }

  #[tokio::test]
  async fn test_loads_missing_profile_once() {
    let h = harness();
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    let mut view = ProfileView::new(h.ctx.clone());
    for _ in 0..20 {
      tokio::task::yield_now().await;
      view.tick();
    }
    assert_eq!(view.state, LoadState::Loaded(None));
    assert_eq!(h.remote.calls(CallKind::Select, tables::PROFILES), 1);
  }

  #[tokio::test]
  async fn test_signed_out_view_shows_error() {
    let h = harness();
    let view = ProfileView::new(h.ctx.clone());
    assert!(matches!(view.state, LoadState::Failed { attempts: 0, .. }));
    assert!(view.shortcuts().iter().any(|s| s.key == "r"));
    assert_eq!(h.remote.total_calls(), 0);
  }
}
