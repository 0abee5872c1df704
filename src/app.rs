use crate::auth::AuthEvent;
use crate::commands;
use crate::context::AppContext;
use crate::event::{Event, EventHandler};
use crate::reminders::{ChannelNotifier, Notification, PollerHandle};
use crate::router::{self, Navigation, Route};
use crate::theme::{Palette, Theme};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult, ToastLevel, Toasts};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{
  ActivitiesView, DashboardView, MetricsView, PlansView, ProfileView, SignInView, SignUpView,
  SignupsView, WorkoutsView,
};
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const TICK_RATE: Duration = Duration::from_millis(250);
/// How often the session expiry is checked while the UI is open
const SESSION_CHECK: Duration = Duration::from_secs(30);
/// Guarded navigation never needs more than signin -> target -> dashboard
const MAX_REDIRECTS: usize = 3;

/// Main application state
pub struct App {
  ctx: Arc<AppContext>,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Path of the root view, including any query (e.g. `/signin?redirect=...`)
  location: String,

  command: CommandInput,
  toasts: Toasts,
  theme: Theme,

  /// Background reminder poller, running while signed in
  poller: Option<PollerHandle>,
  reminder_tx: mpsc::UnboundedSender<Notification>,
  reminder_rx: Option<mpsc::UnboundedReceiver<Notification>>,

  last_session_check: Instant,
  should_quit: bool,
}

impl App {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let (reminder_tx, reminder_rx) = mpsc::unbounded_channel();
    let theme = Theme::load(ctx.store.as_ref());
    Self {
      ctx,
      view_stack: Vec::new(),
      location: String::new(),
      command: CommandInput::new(),
      toasts: Toasts::new(),
      theme,
      poller: None,
      reminder_tx,
      reminder_rx: Some(reminder_rx),
      last_session_check: Instant::now(),
      should_quit: false,
    }
  }

  pub async fn run(&mut self, start: &str) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    events.forward_auth(self.ctx.auth.subscribe());
    if let Some(rx) = self.reminder_rx.take() {
      events.forward_reminders(rx);
    }

    // A restored session arrives as a SignedIn event like any other sign-in
    self.ctx.auth.restore().await;
    self.navigate(start);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let result = self.main_loop(&mut events).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    if let Some(poller) = self.poller.take() {
      poller.stop().await;
    }
    result
  }

  async fn main_loop(&mut self, events: &mut EventHandler) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  pub fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Reminder(notification) => {
        self
          .toasts
          .push(ToastLevel::Info, notification.title, notification.body);
      }
      Event::Auth(auth) => self.handle_auth(auth),
    }
  }

  fn tick(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      view.tick();
    }
    self.toasts.tick();

    if self.last_session_check.elapsed() >= SESSION_CHECK {
      self.last_session_check = Instant::now();
      if self.ctx.auth.is_authenticated() {
        let auth = self.ctx.auth.clone();
        tokio::spawn(async move {
          if let Err(e) = auth.ensure_fresh().await {
            tracing::warn!(error = %e, "session refresh failed");
          }
        });
      }
    }
  }

  fn handle_auth(&mut self, event: AuthEvent) {
    match event {
      AuthEvent::SignedIn(user) => {
        tracing::info!(user = %user.id, "session started");
        self.start_poller();
        self.ctx.prefetch_dashboard(Utc::now());
        self.toasts.push(ToastLevel::Success, "Signed in", user.email);
        if Route::parse(&self.location).is_public() {
          let target = router::post_login_target(&self.location);
          self.navigate(&target);
        }
      }
      AuthEvent::SignedOut => {
        if let Some(poller) = self.poller.take() {
          tokio::spawn(poller.stop());
        }
        self.ctx.cache.clear();
        self.toasts.info("Signed out");
        let current = self.location.clone();
        self.navigate(&current);
      }
      AuthEvent::TokenRefreshed => tracing::debug!("session refreshed"),
    }
  }

  fn start_poller(&mut self) {
    if self.poller.is_some() {
      return;
    }
    let notifier = Arc::new(ChannelNotifier::new(
      self.ctx.config.reminders.notifications,
      self.reminder_tx.clone(),
    ));
    match self.ctx.reminder_poller(notifier) {
      Ok(poller) => self.poller = Some(poller.spawn()),
      Err(e) => tracing::warn!(error = %e, "reminder poller not started"),
    }
  }

  /// Show the view for `path`, following guard redirects.
  fn navigate(&mut self, path: &str) {
    let mut path = path.to_string();
    for _ in 0..MAX_REDIRECTS {
      let user = self.ctx.auth.user();
      match router::guard(&path, user.as_ref()) {
        Navigation::Render(route) => {
          tracing::debug!(%path, "navigate");
          self.view_stack = vec![self.build_view(route)];
          self.location = path;
          return;
        }
        Navigation::Redirect(next) => {
          tracing::debug!(from = %path, to = %next, "redirect");
          path = next;
        }
      }
    }
    tracing::warn!(%path, "too many redirects");
  }

  fn build_view(&self, route: Route) -> Box<dyn View> {
    let ctx = self.ctx.clone();
    match route {
      Route::Dashboard => Box::new(DashboardView::new(ctx)),
      Route::Workouts => Box::new(WorkoutsView::new(ctx)),
      Route::Plans => Box::new(PlansView::new(ctx)),
      Route::Metrics => Box::new(MetricsView::new(ctx)),
      Route::Activities => Box::new(ActivitiesView::new(ctx)),
      Route::Profile => Box::new(ProfileView::new(ctx)),
      Route::AdminSignups => Box::new(SignupsView::new(ctx)),
      Route::SignIn => Box::new(SignInView::new(ctx)),
      Route::SignUp => Box::new(SignUpView::new(ctx)),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if self.command.is_active() {
      if let KeyResult::Event(CommandEvent::Submitted(cmd)) = self.command.handle_key(key) {
        self.execute_command(&cmd);
      }
      return;
    }

    let captured = self
      .view_stack
      .last()
      .is_some_and(|view| view.captures_input());
    if !captured {
      match key.code {
        KeyCode::Char(':') => {
          self.command.activate();
          return;
        }
        KeyCode::Char('q') => {
          if self.view_stack.len() > 1 {
            self.view_stack.pop();
          } else {
            self.should_quit = true;
          }
          return;
        }
        _ => {}
      }
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else if Route::parse(&self.location) != Route::Dashboard {
          self.navigate(Route::Dashboard.path());
        }
      }
      ViewAction::Navigate(path) => self.navigate(&path),
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    if let Some(route) = commands::route_for(cmd) {
      self.navigate(route.path());
      return;
    }
    match cmd {
      "theme" => {
        self.theme = self.theme.next();
        if let Err(e) = self.theme.save(self.ctx.store.as_ref()) {
          tracing::warn!(error = %e, "failed to save theme");
        }
        self.toasts.info(format!("Theme: {}", self.theme));
      }
      "logout" => {
        let auth = self.ctx.auth.clone();
        tokio::spawn(async move { auth.logout().await });
      }
      "quit" => self.should_quit = true,
      "" => {}
      other => self.toasts.error(format!("Unknown command: {}", other)),
    }
  }

  // Accessors for UI rendering
  pub fn palette(&self) -> Palette {
    self.theme.palette()
  }

  pub fn theme(&self) -> Theme {
    self.theme
  }

  pub fn header_title(&self) -> &str {
    self.ctx.config.header_title()
  }

  pub fn user_email(&self) -> Option<String> {
    self.ctx.auth.user().map(|u| u.email)
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn toasts(&self) -> &Toasts {
    &self.toasts
  }

  #[cfg(test)]
  fn location(&self) -> &str {
    &self.location
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::harness;

  fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn test_protected_route_redirects_with_return_path() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    app.navigate("/workouts");
    assert_eq!(app.location(), "/signin?redirect=%2Fworkouts");
    assert_eq!(app.view_breadcrumb(), vec!["Sign in".to_string()]);
  }

  #[tokio::test]
  async fn test_sign_in_returns_to_requested_page() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    app.navigate("/plans");

    let user = h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    app.handle_event(Event::Auth(AuthEvent::SignedIn(user)));

    assert_eq!(app.location(), "/plans");
    assert!(app.poller.is_some());
    assert_eq!(app.toasts().len(), 1);
  }

  #[tokio::test]
  async fn test_sign_out_goes_back_to_sign_in() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    let user = h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    app.navigate("/activities");
    app.handle_event(Event::Auth(AuthEvent::SignedIn(user)));
    assert_eq!(app.location(), "/activities");

    h.ctx.auth.logout().await;
    app.handle_event(Event::Auth(AuthEvent::SignedOut));
    assert_eq!(app.location(), "/signin?redirect=%2Factivities");
    assert!(app.poller.is_none());
  }

  #[tokio::test]
  async fn test_admin_route_refused_for_members() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    app.navigate("/admin/signups");
    assert_eq!(app.location(), "/dashboard");
  }

  #[tokio::test]
  async fn test_command_palette_navigates() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    app.navigate("/dashboard");

    for c in [':', 'p', 'l', 'a', 'n', 's'] {
      app.handle_key(key(c));
    }
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    assert_eq!(app.location(), "/plans");

    app.handle_key(key('q'));
    assert!(app.should_quit);
  }

  #[tokio::test]
  async fn test_escape_leaves_page_for_dashboard() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    h.ctx.auth.login("ann@example.com", "secret123").await.unwrap();
    app.navigate("/metrics");

    app.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
    assert_eq!(app.location(), "/dashboard");
    assert!(!app.should_quit);
  }

  #[tokio::test]
  async fn test_reminders_become_toasts() {
    let h = harness();
    let mut app = App::new(h.ctx.clone());
    app.handle_event(Event::Reminder(Notification {
      title: "Reminder: Stretch".into(),
      body: "Starts at 18:00".into(),
      icon: None,
      activity_id: uuid::Uuid::new_v4(),
    }));
    assert_eq!(app.toasts().len(), 1);
  }
}
