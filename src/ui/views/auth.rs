//! Sign-in and sign-up screens.
//!
//! Neither screen navigates on success itself: the auth store announces the
//! new session and the app moves on to wherever the user was headed.

use crate::auth::RegisterOutcome;
use crate::context::AppContext;
use crate::query::Query;
use crate::router::Route;
use crate::theme::Palette;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{mutation, poll_mutation};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};
use std::sync::Arc;

fn ctrl(key: &KeyEvent, c: char) -> bool {
  key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

fn render_centered(form: &Form, notice: Option<&str>, frame: &mut Frame, area: Rect, palette: &Palette) {
  let chunks = Layout::vertical([Constraint::Min(0), Constraint::Length(2)]).split(area);
  form.render_popup(frame, chunks[0], palette);
  if let Some(notice) = notice {
    let paragraph = Paragraph::new(notice.to_string())
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true })
      .style(Style::default().fg(palette.good));
    frame.render_widget(paragraph, chunks[1]);
  }
}

pub struct SignInView {
  ctx: Arc<AppContext>,
  form: Form,
  pending: Option<Query<String>>,
  notice: Option<String>,
}

impl SignInView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let notice = ctx
      .auth
      .pending_signup()
      .map(|email| format!("Account requested for {}. Sign in once it is approved.", email));
    Self {
      ctx,
      form: Form::new("Sign in").field("Email", "").secret("Password"),
      pending: None,
      notice,
    }
  }

  fn submit(&mut self, values: Vec<String>) {
    let [email, password] = <[String; 2]>::try_from(values).unwrap_or_default();
    self.form.set_busy(true);
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let email = email.clone();
      let password = password.clone();
      async move {
        ctx
          .auth
          .login(&email, &password)
          .await
          .map(|user| format!("Signed in as {}", user.email))
          .map_err(|e| e.to_string())
      }
    }));
  }
}

impl View for SignInView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if ctrl(&key, 'n') {
      return ViewAction::Navigate(Route::SignUp.path().to_string());
    }
    if let KeyResult::Event(FormEvent::Submitted(values)) = self.form.handle_key(key) {
      self.submit(values);
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    render_centered(&self.form, self.notice.as_deref(), frame, area, palette);
  }

  fn breadcrumb_label(&self) -> String {
    Route::SignIn.title().to_string()
  }

  fn tick(&mut self) {
    if let Some(Err(e)) = poll_mutation(&mut self.pending) {
      self.form.set_error(e);
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "sign in"),
      ShortcutInfo::new("tab", "next field"),
      ShortcutInfo::new("ctrl-n", "create account"),
    ]
  }
}

pub struct SignUpView {
  ctx: Arc<AppContext>,
  form: Form,
  pending: Option<Query<String>>,
  notice: Option<String>,
}

impl SignUpView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    Self {
      ctx,
      form: Form::new("Create account")
        .field("Full name", "optional")
        .field("Email", "")
        .secret("Password"),
      pending: None,
      notice: None,
    }
  }

  fn submit(&mut self, values: Vec<String>) {
    let [full_name, email, password] = <[String; 3]>::try_from(values).unwrap_or_default();
    self.form.set_busy(true);
    self.notice = None;
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let (full_name, email, password) = (full_name.clone(), email.clone(), password.clone());
      async move {
        let outcome = ctx
          .auth
          .register(ctx.remote.as_ref(), &email, &password, Some(full_name.as_str()))
          .await
          .map_err(|e| e.to_string())?;
        Ok(match outcome {
          RegisterOutcome::SignedIn(user) => format!("Welcome, {}", user.email),
          RegisterOutcome::PendingConfirmation { email } => {
            format!("Check {} to confirm your account, then sign in.", email)
          }
        })
      }
    }));
  }
}

impl View for SignUpView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if ctrl(&key, 'l') {
      return ViewAction::Navigate(Route::SignIn.path().to_string());
    }
    if let KeyResult::Event(FormEvent::Submitted(values)) = self.form.handle_key(key) {
      self.submit(values);
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    render_centered(&self.form, self.notice.as_deref(), frame, area, palette);
  }

  fn breadcrumb_label(&self) -> String {
    Route::SignUp.title().to_string()
  }

  fn tick(&mut self) {
    // Errors, including an email already in use, stay on this screen
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.form.set_busy(false);
        self.notice = Some(message);
      }
      Some(Err(e)) => self.form.set_error(e),
      None => {}
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "sign up"),
      ShortcutInfo::new("tab", "next field"),
      ShortcutInfo::new("ctrl-l", "sign in"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::EMAIL_EXISTS;
  use crate::context::tests::harness;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(view: &mut dyn View, s: &str) {
    for c in s.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  async fn settle(view: &mut dyn View) {
    for _ in 0..50 {
      tokio::task::yield_now().await;
      view.tick();
    }
  }

  #[tokio::test]
  async fn test_sign_up_with_existing_email_shows_inline_error() {
    let h = harness();
    let mut view = SignUpView::new(h.ctx.clone());
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "ann@example.com");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "another-pass");
    let action = view.handle_key(key(KeyCode::Enter));
    assert!(matches!(action, ViewAction::None));

    settle(&mut view).await;
    assert_eq!(view.form.error(), Some(EMAIL_EXISTS));
    assert!(!h.ctx.auth.is_authenticated());
  }

  #[tokio::test]
  async fn test_sign_in_failure_keeps_form() {
    let h = harness();
    let mut view = SignInView::new(h.ctx.clone());
    type_str(&mut view, "ann@example.com");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "wrong-password");
    view.handle_key(key(KeyCode::Enter));

    settle(&mut view).await;
    assert!(view.form.error().is_some());
    assert!(!view.form.is_busy());
  }

  #[tokio::test]
  async fn test_sign_in_success_authenticates() {
    let h = harness();
    let mut events = h.ctx.auth.subscribe();
    let mut view = SignInView::new(h.ctx.clone());
    type_str(&mut view, "ann@example.com");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "secret123");
    view.handle_key(key(KeyCode::Enter));

    settle(&mut view).await;
    assert!(h.ctx.auth.is_authenticated());
    assert!(matches!(events.try_recv(), Ok(crate::auth::AuthEvent::SignedIn(_))));
  }

  #[test]
  fn test_ctrl_n_goes_to_sign_up() {
    let h = harness();
    let mut view = SignInView::new(h.ctx);
    let action = view.handle_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL));
    assert!(matches!(action, ViewAction::Navigate(p) if p == "/signup"));
  }
}
