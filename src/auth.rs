//! Authentication state shared by the whole application.
//!
//! The store owns the current session, persists it to local storage and
//! announces changes on a broadcast channel. It also hands the bearer token
//! to the backend clients through [`AccessToken`].

use chrono::{Duration, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use url::Url;

use crate::backend::{AccessToken, AuthApi, AuthUser, RemoteTable, Session, SignUpResult};
use crate::data::signups::request_signup;
use crate::error::{ApiError, ErrorKind};
use crate::store::{keys, LocalStore};

/// Sessions expiring within this many seconds are refreshed before use.
pub const REFRESH_WINDOW_SECS: i64 = 60;

pub const EMAIL_EXISTS: &str = "An account with this email already exists";

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
  SignedIn(AuthUser),
  SignedOut,
  TokenRefreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
  SignedIn(AuthUser),
  /// The account exists but cannot sign in until confirmed or approved
  PendingConfirmation { email: String },
}

pub struct AuthStore {
  api: Arc<dyn AuthApi>,
  store: Arc<dyn LocalStore>,
  session: RwLock<Option<Session>>,
  events: broadcast::Sender<AuthEvent>,
}

impl AuthStore {
  pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn LocalStore>) -> Self {
    let (events, _) = broadcast::channel(16);
    Self {
      api,
      store,
      session: RwLock::new(None),
      events,
    }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
    self.events.subscribe()
  }

  pub fn session(&self) -> Option<Session> {
    self.session.read().ok()?.clone()
  }

  pub fn user(&self) -> Option<AuthUser> {
    self.session().map(|s| s.user)
  }

  pub fn is_authenticated(&self) -> bool {
    self.user().is_some()
  }

  /// Id of the signed-in user, or `Unauthorized`.
  pub fn require_user(&self) -> Result<AuthUser, ApiError> {
    self
      .user()
      .ok_or_else(|| ApiError::unauthorized("Sign in to continue"))
  }

  /// Load the persisted session, refreshing it if it has expired or is about to.
  pub async fn restore(&self) -> Option<AuthUser> {
    let saved: Option<Session> = self.store.get_json(keys::SESSION).unwrap_or_else(|e| {
      tracing::warn!(error = %e, "failed to read saved session");
      None
    });
    let saved = saved?;

    if saved.expires_within(Utc::now(), refresh_window()) {
      match self.api.refresh(&saved.refresh_token).await {
        Ok(session) => {
          tracing::info!(user = %session.user.id, "restored session after refresh");
          self.set_session(session);
        }
        Err(e) => {
          tracing::info!(error = %e, "saved session could not be refreshed, discarding");
          self.forget();
          return None;
        }
      }
    } else {
      tracing::info!(user = %saved.user.id, "restored session");
      self.set_session(saved);
    }

    let user = self.user()?;
    self.emit(AuthEvent::SignedIn(user.clone()));
    Some(user)
  }

  pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, ApiError> {
    let email = normalize_email(email)?;
    if password.is_empty() {
      return Err(ApiError::validation("Password is required"));
    }
    let session = self.api.sign_in(&email, password).await?;
    let user = session.user.clone();
    self.set_session(session);
    tracing::info!(user = %user.id, "signed in");
    self.emit(AuthEvent::SignedIn(user.clone()));
    Ok(user)
  }

  /// Create an account and record it for admin review.
  ///
  /// An email that is already registered fails with `Conflict` and leaves
  /// the store untouched.
  pub async fn register(
    &self,
    remote: &dyn RemoteTable,
    email: &str,
    password: &str,
    full_name: Option<&str>,
  ) -> Result<RegisterOutcome, ApiError> {
    let email = normalize_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
      return Err(ApiError::validation(format!(
        "Password must be at least {} characters",
        MIN_PASSWORD_LEN
      )));
    }
    let full_name = full_name.map(str::trim).filter(|n| !n.is_empty());

    let result = self
      .api
      .sign_up(&email, password, full_name)
      .await
      .map_err(|e| match e.kind {
        ErrorKind::Conflict => ApiError::new(ErrorKind::Conflict, EMAIL_EXISTS),
        _ => e,
      })?;

    let outcome = match result {
      SignUpResult::SignedIn(session) => {
        let user = session.user.clone();
        self.set_session(session);
        RegisterOutcome::SignedIn(user)
      }
      SignUpResult::ConfirmationRequired(user) => RegisterOutcome::PendingConfirmation { email: user.email },
    };

    let recorded = request_signup(remote, &email, full_name).await;
    if let Some(e) = recorded.error {
      tracing::warn!(error = %e, "failed to record pending signup");
    }
    if let Err(e) = self.store.set(keys::PENDING_SIGNUP, &email) {
      tracing::warn!(error = %e, "failed to remember pending signup");
    }

    if let RegisterOutcome::SignedIn(user) = &outcome {
      tracing::info!(user = %user.id, "registered and signed in");
      self.emit(AuthEvent::SignedIn(user.clone()));
    }
    Ok(outcome)
  }

  /// End the session. Local state is cleared even if the backend call fails.
  pub async fn logout(&self) {
    let Some(session) = self.take_session() else {
      return;
    };
    if let Err(e) = self.api.sign_out(&session.access_token).await {
      tracing::warn!(error = %e, "sign-out request failed");
    }
    self.forget();
    tracing::info!(user = %session.user.id, "signed out");
    self.emit(AuthEvent::SignedOut);
  }

  /// Exchange the refresh token for a new session. A rejected refresh token
  /// signs the user out.
  pub async fn refresh(&self) -> Result<(), ApiError> {
    let Some(current) = self.session() else {
      return Err(ApiError::unauthorized("Not signed in"));
    };
    match self.api.refresh(&current.refresh_token).await {
      Ok(session) => {
        self.set_session(session);
        tracing::debug!("token refreshed");
        self.emit(AuthEvent::TokenRefreshed);
        Ok(())
      }
      Err(e) if e.kind == ErrorKind::Unauthorized => {
        tracing::info!(error = %e, "refresh rejected, signing out");
        self.take_session();
        self.forget();
        self.emit(AuthEvent::SignedOut);
        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  /// Refresh the session when it expires within [`REFRESH_WINDOW_SECS`].
  pub async fn ensure_fresh(&self) -> Result<(), ApiError> {
    match self.session() {
      Some(s) if s.expires_within(Utc::now(), refresh_window()) => self.refresh().await,
      Some(_) => Ok(()),
      None => Err(ApiError::unauthorized("Not signed in")),
    }
  }

  pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<Url, ApiError> {
    self.api.authorize_url(provider, redirect_to)
  }

  /// Finish an OAuth sign-in from the URL the provider redirected to.
  ///
  /// Tokens arrive in the fragment; the refresh token is exchanged for a
  /// full session.
  pub async fn complete_oauth(&self, redirect_url: &str) -> Result<AuthUser, ApiError> {
    let url = Url::parse(redirect_url)
      .map_err(|e| ApiError::validation(format!("Invalid redirect URL: {}", e)))?;
    let params = url.fragment().or(url.query()).unwrap_or_default();
    if let Some((_, description)) = url::form_urlencoded::parse(params.as_bytes())
      .find(|(k, _)| k == "error_description")
    {
      return Err(ApiError::unauthorized(description.into_owned()));
    }
    let refresh_token = url::form_urlencoded::parse(params.as_bytes())
      .find(|(k, _)| k == "refresh_token")
      .map(|(_, v)| v.into_owned())
      .ok_or_else(|| ApiError::validation("Redirect URL does not contain a refresh token"))?;

    let session = self.api.refresh(&refresh_token).await?;
    let user = session.user.clone();
    self.set_session(session);
    tracing::info!(user = %user.id, "signed in with oauth");
    self.emit(AuthEvent::SignedIn(user.clone()));
    Ok(user)
  }

  /// Email of the last registration made on this device, if any.
  pub fn pending_signup(&self) -> Option<String> {
    self.store.get(keys::PENDING_SIGNUP).ok().flatten()
  }

  fn set_session(&self, session: Session) {
    if let Err(e) = self.store.set_json(keys::SESSION, &session) {
      tracing::warn!(error = %e, "failed to persist session");
    }
    if let Ok(mut slot) = self.session.write() {
      *slot = Some(session);
    }
  }

  fn take_session(&self) -> Option<Session> {
    self.session.write().ok()?.take()
  }

  fn forget(&self) {
    if let Err(e) = self.store.remove(keys::SESSION) {
      tracing::warn!(error = %e, "failed to clear saved session");
    }
  }

  fn emit(&self, event: AuthEvent) {
    // no subscribers is fine
    let _ = self.events.send(event);
  }
}

impl AccessToken for AuthStore {
  fn access_token(&self) -> Option<String> {
    self.session().map(|s| s.access_token)
  }
}

fn refresh_window() -> Duration {
  Duration::seconds(REFRESH_WINDOW_SECS)
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
  let email = email.trim().to_lowercase();
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
    _ => Err(ApiError::validation("Enter a valid email address")),
  }
}
