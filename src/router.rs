//! Application routes and the access guard in front of them.

use std::fmt;
use url::form_urlencoded;

use crate::backend::AuthUser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
  Dashboard,
  Workouts,
  Plans,
  Metrics,
  Activities,
  Profile,
  AdminSignups,
  SignIn,
  SignUp,
}

impl Route {
  pub const ALL: [Route; 9] = [
    Route::Dashboard,
    Route::Workouts,
    Route::Plans,
    Route::Metrics,
    Route::Activities,
    Route::Profile,
    Route::AdminSignups,
    Route::SignIn,
    Route::SignUp,
  ];

  pub fn path(self) -> &'static str {
    match self {
      Route::Dashboard => "/dashboard",
      Route::Workouts => "/workouts",
      Route::Plans => "/plans",
      Route::Metrics => "/metrics",
      Route::Activities => "/activities",
      Route::Profile => "/profile",
      Route::AdminSignups => "/admin/signups",
      Route::SignIn => "/signin",
      Route::SignUp => "/signup",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Route::Dashboard => "Dashboard",
      Route::Workouts => "Workouts",
      Route::Plans => "Plans",
      Route::Metrics => "Mood & Sleep",
      Route::Activities => "Activities",
      Route::Profile => "Profile",
      Route::AdminSignups => "Signups",
      Route::SignIn => "Sign in",
      Route::SignUp => "Sign up",
    }
  }

  /// Resolve a path. `/` and anything unknown land on the dashboard.
  pub fn parse(path: &str) -> Route {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    Route::ALL
      .into_iter()
      .find(|r| r.path() == path)
      .unwrap_or(Route::Dashboard)
  }

  pub fn is_public(self) -> bool {
    matches!(self, Route::SignIn | Route::SignUp)
  }

  pub fn is_admin(self) -> bool {
    matches!(self, Route::AdminSignups)
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.path())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
  Render(Route),
  /// Send the user elsewhere; the string is a full path with query
  Redirect(String),
}

/// Decide what to show for `path` given the signed-in user.
pub fn guard(path: &str, user: Option<&AuthUser>) -> Navigation {
  let route = Route::parse(path);
  match (user, route) {
    (None, route) if route.is_public() => Navigation::Render(route),
    (None, _) => Navigation::Redirect(signin_redirect(path)),
    (Some(_), route) if route.is_public() => Navigation::Redirect(Route::Dashboard.path().into()),
    (Some(user), route) if route.is_admin() && !user.is_admin() => {
      Navigation::Redirect(Route::Dashboard.path().into())
    }
    (Some(_), route) => Navigation::Render(route),
  }
}

/// `/signin?redirect=<path>` preserving where the user was headed.
pub fn signin_redirect(original: &str) -> String {
  let encoded: String = form_urlencoded::Serializer::new(String::new())
    .append_pair("redirect", original)
    .finish();
  format!("{}?{}", Route::SignIn.path(), encoded)
}

/// Where to go after signing in, read from a `/signin?redirect=...` path.
///
/// Only same-app paths are honoured; anything else goes to the dashboard.
pub fn post_login_target(signin_path: &str) -> String {
  let target = signin_path
    .split_once('?')
    .and_then(|(_, query)| {
      form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "redirect")
        .map(|(_, v)| v.into_owned())
    })
    .filter(|t| t.starts_with('/') && !t.starts_with("//"))
    .filter(|t| !Route::parse(t).is_public());
  target.unwrap_or_else(|| Route::Dashboard.path().to_string())
}
