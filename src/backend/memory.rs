//! In-memory stand-ins for the backend seams, with call counting and
//! failure injection.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

use super::auth_api::{AuthApi, AuthUser, Session, SignUpResult, UserRole};
use super::files::FileStorage;
use super::filter::{Filter, Op, Select};
use super::{tables, RemoteTable};
use crate::error::{ApiError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
  Select,
  Insert,
  Update,
  Upsert,
  Delete,
}

#[derive(Default)]
struct TableState {
  tables: HashMap<String, Vec<Value>>,
  calls: Vec<(CallKind, String)>,
  failures: HashMap<(CallKind, String), VecDeque<ApiError>>,
  actor: Option<String>,
}

/// Table store that evaluates filters against JSON rows.
///
/// With an actor set it behaves like row-level security: rows owned by
/// someone else are invisible and writing them is refused.
#[derive(Default)]
pub struct MemoryTables {
  state: Mutex<TableState>,
}

impl MemoryTables {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_actor(actor: &str) -> Self {
    let tables = Self::default();
    tables.set_actor(Some(actor));
    tables
  }

  pub fn set_actor(&self, actor: Option<&str>) {
    self.state.lock().unwrap().actor = actor.map(String::from);
  }

  pub fn seed(&self, table: &str, rows: Vec<Value>) {
    let mut state = self.state.lock().unwrap();
    state.tables.entry(table.to_string()).or_default().extend(rows);
  }

  pub fn rows(&self, table: &str) -> Vec<Value> {
    let state = self.state.lock().unwrap();
    state.tables.get(table).cloned().unwrap_or_default()
  }

  pub fn calls(&self, kind: CallKind, table: &str) -> usize {
    let state = self.state.lock().unwrap();
    state
      .calls
      .iter()
      .filter(|(k, t)| *k == kind && t == table)
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.state.lock().unwrap().calls.len()
  }

  /// Make the next `times` calls of `kind` on `table` fail with `err`.
  pub fn fail_next(&self, kind: CallKind, table: &str, err: ApiError, times: usize) {
    let mut state = self.state.lock().unwrap();
    let queue = state
      .failures
      .entry((kind, table.to_string()))
      .or_default();
    for _ in 0..times {
      queue.push_back(err.clone());
    }
  }

  fn begin(&self, kind: CallKind, table: &str) -> Result<std::sync::MutexGuard<'_, TableState>, ApiError> {
    let mut state = self.state.lock().unwrap();
    state.calls.push((kind, table.to_string()));
    if let Some(err) = state
      .failures
      .get_mut(&(kind, table.to_string()))
      .and_then(VecDeque::pop_front)
    {
      return Err(err);
    }
    Ok(state)
  }
}

fn owner_column(table: &str) -> &'static str {
  match table {
    tables::PROFILES => "id",
    _ => "user_id",
  }
}

fn visible(actor: &Option<String>, table: &str, row: &Value) -> bool {
  if table == tables::PENDING_SIGNUPS {
    return true;
  }
  match actor {
    Some(actor) => row.get(owner_column(table)).and_then(Value::as_str) == Some(actor.as_str()),
    None => true,
  }
}

fn check_owner(actor: &Option<String>, table: &str, row: &Value) -> Result<(), ApiError> {
  if visible(actor, table, row) {
    Ok(())
  } else {
    Err(ApiError::new(
      ErrorKind::PermissionDenied,
      "new row violates row-level security policy",
    ))
  }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    (Value::String(x), Value::String(y)) => {
      match (
        x.parse::<DateTime<Utc>>(),
        y.parse::<DateTime<Utc>>(),
      ) {
        (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
        _ => Some(x.cmp(y)),
      }
    }
    (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
    (Value::Null, Value::Null) => Some(Ordering::Equal),
    _ => None,
  }
}

fn matches(filter: &Filter, row: &Value) -> bool {
  let cell = row.get(&filter.column).unwrap_or(&Value::Null);
  let ord = compare(cell, &filter.value);
  match filter.op {
    Op::Eq => ord == Some(Ordering::Equal),
    Op::Gte => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
    Op::Lt => ord == Some(Ordering::Less),
    Op::Lte => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
  }
}

fn with_defaults(mut row: Value) -> Value {
  if let Value::Object(map) = &mut row {
    map
      .entry("id")
      .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    if map.get("created_at").map_or(true, Value::is_null) {
      map.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
  }
  row
}

fn merge(target: &mut Value, patch: &Value) {
  if let (Value::Object(t), Value::Object(p)) = (target, patch) {
    for (k, v) in p {
      t.insert(k.clone(), v.clone());
    }
  }
}

#[async_trait]
impl RemoteTable for MemoryTables {
  async fn select(&self, table: &str, query: &Select) -> Result<Vec<Value>, ApiError> {
    let state = self.begin(CallKind::Select, table)?;
    let mut rows: Vec<Value> = state
      .tables
      .get(table)
      .map(|rows| {
        rows
          .iter()
          .filter(|row| visible(&state.actor, table, row))
          .filter(|row| query.filters.iter().all(|f| matches(f, row)))
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    if let Some(order) = &query.order {
      rows.sort_by(|a, b| {
        let ord = compare(
          a.get(&order.column).unwrap_or(&Value::Null),
          b.get(&order.column).unwrap_or(&Value::Null),
        )
        .unwrap_or(Ordering::Equal);
        if order.ascending {
          ord
        } else {
          ord.reverse()
        }
      });
    }
    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }
    Ok(rows)
  }

  async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, ApiError> {
    let mut state = self.begin(CallKind::Insert, table)?;
    let actor = state.actor.clone();
    let rows: Vec<Value> = rows.into_iter().map(with_defaults).collect();
    for row in &rows {
      check_owner(&actor, table, row)?;
    }
    let stored = state.tables.entry(table.to_string()).or_default();
    for row in &rows {
      if stored.iter().any(|r| r.get("id") == row.get("id")) {
        return Err(ApiError::new(ErrorKind::Conflict, "duplicate key value"));
      }
    }
    stored.extend(rows.iter().cloned());
    Ok(rows)
  }

  async fn update(
    &self,
    table: &str,
    filters: &[Filter],
    patch: Value,
  ) -> Result<Vec<Value>, ApiError> {
    let mut state = self.begin(CallKind::Update, table)?;
    let actor = state.actor.clone();
    let mut updated = Vec::new();
    if let Some(rows) = state.tables.get_mut(table) {
      for row in rows.iter_mut() {
        if visible(&actor, table, row) && filters.iter().all(|f| matches(f, row)) {
          merge(row, &patch);
          updated.push(row.clone());
        }
      }
    }
    Ok(updated)
  }

  async fn upsert(
    &self,
    table: &str,
    rows: Vec<Value>,
    on_conflict: &str,
  ) -> Result<Vec<Value>, ApiError> {
    let mut state = self.begin(CallKind::Upsert, table)?;
    let actor = state.actor.clone();
    for row in &rows {
      check_owner(&actor, table, row)?;
    }
    let stored = state.tables.entry(table.to_string()).or_default();
    let mut result = Vec::new();
    for row in rows {
      let key = row.get(on_conflict).cloned();
      match stored
        .iter_mut()
        .find(|r| key.is_some() && r.get(on_conflict) == key.as_ref())
      {
        Some(existing) => {
          merge(existing, &row);
          result.push(existing.clone());
        }
        None => {
          let row = with_defaults(row);
          stored.push(row.clone());
          result.push(row);
        }
      }
    }
    Ok(result)
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, ApiError> {
    let mut state = self.begin(CallKind::Delete, table)?;
    let actor = state.actor.clone();
    let mut removed = Vec::new();
    if let Some(rows) = state.tables.get_mut(table) {
      rows.retain(|row| {
        let hit = visible(&actor, table, row) && filters.iter().all(|f| matches(f, row));
        if hit {
          removed.push(row.clone());
        }
        !hit
      });
    }
    Ok(removed)
  }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Default)]
struct AuthState {
  accounts: HashMap<String, (String, AuthUser)>,
  refresh_failures: usize,
  sign_outs: usize,
  issued: usize,
}

/// Account registry that issues short fake tokens.
#[derive(Default)]
pub struct MemoryAuth {
  state: Mutex<AuthState>,
  /// Lifetime of issued sessions
  pub session_ttl: Option<Duration>,
}

impl MemoryAuth {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_account(&self, email: &str, password: &str, id: &str, role: UserRole) {
    let user = AuthUser {
      id: id.to_string(),
      email: email.to_string(),
      role,
      full_name: None,
    };
    self
      .state
      .lock()
      .unwrap()
      .accounts
      .insert(email.to_string(), (password.to_string(), user));
  }

  pub fn fail_refreshes(&self, times: usize) {
    self.state.lock().unwrap().refresh_failures = times;
  }

  pub fn sign_outs(&self) -> usize {
    self.state.lock().unwrap().sign_outs
  }

  fn issue(&self, state: &mut AuthState, user: AuthUser) -> Session {
    state.issued += 1;
    Session {
      access_token: format!("access-{}-{}", user.id, state.issued),
      refresh_token: format!("refresh-{}", user.email),
      expires_at: Utc::now() + self.session_ttl.unwrap_or_else(|| Duration::hours(1)),
      user,
    }
  }
}

#[async_trait]
impl AuthApi for MemoryAuth {
  async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
    let mut state = self.state.lock().unwrap();
    let user = match state.accounts.get(email) {
      Some((pw, user)) if pw == password => user.clone(),
      _ => return Err(ApiError::unauthorized("Invalid email or password")),
    };
    Ok(self.issue(&mut state, user))
  }

  async fn sign_up(
    &self,
    email: &str,
    password: &str,
    full_name: Option<&str>,
  ) -> Result<SignUpResult, ApiError> {
    let mut state = self.state.lock().unwrap();
    if state.accounts.contains_key(email) {
      return Err(ApiError::new(ErrorKind::Conflict, "User already registered"));
    }
    let user = AuthUser {
      id: uuid::Uuid::new_v4().to_string(),
      email: email.to_string(),
      role: UserRole::User,
      full_name: full_name.map(String::from),
    };
    state
      .accounts
      .insert(email.to_string(), (password.to_string(), user.clone()));
    Ok(SignUpResult::SignedIn(self.issue(&mut state, user)))
  }

  async fn refresh(&self, refresh_token: &str) -> Result<Session, ApiError> {
    let mut state = self.state.lock().unwrap();
    if state.refresh_failures > 0 {
      state.refresh_failures -= 1;
      return Err(ApiError::unauthorized("Invalid Refresh Token"));
    }
    let email = refresh_token.trim_start_matches("refresh-").to_string();
    let user = state
      .accounts
      .get(&email)
      .map(|(_, user)| user.clone())
      .ok_or_else(|| ApiError::unauthorized("Invalid Refresh Token"))?;
    Ok(self.issue(&mut state, user))
  }

  async fn sign_out(&self, _access_token: &str) -> Result<(), ApiError> {
    self.state.lock().unwrap().sign_outs += 1;
    Ok(())
  }

  fn authorize_url(&self, provider: &str, _redirect_to: Option<&str>) -> Result<Url, ApiError> {
    Url::parse(&format!("https://auth.test/authorize?provider={}", provider))
      .map_err(|e| ApiError::unexpected(e.to_string()))
  }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Default)]
pub struct MemoryFiles {
  objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryFiles {
  pub fn object(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
    self
      .objects
      .lock()
      .unwrap()
      .get(&format!("{}/{}", bucket, path))
      .cloned()
  }
}

#[async_trait]
impl FileStorage for MemoryFiles {
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<String, ApiError> {
    let key = format!("{}/{}", bucket, path);
    self
      .objects
      .lock()
      .unwrap()
      .insert(key.clone(), (bytes, content_type.to_string()));
    Ok(format!("https://files.test/{}", key))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn test_filters_and_order() {
    let tables = MemoryTables::new();
    tables.seed(
      "workouts",
      vec![
        json!({"id": "a", "user_id": "u1", "duration_minutes": 30, "performed_at": "2024-05-01T08:00:00Z"}),
        json!({"id": "b", "user_id": "u1", "duration_minutes": 45, "performed_at": "2024-05-03T08:00:00+00:00"}),
        json!({"id": "c", "user_id": "u2", "duration_minutes": 60, "performed_at": "2024-05-02T08:00:00Z"}),
      ],
    );

    let rows = tables
      .select(
        "workouts",
        &Select::new()
          .eq("user_id", "u1")
          .gte("performed_at", "2024-05-01T00:00:00Z")
          .order("performed_at", false),
      )
      .await
      .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["b", "a"]);
  }

  #[tokio::test]
  async fn test_actor_hides_foreign_rows_and_refuses_foreign_writes() {
    let tables = MemoryTables::with_actor("u1");
    tables.seed("workouts", vec![json!({"id": "c", "user_id": "u2"})]);

    let rows = tables.select("workouts", &Select::new()).await.unwrap();
    assert!(rows.is_empty());

    let err = tables
      .insert("workouts", vec![json!({"user_id": "u2"})])
      .await
      .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
  }

  #[tokio::test]
  async fn test_injected_failures_are_consumed_in_order() {
    let tables = MemoryTables::new();
    tables.fail_next(
      CallKind::Select,
      "profiles",
      ApiError::new(ErrorKind::Network, "down"),
      1,
    );
    assert!(tables.select("profiles", &Select::new()).await.is_err());
    assert!(tables.select("profiles", &Select::new()).await.is_ok());
    assert_eq!(tables.calls(CallKind::Select, "profiles"), 2);
  }
}
