//! Domain rows stored in the backend tables, plus the drafts that forms build
//! before anything is sent. Drafts validate themselves; rows are trusted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::backend::UserRole;
use crate::error::ApiError;

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  /// Same as the auth user id
  pub id: String,
  #[serde(default)]
  pub email: String,
  pub full_name: Option<String>,
  pub avatar_url: Option<String>,
  pub date_of_birth: Option<NaiveDate>,
  pub height_cm: Option<f64>,
  pub weight_kg: Option<f64>,
  pub fitness_goal: Option<String>,
  /// Assigned server side; never written by the client
  #[serde(default, skip_serializing)]
  pub role: UserRole,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
  /// Fresh profile for a user who has never saved one.
  pub fn empty(id: &str, email: &str) -> Self {
    Self {
      id: id.to_string(),
      email: email.to_string(),
      full_name: None,
      avatar_url: None,
      date_of_birth: None,
      height_cm: None,
      weight_kg: None,
      fitness_goal: None,
      role: UserRole::User,
      created_at: None,
      updated_at: None,
    }
  }

  /// Copy every field the patch sets.
  pub fn apply(&mut self, patch: &ProfilePatch) {
    if let Some(v) = &patch.full_name {
      self.full_name = Some(v.clone());
    }
    if let Some(v) = patch.date_of_birth {
      self.date_of_birth = Some(v);
    }
    if let Some(v) = patch.height_cm {
      self.height_cm = Some(v);
    }
    if let Some(v) = patch.weight_kg {
      self.weight_kg = Some(v);
    }
    if let Some(v) = &patch.fitness_goal {
      self.fitness_goal = Some(v.clone());
    }
    if let Some(v) = &patch.avatar_url {
      self.avatar_url = Some(v.clone());
    }
  }

  /// Body mass index when height and weight are known.
  pub fn bmi(&self) -> Option<f64> {
    let h = self.height_cm? / 100.0;
    let w = self.weight_kg?;
    (h > 0.0).then(|| w / (h * h))
  }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub full_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_of_birth: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub height_cm: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub weight_kg: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fitness_goal: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub avatar_url: Option<String>,
}

impl ProfilePatch {
  pub fn is_empty(&self) -> bool {
    *self == ProfilePatch::default()
  }

  pub fn validate(&self) -> Result<(), ApiError> {
    if let Some(name) = &self.full_name {
      if name.trim().is_empty() {
        return Err(ApiError::validation("Name cannot be blank"));
      }
    }
    if let Some(h) = self.height_cm {
      if !(50.0..=272.0).contains(&h) {
        return Err(ApiError::validation("Height must be between 50 and 272 cm"));
      }
    }
    if let Some(w) = self.weight_kg {
      if !(20.0..=500.0).contains(&w) {
        return Err(ApiError::validation("Weight must be between 20 and 500 kg"));
      }
    }
    if let Some(dob) = self.date_of_birth {
      if dob > Utc::now().date_naive() {
        return Err(ApiError::validation("Date of birth cannot be in the future"));
      }
    }
    Ok(())
  }
}

// ============================================================================
// Workouts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
  Low,
  #[default]
  Moderate,
  High,
}

impl FromStr for Intensity {
  type Err = ApiError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "low" => Ok(Intensity::Low),
      "moderate" | "medium" => Ok(Intensity::Moderate),
      "high" => Ok(Intensity::High),
      other => Err(ApiError::validation(format!("Unknown intensity '{}'", other))),
    }
  }
}

impl fmt::Display for Intensity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Intensity::Low => "low",
      Intensity::Moderate => "moderate",
      Intensity::High => "high",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
  pub id: Uuid,
  pub user_id: String,
  pub workout_type: String,
  pub duration_minutes: u32,
  pub calories_burned: Option<u32>,
  #[serde(default)]
  pub intensity: Intensity,
  pub notes: Option<String>,
  pub performed_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutDraft {
  pub workout_type: String,
  pub duration_minutes: u32,
  pub calories_burned: Option<u32>,
  pub intensity: Intensity,
  pub notes: Option<String>,
  pub performed_at: DateTime<Utc>,
}

impl WorkoutDraft {
  pub fn validate(&self) -> Result<(), ApiError> {
    if self.workout_type.trim().is_empty() {
      return Err(ApiError::validation("Workout type is required"));
    }
    if self.duration_minutes == 0 || self.duration_minutes > 24 * 60 {
      return Err(ApiError::validation("Duration must be between 1 and 1440 minutes"));
    }
    if self.performed_at > Utc::now() + chrono::Duration::minutes(5) {
      return Err(ApiError::validation("Workouts cannot be logged in the future"));
    }
    Ok(())
  }

  pub fn into_workout(self, user_id: &str) -> Workout {
    Workout {
      id: Uuid::new_v4(),
      user_id: user_id.to_string(),
      workout_type: self.workout_type.trim().to_string(),
      duration_minutes: self.duration_minutes,
      calories_burned: self.calories_burned,
      intensity: self.intensity,
      notes: self.notes,
      performed_at: self.performed_at,
      created_at: None,
    }
  }
}

// ============================================================================
// Workout plans
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedExercise {
  pub name: String,
  pub sets: u32,
  pub reps: u32,
  #[serde(default)]
  pub rest_seconds: u32,
}

impl FromStr for PlannedExercise {
  type Err = ApiError;

  /// Parses `Name:SETSxREPS` with an optional `@REST` suffix, e.g. `Squat:3x10@90`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let bad = || ApiError::validation(format!("Exercise '{}' must look like Name:3x10 or Name:3x10@90", s));
    let (name, shape) = s.rsplit_once(':').ok_or_else(bad)?;
    let (volume, rest) = match shape.split_once('@') {
      Some((v, r)) => (v, r.trim().parse().map_err(|_| bad())?),
      None => (shape, 0),
    };
    let (sets, reps) = volume.split_once(['x', 'X']).ok_or_else(bad)?;
    let exercise = PlannedExercise {
      name: name.trim().to_string(),
      sets: sets.trim().parse().map_err(|_| bad())?,
      reps: reps.trim().parse().map_err(|_| bad())?,
      rest_seconds: rest,
    };
    if exercise.name.is_empty() || exercise.sets == 0 || exercise.reps == 0 {
      return Err(bad());
    }
    Ok(exercise)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
  pub id: Uuid,
  pub user_id: String,
  pub name: String,
  pub description: Option<String>,
  pub days_per_week: u8,
  #[serde(default)]
  pub exercises: Vec<PlannedExercise>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanDraft {
  pub name: String,
  pub description: Option<String>,
  pub days_per_week: u8,
  pub exercises: Vec<PlannedExercise>,
}

impl PlanDraft {
  pub fn validate(&self) -> Result<(), ApiError> {
    if self.name.trim().is_empty() {
      return Err(ApiError::validation("Plan name is required"));
    }
    if !(1..=7).contains(&self.days_per_week) {
      return Err(ApiError::validation("Days per week must be between 1 and 7"));
    }
    if self.exercises.is_empty() {
      return Err(ApiError::validation("Add at least one exercise"));
    }
    Ok(())
  }

  pub fn into_plan(self, user_id: &str) -> WorkoutPlan {
    WorkoutPlan {
      id: Uuid::new_v4(),
      user_id: user_id.to_string(),
      name: self.name.trim().to_string(),
      description: self.description,
      days_per_week: self.days_per_week,
      exercises: self.exercises,
      is_active: false,
      created_at: None,
    }
  }
}

// ============================================================================
// Health metrics (mood, sleep, ...)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
  Mood,
  Sleep,
  Weight,
  HeartRate,
  Steps,
  Water,
}

impl MetricType {
  pub const ALL: [MetricType; 6] = [
    MetricType::Mood,
    MetricType::Sleep,
    MetricType::Weight,
    MetricType::HeartRate,
    MetricType::Steps,
    MetricType::Water,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      MetricType::Mood => "mood",
      MetricType::Sleep => "sleep",
      MetricType::Weight => "weight",
      MetricType::HeartRate => "heart_rate",
      MetricType::Steps => "steps",
      MetricType::Water => "water",
    }
  }

  pub fn default_unit(self) -> &'static str {
    match self {
      MetricType::Mood => "score",
      MetricType::Sleep => "hours",
      MetricType::Weight => "kg",
      MetricType::HeartRate => "bpm",
      MetricType::Steps => "steps",
      MetricType::Water => "ml",
    }
  }

  /// Inclusive range of acceptable values.
  pub fn bounds(self) -> (f64, f64) {
    match self {
      MetricType::Mood => (1.0, 10.0),
      MetricType::Sleep => (0.0, 24.0),
      MetricType::Weight => (20.0, 500.0),
      MetricType::HeartRate => (20.0, 250.0),
      MetricType::Steps => (0.0, 200_000.0),
      MetricType::Water => (0.0, 20_000.0),
    }
  }
}

impl FromStr for MetricType {
  type Err = ApiError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    MetricType::ALL
      .into_iter()
      .find(|m| m.as_str() == s.to_lowercase().replace('-', "_"))
      .ok_or_else(|| ApiError::validation(format!("Unknown metric '{}'", s)))
  }
}

impl fmt::Display for MetricType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
  pub id: Uuid,
  pub user_id: String,
  pub metric_type: MetricType,
  pub value: f64,
  pub unit: String,
  pub notes: Option<String>,
  pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDraft {
  pub metric_type: MetricType,
  pub value: f64,
  pub notes: Option<String>,
  pub recorded_at: DateTime<Utc>,
}

impl MetricDraft {
  pub fn validate(&self) -> Result<(), ApiError> {
    let (lo, hi) = self.metric_type.bounds();
    if !self.value.is_finite() || self.value < lo || self.value > hi {
      return Err(ApiError::validation(format!(
        "{} must be between {} and {}",
        self.metric_type, lo, hi
      )));
    }
    Ok(())
  }

  pub fn into_metric(self, user_id: &str) -> HealthMetric {
    HealthMetric {
      id: Uuid::new_v4(),
      user_id: user_id.to_string(),
      metric_type: self.metric_type,
      value: self.value,
      unit: self.metric_type.default_unit().to_string(),
      notes: self.notes,
      recorded_at: self.recorded_at,
    }
  }
}

// ============================================================================
// Health activities (scheduled, with optional reminder)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
  Meditation,
  Stretching,
  Walk,
  Hydration,
  Medication,
  #[default]
  Other,
}

impl FromStr for ActivityCategory {
  type Err = ApiError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "meditation" => Ok(ActivityCategory::Meditation),
      "stretching" => Ok(ActivityCategory::Stretching),
      "walk" => Ok(ActivityCategory::Walk),
      "hydration" => Ok(ActivityCategory::Hydration),
      "medication" => Ok(ActivityCategory::Medication),
      "other" => Ok(ActivityCategory::Other),
      other => Err(ApiError::validation(format!("Unknown category '{}'", other))),
    }
  }
}

impl fmt::Display for ActivityCategory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ActivityCategory::Meditation => "meditation",
      ActivityCategory::Stretching => "stretching",
      ActivityCategory::Walk => "walk",
      ActivityCategory::Hydration => "hydration",
      ActivityCategory::Medication => "medication",
      ActivityCategory::Other => "other",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthActivity {
  pub id: Uuid,
  pub user_id: String,
  pub title: String,
  #[serde(default)]
  pub category: ActivityCategory,
  pub scheduled_at: DateTime<Utc>,
  pub duration_minutes: Option<u32>,
  #[serde(default)]
  pub completed: bool,
  pub reminder_time: Option<DateTime<Utc>>,
  #[serde(default)]
  pub reminder_sent: bool,
  pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
  pub title: String,
  pub category: ActivityCategory,
  pub scheduled_at: DateTime<Utc>,
  pub duration_minutes: Option<u32>,
  /// Minutes before `scheduled_at` to send a reminder
  pub remind_before: Option<i64>,
  pub notes: Option<String>,
}

impl ActivityDraft {
  pub fn validate(&self) -> Result<(), ApiError> {
    if self.title.trim().is_empty() {
      return Err(ApiError::validation("Activity title is required"));
    }
    if let Some(before) = self.remind_before {
      if before < 0 {
        return Err(ApiError::validation("Reminder offset cannot be negative"));
      }
    }
    Ok(())
  }

  pub fn into_activity(self, user_id: &str) -> HealthActivity {
    let reminder_time = self
      .remind_before
      .map(|m| self.scheduled_at - chrono::Duration::minutes(m));
    HealthActivity {
      id: Uuid::new_v4(),
      user_id: user_id.to_string(),
      title: self.title.trim().to_string(),
      category: self.category,
      scheduled_at: self.scheduled_at,
      duration_minutes: self.duration_minutes,
      completed: false,
      reminder_time,
      reminder_sent: false,
      notes: self.notes,
    }
  }
}

// ============================================================================
// Pending signups
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignupStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl fmt::Display for SignupStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      SignupStatus::Pending => "pending",
      SignupStatus::Approved => "approved",
      SignupStatus::Rejected => "rejected",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSignup {
  pub id: Uuid,
  pub email: String,
  pub full_name: Option<String>,
  #[serde(default)]
  pub status: SignupStatus,
  pub requested_at: DateTime<Utc>,
  pub reviewed_at: Option<DateTime<Utc>>,
  pub reviewed_by: Option<String>,
}
