//! Aggregations that turn fetched rows into chart-ready series.
//!
//! Days are UTC calendar days, matching [`DateRange`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::DateRange;
use crate::models::{HealthActivity, HealthMetric, MetricType, Workout};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyWorkouts {
  pub date: NaiveDate,
  pub sessions: u32,
  pub minutes: u32,
  pub calories: u32,
}

/// One point per day of `range`, zero-filled.
pub fn daily_workouts(workouts: &[Workout], range: DateRange) -> Vec<DailyWorkouts> {
  let mut by_day: HashMap<NaiveDate, DailyWorkouts> = HashMap::new();
  for w in workouts {
    let date = w.performed_at.date_naive();
    if !range.contains(date) {
      continue;
    }
    let day = by_day.entry(date).or_insert(DailyWorkouts {
      date,
      sessions: 0,
      minutes: 0,
      calories: 0,
    });
    day.sessions += 1;
    day.minutes += w.duration_minutes;
    day.calories += w.calories_burned.unwrap_or(0);
  }
  range
    .days()
    .map(|date| {
      by_day.remove(&date).unwrap_or(DailyWorkouts {
        date,
        sessions: 0,
        minutes: 0,
        calories: 0,
      })
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeBreakdown {
  pub workout_type: String,
  pub sessions: u32,
  pub minutes: u32,
}

/// Sessions and minutes per workout type, most frequent first.
pub fn workout_type_breakdown(workouts: &[Workout]) -> Vec<TypeBreakdown> {
  let mut by_type: BTreeMap<String, TypeBreakdown> = BTreeMap::new();
  for w in workouts {
    let key = w.workout_type.trim().to_lowercase();
    let entry = by_type.entry(key).or_insert_with(|| TypeBreakdown {
      workout_type: w.workout_type.trim().to_string(),
      sessions: 0,
      minutes: 0,
    });
    entry.sessions += 1;
    entry.minutes += w.duration_minutes;
  }
  let mut out: Vec<TypeBreakdown> = by_type.into_values().collect();
  out.sort_by(|a, b| b.sessions.cmp(&a.sessions).then(b.minutes.cmp(&a.minutes)));
  out
}

/// Consecutive days with at least one workout, ending today. A streak that
/// ended yesterday still counts until today is over.
pub fn workout_streak(workouts: &[Workout], today: NaiveDate) -> u32 {
  let days: HashSet<NaiveDate> = workouts.iter().map(|w| w.performed_at.date_naive()).collect();
  let mut day = if days.contains(&today) {
    today
  } else {
    today - Duration::days(1)
  };
  let mut streak = 0;
  while days.contains(&day) {
    streak += 1;
    day -= Duration::days(1);
  }
  streak
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyAverage {
  pub date: NaiveDate,
  pub value: Option<f64>,
}

/// Daily average of one metric type over `range`; days without entries are `None`.
pub fn daily_average(
  metrics: &[HealthMetric],
  metric_type: MetricType,
  range: DateRange,
) -> Vec<DailyAverage> {
  let mut sums: HashMap<NaiveDate, (f64, u32)> = HashMap::new();
  for m in metrics.iter().filter(|m| m.metric_type == metric_type) {
    let date = m.recorded_at.date_naive();
    if range.contains(date) {
      let slot = sums.entry(date).or_insert((0.0, 0));
      slot.0 += m.value;
      slot.1 += 1;
    }
  }
  range
    .days()
    .map(|date| DailyAverage {
      date,
      value: sums.get(&date).map(|(sum, n)| sum / f64::from(*n)),
    })
    .collect()
}

pub fn mood_trend(metrics: &[HealthMetric], range: DateRange) -> Vec<DailyAverage> {
  daily_average(metrics, MetricType::Mood, range)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SleepSummary {
  pub nights: usize,
  pub average: f64,
  pub min: f64,
  pub max: f64,
}

pub fn sleep_summary(metrics: &[HealthMetric]) -> Option<SleepSummary> {
  let hours: Vec<f64> = metrics
    .iter()
    .filter(|m| m.metric_type == MetricType::Sleep)
    .map(|m| m.value)
    .collect();
  if hours.is_empty() {
    return None;
  }
  Some(SleepSummary {
    nights: hours.len(),
    average: hours.iter().sum::<f64>() / hours.len() as f64,
    min: hours.iter().copied().fold(f64::INFINITY, f64::min),
    max: hours.iter().copied().fold(f64::NEG_INFINITY, f64::max),
  })
}

/// Most recent value of a metric type.
pub fn latest(metrics: &[HealthMetric], metric_type: MetricType) -> Option<&HealthMetric> {
  metrics
    .iter()
    .filter(|m| m.metric_type == metric_type)
    .max_by_key(|m| m.recorded_at)
}

pub fn upcoming_activities(activities: &[HealthActivity], now: DateTime<Utc>) -> usize {
  activities
    .iter()
    .filter(|a| !a.completed && a.scheduled_at >= now)
    .count()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
  pub workouts_this_week: u32,
  pub minutes_this_week: u32,
  pub calories_this_week: u32,
  pub streak_days: u32,
  pub average_mood: Option<f64>,
  pub average_sleep: Option<f64>,
  pub latest_weight: Option<f64>,
  pub upcoming_activities: usize,
  pub week: Vec<DailyWorkouts>,
}

impl DashboardSummary {
  /// Summary over the last seven days ending `now`.
  pub fn build(
    workouts: &[Workout],
    metrics: &[HealthMetric],
    activities: &[HealthActivity],
    now: DateTime<Utc>,
  ) -> Self {
    let today = now.date_naive();
    let range = DateRange::last_days(7, today);
    let week = daily_workouts(workouts, range);

    let in_week: Vec<HealthMetric> = metrics
      .iter()
      .filter(|m| range.contains(m.recorded_at.date_naive()))
      .cloned()
      .collect();
    let mood: Vec<f64> = in_week
      .iter()
      .filter(|m| m.metric_type == MetricType::Mood)
      .map(|m| m.value)
      .collect();

    Self {
      workouts_this_week: week.iter().map(|d| d.sessions).sum(),
      minutes_this_week: week.iter().map(|d| d.minutes).sum(),
      calories_this_week: week.iter().map(|d| d.calories).sum(),
      streak_days: workout_streak(workouts, today),
      average_mood: (!mood.is_empty()).then(|| mood.iter().sum::<f64>() / mood.len() as f64),
      average_sleep: sleep_summary(&in_week).map(|s| s.average),
      latest_weight: latest(metrics, MetricType::Weight).map(|m| m.value),
      upcoming_activities: upcoming_activities(activities, now),
      week,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{ActivityCategory, Intensity};
  use chrono::TimeZone;
  use uuid::Uuid;

  fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
  }

  fn workout(kind: &str, when: DateTime<Utc>, minutes: u32) -> Workout {
    Workout {
      id: Uuid::new_v4(),
      user_id: "u1".into(),
      workout_type: kind.into(),
      duration_minutes: minutes,
      calories_burned: Some(minutes * 8),
      intensity: Intensity::Moderate,
      notes: None,
      performed_at: when,
      created_at: None,
    }
  }

  fn metric(metric_type: MetricType, value: f64, when: DateTime<Utc>) -> HealthMetric {
    HealthMetric {
      id: Uuid::new_v4(),
      user_id: "u1".into(),
      metric_type,
      value,
      unit: metric_type.default_unit().into(),
      notes: None,
      recorded_at: when,
    }
  }

  #[test]
  fn test_daily_workouts_zero_fill() {
    let range = DateRange::last_days(7, at(10, 0).date_naive());
    let workouts = vec![
      workout("Run", at(10, 7), 30),
      workout("Run", at(10, 18), 20),
      workout("Swim", at(8, 7), 45),
      workout("Swim", at(1, 7), 60),
    ];
    let days = daily_workouts(&workouts, range);
    assert_eq!(days.len(), 7);
    assert_eq!(days[6].sessions, 2);
    assert_eq!(days[6].minutes, 50);
    assert_eq!(days[6].calories, 400);
    assert_eq!(days[4].minutes, 45);
    assert_eq!(days.iter().map(|d| d.sessions).sum::<u32>(), 3);
  }

  #[test]
  fn test_type_breakdown_case_insensitive() {
    let workouts = vec![
      workout("Run", at(1, 7), 30),
      workout("run ", at(2, 7), 30),
      workout("Yoga", at(3, 7), 60),
    ];
    let breakdown = workout_type_breakdown(&workouts);
    assert_eq!(breakdown[0].workout_type, "Run");
    assert_eq!(breakdown[0].sessions, 2);
    assert_eq!(breakdown[1].minutes, 60);
  }

  #[test]
  fn test_streak() {
    let workouts = vec![
      workout("Run", at(9, 7), 30),
      workout("Run", at(8, 7), 30),
      workout("Run", at(7, 7), 30),
      workout("Run", at(5, 7), 30),
    ];
    assert_eq!(workout_streak(&workouts, at(9, 0).date_naive()), 3);
    // nothing logged yet today: yesterday's streak holds
    assert_eq!(workout_streak(&workouts, at(10, 0).date_naive()), 3);
    assert_eq!(workout_streak(&workouts, at(11, 0).date_naive()), 0);
  }

  #[test]
  fn test_mood_trend_and_sleep_summary() {
    let range = DateRange::new(at(1, 0).date_naive(), at(3, 0).date_naive());
    let metrics = vec![
      metric(MetricType::Mood, 6.0, at(1, 9)),
      metric(MetricType::Mood, 8.0, at(1, 20)),
      metric(MetricType::Mood, 5.0, at(3, 9)),
      metric(MetricType::Sleep, 6.5, at(1, 7)),
      metric(MetricType::Sleep, 8.5, at(2, 7)),
    ];
    let trend = mood_trend(&metrics, range);
    assert_eq!(trend[0].value, Some(7.0));
    assert_eq!(trend[1].value, None);
    assert_eq!(trend[2].value, Some(5.0));

    let sleep = sleep_summary(&metrics).unwrap();
    assert_eq!(sleep.nights, 2);
    assert_eq!(sleep.average, 7.5);
    assert_eq!((sleep.min, sleep.max), (6.5, 8.5));
    assert!(sleep_summary(&[]).is_none());
  }

  #[test]
  fn test_dashboard_summary() {
    let now = at(10, 12);
    let workouts = vec![workout("Run", at(10, 7), 30), workout("Run", at(1, 7), 30)];
    let metrics = vec![
      metric(MetricType::Mood, 7.0, at(9, 9)),
      metric(MetricType::Weight, 80.0, at(2, 7)),
      metric(MetricType::Weight, 79.5, at(9, 7)),
    ];
    let activities = vec![
      HealthActivity {
        id: Uuid::new_v4(),
        user_id: "u1".into(),
        title: "Walk".into(),
        category: ActivityCategory::Walk,
        scheduled_at: at(10, 18),
        duration_minutes: None,
        completed: false,
        reminder_time: None,
        reminder_sent: false,
        notes: None,
      },
      HealthActivity {
        id: Uuid::new_v4(),
        user_id: "u1".into(),
        title: "Old".into(),
        category: ActivityCategory::Walk,
        scheduled_at: at(9, 18),
        duration_minutes: None,
        completed: false,
        reminder_time: None,
        reminder_sent: false,
        notes: None,
      },
    ];

    let summary = DashboardSummary::build(&workouts, &metrics, &activities, now);
    assert_eq!(summary.workouts_this_week, 1);
    assert_eq!(summary.minutes_this_week, 30);
    assert_eq!(summary.streak_days, 1);
    assert_eq!(summary.average_mood, Some(7.0));
    assert_eq!(summary.average_sleep, None);
    assert_eq!(summary.latest_weight, Some(79.5));
    assert_eq!(summary.upcoming_activities, 1);
    assert_eq!(summary.week.len(), 7);
  }
}
