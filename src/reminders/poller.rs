use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::notifier::{Notification, Notifier, Permission};
use crate::backend::RemoteTable;
use crate::config::ReminderConfig;
use crate::data::activities::{due_reminders, mark_reminder_sent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
  pub interval: Duration,
  pub lead: chrono::Duration,
  pub mark_attempts: u32,
  pub mark_backoff: Duration,
}

impl Default for PollerSettings {
  fn default() -> Self {
    Self::from(&ReminderConfig::default())
  }
}

impl From<&ReminderConfig> for PollerSettings {
  fn from(config: &ReminderConfig) -> Self {
    Self {
      interval: Duration::from_secs(config.interval_secs.max(1)),
      lead: chrono::Duration::minutes(config.lead_minutes),
      mark_attempts: config.mark_attempts.max(1),
      mark_backoff: Duration::from_millis(config.mark_backoff_ms),
    }
  }
}

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
  pub due: usize,
  pub notified: usize,
  pub marked: usize,
  pub unmarked: usize,
}

/// Periodically notifies the signed-in user of upcoming activities.
///
/// Each due reminder is notified and then marked as sent. A reminder whose
/// mark never succeeds stays due and is notified again on the next poll, so
/// delivery is at least once.
pub struct ReminderPoller {
  remote: Arc<dyn RemoteTable>,
  notifier: Arc<dyn Notifier>,
  user_id: String,
  settings: PollerSettings,
}

impl ReminderPoller {
  pub fn new(
    remote: Arc<dyn RemoteTable>,
    notifier: Arc<dyn Notifier>,
    user_id: String,
    settings: PollerSettings,
  ) -> Self {
    Self {
      remote,
      notifier,
      user_id,
      settings,
    }
  }

  /// Run one poll at `now`. Failures are logged, never returned.
  pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
    let mut report = TickReport::default();
    let due = match due_reminders(self.remote.as_ref(), &self.user_id, now, self.settings.lead)
      .await
      .into_result()
    {
      Ok(due) => due,
      Err(e) => {
        tracing::warn!(error = %e, "reminder poll failed");
        return report;
      }
    };
    report.due = due.len();

    let permitted = self.notifier.permission() == Permission::Granted;
    for activity in due {
      if permitted {
        match self.notifier.notify(&Notification::for_activity(&activity)) {
          Ok(()) => report.notified += 1,
          Err(e) => tracing::warn!(activity = %activity.id, error = %e, "notification failed"),
        }
      }
      if self.mark_sent(activity.id).await {
        report.marked += 1;
      } else {
        report.unmarked += 1;
      }
    }

    if report.due > 0 {
      tracing::info!(
        due = report.due,
        notified = report.notified,
        marked = report.marked,
        "reminders processed"
      );
    }
    report
  }

  /// Mark with exponential backoff between attempts.
  async fn mark_sent(&self, id: Uuid) -> bool {
    let mut delay = self.settings.mark_backoff;
    for attempt in 1..=self.settings.mark_attempts {
      let outcome = mark_reminder_sent(self.remote.as_ref(), &self.user_id, id).await;
      match outcome.error {
        None => return true,
        Some(e) if attempt == self.settings.mark_attempts => {
          tracing::warn!(activity = %id, attempts = attempt, error = %e, "giving up marking reminder");
        }
        Some(e) => {
          tracing::debug!(activity = %id, attempt, error = %e, "mark failed, backing off");
          tokio::time::sleep(delay).await;
          delay *= 2;
        }
      }
    }
    false
  }

  /// Poll every interval until `shutdown` flips to true or its sender drops.
  pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(self.settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(user = %self.user_id, every = ?self.settings.interval, "reminder poller started");
    loop {
      tokio::select! {
        _ = interval.tick() => {
          self.tick(Utc::now()).await;
        }
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
        }
      }
    }
    tracing::info!("reminder poller stopped");
  }

  pub fn spawn(self) -> PollerHandle {
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(self.run(rx));
    PollerHandle { shutdown: tx, task }
  }
}

/// Stops the poller when asked or dropped.
pub struct PollerHandle {
  shutdown: watch::Sender<bool>,
  task: JoinHandle<()>,
}

impl PollerHandle {
  pub async fn stop(self) {
    let _ = self.shutdown.send(true);
    if let Err(e) = self.task.await {
      tracing::warn!(error = %e, "reminder poller task failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::{CallKind, MemoryTables};
  use crate::backend::tables;
  use crate::error::{ApiError, ErrorKind};
  use color_eyre::Result;
  use serde_json::json;
  use std::sync::Mutex;

  struct Recorder {
    permission: Permission,
    sent: Mutex<Vec<Notification>>,
  }

  impl Recorder {
    fn new(permission: Permission) -> Arc<Self> {
      Arc::new(Self {
        permission,
        sent: Mutex::new(Vec::new()),
      })
    }

    fn count(&self) -> usize {
      self.sent.lock().unwrap().len()
    }
  }

  impl Notifier for Recorder {
    fn permission(&self) -> Permission {
      self.permission
    }

    fn notify(&self, notification: &Notification) -> Result<()> {
      self.sent.lock().unwrap().push(notification.clone());
      Ok(())
    }
  }

  fn seed_activity(remote: &MemoryTables, minutes_until_reminder: i64, sent: bool) -> Uuid {
    let id = Uuid::new_v4();
    let reminder = Utc::now() + chrono::Duration::minutes(minutes_until_reminder);
    remote.seed(
      tables::HEALTH_ACTIVITIES,
      vec![json!({
        "id": id,
        "user_id": "u1",
        "title": "Meditate",
        "category": "meditation",
        "scheduled_at": reminder + chrono::Duration::minutes(15),
        "duration_minutes": 10,
        "completed": false,
        "reminder_time": reminder,
        "reminder_sent": sent,
        "notes": null,
      })],
    );
    id
  }

  fn poller(remote: &Arc<MemoryTables>, notifier: &Arc<Recorder>) -> ReminderPoller {
    ReminderPoller::new(
      remote.clone(),
      notifier.clone(),
      "u1".into(),
      PollerSettings::default(),
    )
  }

  #[tokio::test(start_paused = true)]
  async fn test_due_reminder_notified_and_marked_once() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Granted);
    let id = seed_activity(&remote, 10, false);
    let poller = poller(&remote, &notifier);

    let report = poller.tick(Utc::now()).await;
    assert_eq!(report, TickReport { due: 1, notified: 1, marked: 1, unmarked: 0 });
    assert_eq!(notifier.sent.lock().unwrap()[0].activity_id, id);
    assert_eq!(remote.calls(CallKind::Update, tables::HEALTH_ACTIVITIES), 1);

    let report = poller.tick(Utc::now()).await;
    assert_eq!(report.due, 0);
    assert_eq!(notifier.count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_sent_and_out_of_window_reminders_are_skipped() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Granted);
    seed_activity(&remote, 10, true);
    seed_activity(&remote, 40, false);
    seed_activity(&remote, -5, false);

    let report = poller(&remote, &notifier).tick(Utc::now()).await;
    assert_eq!(report.due, 0);
    assert_eq!(notifier.count(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_mark_is_renotified_next_tick() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Granted);
    seed_activity(&remote, 10, false);
    remote.fail_next(
      CallKind::Update,
      tables::HEALTH_ACTIVITIES,
      ApiError::new(ErrorKind::Unavailable, "503"),
      3,
    );
    let poller = poller(&remote, &notifier);

    let report = poller.tick(Utc::now()).await;
    assert_eq!(report.unmarked, 1);
    assert_eq!(remote.calls(CallKind::Update, tables::HEALTH_ACTIVITIES), 3);

    let report = poller.tick(Utc::now()).await;
    assert_eq!(report.marked, 1);
    assert_eq!(notifier.count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_mark_retry_backs_off_exponentially() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Granted);
    seed_activity(&remote, 10, false);
    remote.fail_next(
      CallKind::Update,
      tables::HEALTH_ACTIVITIES,
      ApiError::new(ErrorKind::Network, "reset"),
      2,
    );

    let started = tokio::time::Instant::now();
    let report = poller(&remote, &notifier).tick(Utc::now()).await;
    assert_eq!(report.marked, 1);
    // 500ms then 1000ms
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
  }

  #[tokio::test(start_paused = true)]
  async fn test_denied_permission_still_marks() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Denied);
    seed_activity(&remote, 10, false);

    let report = poller(&remote, &notifier).tick(Utc::now()).await;
    assert_eq!(report, TickReport { due: 1, notified: 0, marked: 1, unmarked: 0 });
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_error_is_swallowed() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Granted);
    remote.fail_next(
      CallKind::Select,
      tables::HEALTH_ACTIVITIES,
      ApiError::new(ErrorKind::Network, "down"),
      1,
    );
    seed_activity(&remote, 10, false);
    let poller = poller(&remote, &notifier);

    assert_eq!(poller.tick(Utc::now()).await, TickReport::default());
    assert_eq!(poller.tick(Utc::now()).await.notified, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_run_polls_until_stopped() {
    let remote = Arc::new(MemoryTables::with_actor("u1"));
    let notifier = Recorder::new(Permission::Granted);
    seed_activity(&remote, 10, false);

    let handle = poller(&remote, &notifier).spawn();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(notifier.count(), 1);

    tokio::time::sleep(Duration::from_secs(125)).await;
    assert_eq!(remote.calls(CallKind::Select, tables::HEALTH_ACTIVITIES), 3);

    handle.stop().await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(remote.calls(CallKind::Select, tables::HEALTH_ACTIVITIES), 3);
  }
}
