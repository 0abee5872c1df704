//! Where reminder notifications go.

use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::HealthActivity;

/// Whether the user allows notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
  Granted,
  Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: Option<String>,
  /// Activity to open when the notification is selected
  pub activity_id: Uuid,
}

impl Notification {
  pub fn for_activity(activity: &HealthActivity) -> Self {
    let at = activity
      .scheduled_at
      .with_timezone(&chrono::Local)
      .format("%H:%M");
    let body = match activity.duration_minutes {
      Some(minutes) => format!("Starts at {} ({} min)", at, minutes),
      None => format!("Starts at {}", at),
    };
    Self {
      title: format!("Reminder: {}", activity.title),
      body,
      icon: Some(activity.category.to_string()),
      activity_id: activity.id,
    }
  }
}

pub trait Notifier: Send + Sync {
  fn permission(&self) -> Permission;

  fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Rings the terminal bell and prints to stderr. Used by the CLI.
pub struct TerminalNotifier {
  permission: Permission,
}

impl TerminalNotifier {
  pub fn new(enabled: bool) -> Self {
    Self {
      permission: if enabled {
        Permission::Granted
      } else {
        Permission::Denied
      },
    }
  }
}

impl Notifier for TerminalNotifier {
  fn permission(&self) -> Permission {
    self.permission
  }

  fn notify(&self, notification: &Notification) -> Result<()> {
    let mut err = std::io::stderr().lock();
    writeln!(err, "\x07{} - {}", notification.title, notification.body)
      .map_err(|e| eyre!("Failed to write notification: {}", e))
  }
}

/// Forwards notifications to the TUI, which shows them as toasts.
pub struct ChannelNotifier {
  permission: Permission,
  tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
  pub fn new(enabled: bool, tx: mpsc::UnboundedSender<Notification>) -> Self {
    Self {
      permission: if enabled {
        Permission::Granted
      } else {
        Permission::Denied
      },
      tx,
    }
  }
}

impl Notifier for ChannelNotifier {
  fn permission(&self) -> Permission {
    self.permission
  }

  fn notify(&self, notification: &Notification) -> Result<()> {
    self
      .tx
      .send(notification.clone())
      .map_err(|_| eyre!("Notification channel closed"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::ActivityCategory;
  use chrono::Utc;

  #[test]
  fn test_channel_notifier_forwards() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = ChannelNotifier::new(true, tx);
    let activity = HealthActivity {
      id: Uuid::new_v4(),
      user_id: "u1".into(),
      title: "Stretch".into(),
      category: ActivityCategory::Stretching,
      scheduled_at: Utc::now(),
      duration_minutes: Some(10),
      completed: false,
      reminder_time: None,
      reminder_sent: false,
      notes: None,
    };

    notifier.notify(&Notification::for_activity(&activity)).unwrap();
    let got = rx.try_recv().unwrap();
    assert_eq!(got.title, "Reminder: Stretch");
    assert!(got.body.ends_with("(10 min)"));
    assert_eq!(got.activity_id, activity.id);
    assert_eq!(got.icon.as_deref(), Some("stretching"));

    drop(rx);
    assert!(notifier.notify(&got).is_err());
  }

  #[test]
  fn test_disabled_notifier_is_denied() {
    assert_eq!(TerminalNotifier::new(false).permission(), Permission::Denied);
    assert_eq!(TerminalNotifier::new(true).permission(), Permission::Granted);
  }
}
