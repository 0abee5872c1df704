//! Activity reminders: a background poller and the notifiers it reports to.

mod notifier;
mod poller;

pub use notifier::{ChannelNotifier, Notification, Notifier, TerminalNotifier};
pub use poller::{PollerHandle, PollerSettings, ReminderPoller};
