use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::auth::AuthEvent;
use crate::reminders::Notification;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh and query polling
  Tick,
  /// Reminder delivered by the background poller
  Reminder(Notification),
  /// Sign-in state changed
  Auth(AuthEvent),
}

/// Event handler that produces events from terminal input, a tick timer,
/// reminders and auth changes
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal reads block, keep them off the async workers
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      if event::poll(tick_rate).unwrap_or(false) {
        if let Ok(CrosstermEvent::Key(key)) = event::read() {
          if key.kind == KeyEventKind::Press && input_tx.send(Event::Key(key)).is_err() {
            break;
          }
        }
      } else if input_tx.send(Event::Tick).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Forward reminder notifications into the event stream
  pub fn forward_reminders(&self, mut reminders: mpsc::UnboundedReceiver<Notification>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      while let Some(notification) = reminders.recv().await {
        if tx.send(Event::Reminder(notification)).is_err() {
          break;
        }
      }
    });
  }

  /// Forward auth store events into the event stream
  pub fn forward_auth(&self, mut auth: broadcast::Receiver<AuthEvent>) {
    let tx = self.tx.clone();
    tokio::spawn(async move {
      loop {
        match auth.recv().await {
          Ok(event) => {
            if tx.send(Event::Auth(event)).is_err() {
              break;
            }
          }
          Err(broadcast::error::RecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "auth events lagged");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
