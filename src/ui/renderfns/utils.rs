use crate::models::{Intensity, SignupStatus};
use crate::theme::Palette;
use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn intensity_color(intensity: Intensity, palette: &Palette) -> Color {
  match intensity {
    Intensity::Low => palette.good,
    Intensity::Moderate => palette.warn,
    Intensity::High => palette.bad,
  }
}

pub fn signup_status_color(status: SignupStatus, palette: &Palette) -> Color {
  match status {
    SignupStatus::Approved => palette.good,
    SignupStatus::Rejected => palette.bad,
    SignupStatus::Pending => palette.warn,
  }
}

/// Timestamp in the local zone, e.g. "Tue 14 May 18:30"
pub fn local_time(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%a %d %b %H:%M").to_string()
}

/// Optional number with unit, "-" when missing
pub fn opt_value(value: Option<f64>, unit: &str) -> String {
  match value {
    Some(v) => format!("{:.1} {}", v, unit).trim_end().to_string(),
    None => "-".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("crème brûlée", 8), "crème...");
  }

  #[test]
  fn test_intensity_colors() {
    let p = Palette::DARK;
    assert_eq!(intensity_color(Intensity::High, &p), p.bad);
    assert_eq!(intensity_color(Intensity::Low, &p), p.good);
  }

  #[test]
  fn test_opt_value() {
    assert_eq!(opt_value(Some(7.3), "h"), "7.3 h");
    assert_eq!(opt_value(Some(3.0), ""), "3.0");
    assert_eq!(opt_value(None, "kg"), "-");
  }
}
