//! Light/dark preference and the terminal palette that follows it.

use color_eyre::{eyre::eyre, Result};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::store::{keys, LocalStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  Light,
  Dark,
  /// Follow the terminal; read from COLORFGBG when set
  #[default]
  System,
}

impl Theme {
  pub fn as_str(self) -> &'static str {
    match self {
      Theme::Light => "light",
      Theme::Dark => "dark",
      Theme::System => "system",
    }
  }

  /// Stored preference, `System` when unset or unreadable.
  pub fn load(store: &dyn LocalStore) -> Theme {
    match store.get(keys::THEME) {
      Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
        tracing::warn!(value = %raw, error = %e, "ignoring stored theme");
        Theme::System
      }),
      Ok(None) => Theme::System,
      Err(e) => {
        tracing::warn!(error = %e, "failed to read theme");
        Theme::System
      }
    }
  }

  pub fn save(self, store: &dyn LocalStore) -> Result<()> {
    store.set(keys::THEME, self.as_str())
  }

  /// Next theme in light, dark, system order.
  pub fn next(self) -> Theme {
    match self {
      Theme::Light => Theme::Dark,
      Theme::Dark => Theme::System,
      Theme::System => Theme::Light,
    }
  }

  /// Whether the palette should be dark.
  pub fn is_dark(self) -> bool {
    match self {
      Theme::Light => false,
      Theme::Dark => true,
      Theme::System => system_is_dark(std::env::var("COLORFGBG").ok().as_deref()),
    }
  }

  pub fn palette(self) -> Palette {
    if self.is_dark() {
      Palette::DARK
    } else {
      Palette::LIGHT
    }
  }
}

impl fmt::Display for Theme {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Theme {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      "system" | "auto" => Ok(Theme::System),
      other => Err(eyre!("Unknown theme '{}' (expected light, dark or system)", other)),
    }
  }
}

/// COLORFGBG is "fg;bg"; backgrounds 0-6 and 8 are dark. Unset means dark.
fn system_is_dark(colorfgbg: Option<&str>) -> bool {
  let Some(bg) = colorfgbg.and_then(|v| v.rsplit(';').next()) else {
    return true;
  };
  match bg.parse::<u8>() {
    Ok(n) => n < 7 || n == 8,
    Err(_) => true,
  }
}

/// Colors used by the views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
  pub bar_bg: Color,
  pub text: Color,
  pub muted: Color,
  pub accent: Color,
  pub highlight_bg: Color,
  pub border: Color,
  pub good: Color,
  pub warn: Color,
  pub bad: Color,
}

impl Palette {
  pub const DARK: Palette = Palette {
    bar_bg: Color::Black,
    text: Color::White,
    muted: Color::DarkGray,
    accent: Color::Cyan,
    highlight_bg: Color::DarkGray,
    border: Color::Blue,
    good: Color::Green,
    warn: Color::Yellow,
    bad: Color::Red,
  };

  pub const LIGHT: Palette = Palette {
    bar_bg: Color::Gray,
    text: Color::Black,
    muted: Color::DarkGray,
    accent: Color::Blue,
    highlight_bg: Color::Gray,
    border: Color::Blue,
    good: Color::Green,
    warn: Color::Magenta,
    bad: Color::Red,
  };
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;

  #[test]
  fn test_default_is_system() {
    let store = MemoryStore::new();
    assert_eq!(Theme::load(&store), Theme::System);
  }

  #[test]
  fn test_save_and_load() {
    let store = MemoryStore::new();
    Theme::Dark.save(&store).unwrap();
    assert_eq!(store.get(keys::THEME).unwrap().as_deref(), Some("dark"));
    assert_eq!(Theme::load(&store), Theme::Dark);
  }

  #[test]
  fn test_garbage_falls_back_to_system() {
    let store = MemoryStore::new();
    store.set(keys::THEME, "sepia").unwrap();
    assert_eq!(Theme::load(&store), Theme::System);
  }

  #[test]
  fn test_parse() {
    assert_eq!("Light".parse::<Theme>().unwrap(), Theme::Light);
    assert_eq!("auto".parse::<Theme>().unwrap(), Theme::System);
    assert!("blue".parse::<Theme>().is_err());
  }

  #[test]
  fn test_next_cycles() {
    assert_eq!(Theme::Light.next().next().next(), Theme::Light);
  }

  #[test]
  fn test_system_detection() {
    assert!(system_is_dark(None));
    assert!(system_is_dark(Some("15;0")));
    assert!(!system_is_dark(Some("0;15")));
    assert!(!system_is_dark(Some("0;default;15")));
  }

  #[test]
  fn test_explicit_palettes() {
    assert_eq!(Theme::Dark.palette(), Palette::DARK);
    assert_eq!(Theme::Light.palette(), Palette::LIGHT);
  }
}
