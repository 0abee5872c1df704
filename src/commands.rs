/// Available commands and autocomplete logic
use crate::router::Route;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "dashboard",
    aliases: &["d", "home"],
    description: "Weekly summary",
  },
  Command {
    name: "workouts",
    aliases: &["w", "workout"],
    description: "Workout log",
  },
  Command {
    name: "plans",
    aliases: &["p", "plan"],
    description: "Workout plans",
  },
  Command {
    name: "metrics",
    aliases: &["m", "mood", "sleep"],
    description: "Mood, sleep and body metrics",
  },
  Command {
    name: "activities",
    aliases: &["a", "activity", "reminders"],
    description: "Scheduled activities",
  },
  Command {
    name: "profile",
    aliases: &["me", "account"],
    description: "Your profile",
  },
  Command {
    name: "signups",
    aliases: &["admin", "pending"],
    description: "Review pending signups (admin)",
  },
  Command {
    name: "theme",
    aliases: &["t", "dark", "light"],
    description: "Cycle light/dark/system theme",
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "Sign out",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit vitals",
  },
];

/// Route opened by a command, if it is a navigation command
pub fn route_for(name: &str) -> Option<Route> {
  match name {
    "dashboard" => Some(Route::Dashboard),
    "workouts" => Some(Route::Workouts),
    "plans" => Some(Route::Plans),
    "metrics" => Some(Route::Metrics),
    "activities" => Some(Route::Activities),
    "profile" => Some(Route::Profile),
    "signups" => Some(Route::AdminSignups),
    _ => None,
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("workouts");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "workouts");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("sleep");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "metrics");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("act");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "activities");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("ignu");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "signups");
  }

  #[test]
  fn test_every_navigation_command_has_a_route() {
    let navigating: Vec<_> = COMMANDS
      .iter()
      .filter_map(|c| route_for(c.name))
      .collect();
    assert_eq!(navigating.len(), 7);
    assert!(navigating.iter().all(|r| !r.is_public()));
  }
}
