//! Cache keys.

use std::fmt;

use crate::data::DateRange;

/// Identity of one logical query: entity, the user it is scoped to, and an
/// optional date range. Equal keys share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  pub entity: String,
  pub scope: String,
  pub range: Option<DateRange>,
}

impl QueryKey {
  pub fn new(entity: &str, scope: &str) -> Self {
    Self {
      entity: entity.to_string(),
      scope: scope.to_string(),
      range: None,
    }
  }

  pub fn with_range(mut self, range: DateRange) -> Self {
    self.range = Some(range);
    self
  }

  /// Whether this key belongs to `entity` for `scope`, whatever its range.
  pub fn is_entity(&self, entity: &str, scope: &str) -> bool {
    self.entity == entity && self.scope == scope
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.entity, self.scope)?;
    if let Some(range) = &self.range {
      write!(f, ":{}..{}", range.start, range.end)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;
  use std::collections::HashSet;

  #[test]
  fn test_equal_tuples_are_one_key() {
    let range = DateRange::last_days(7, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    let a = QueryKey::new("workouts", "u1").with_range(range);
    let b = QueryKey::new("workouts", "u1").with_range(range);
    let c = QueryKey::new("workouts", "u1");

    let set: HashSet<QueryKey> = [a.clone(), b, c.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);
    assert!(a.is_entity("workouts", "u1"));
    assert_eq!(a.to_string(), "workouts:u1:2024-05-04..2024-05-10");
    assert_eq!(c.to_string(), "workouts:u1");
  }
}
