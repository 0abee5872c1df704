//! Filter chaining for table queries, encoded as PostgREST query parameters.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
  Eq,
  Gte,
  Lt,
  Lte,
}

impl Op {
  pub fn as_str(self) -> &'static str {
    match self {
      Op::Eq => "eq",
      Op::Gte => "gte",
      Op::Lt => "lt",
      Op::Lte => "lte",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub column: String,
  pub op: Op,
  pub value: Value,
}

impl Filter {
  pub fn new(column: &str, op: Op, value: impl Into<Value>) -> Self {
    Self {
      column: column.to_string(),
      op,
      value: value.into(),
    }
  }

  pub fn eq(column: &str, value: impl Into<Value>) -> Self {
    Self::new(column, Op::Eq, value)
  }

  /// Encode as a `(column, "op.value")` query pair.
  pub fn to_pair(&self) -> (String, String) {
    (
      self.column.clone(),
      format!("{}.{}", self.op.as_str(), encode_value(&self.value)),
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column: String,
  pub ascending: bool,
}

/// A select query: filters plus ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
  pub filters: Vec<Filter>,
  pub order: Option<Order>,
  pub limit: Option<usize>,
}

impl Select {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn filter(mut self, column: &str, op: Op, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::new(column, op, value));
    self
  }

  pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
    self.filter(column, Op::Eq, value)
  }

  pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
    self.filter(column, Op::Gte, value)
  }

  pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
    self.filter(column, Op::Lte, value)
  }

  pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
    self.filter(column, Op::Lt, value)
  }

  pub fn order(mut self, column: &str, ascending: bool) -> Self {
    self.order = Some(Order {
      column: column.to_string(),
      ascending,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Query parameters for a GET request.
  pub fn query_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    pairs.extend(self.filters.iter().map(Filter::to_pair));
    if let Some(order) = &self.order {
      let dir = if order.ascending { "asc" } else { "desc" };
      pairs.push(("order".to_string(), format!("{}.{}", order.column, dir)));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
  }
}

fn encode_value(value: &Value) -> String {
  match value {
    Value::Null => "null".to_string(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_query_pairs() {
    let select = Select::new()
      .eq("user_id", "u1")
      .gte("performed_at", "2024-05-01T00:00:00Z")
      .eq("reminder_sent", false)
      .order("performed_at", false)
      .limit(20);

    assert_eq!(
      select.query_pairs(),
      vec![
        ("select".to_string(), "*".to_string()),
        ("user_id".to_string(), "eq.u1".to_string()),
        (
          "performed_at".to_string(),
          "gte.2024-05-01T00:00:00Z".to_string()
        ),
        ("reminder_sent".to_string(), "eq.false".to_string()),
        ("order".to_string(), "performed_at.desc".to_string()),
        ("limit".to_string(), "20".to_string()),
      ]
    );
  }

  #[test]
  fn test_number_encoding() {
    let f = Filter::new("value", Op::Lt, 7.5);
    assert_eq!(f.to_pair().1, "lt.7.5");
  }
}
