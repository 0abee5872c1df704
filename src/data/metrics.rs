use uuid::Uuid;

use super::{guarded, DateRange, Outcome};
use crate::backend::{decode_rows, single, tables, to_row, Filter, RemoteTable, Select};
use crate::error::ApiError;
use crate::models::{HealthMetric, MetricDraft, MetricType};

/// Metric entries in chronological order. Mood and sleep logs are metrics
/// of type `mood` and `sleep`.
pub async fn list_metrics(
  remote: &dyn RemoteTable,
  user_id: &str,
  metric_type: Option<MetricType>,
  range: Option<DateRange>,
) -> Outcome<Vec<HealthMetric>> {
  guarded("list_metrics", async {
    let mut query = Select::new().eq("user_id", user_id);
    if let Some(metric_type) = metric_type {
      query = query.eq("metric_type", metric_type.as_str());
    }
    if let Some(range) = range {
      let (start, end) = range.bounds();
      query = query
        .gte("recorded_at", start.to_rfc3339())
        .lt("recorded_at", end.to_rfc3339());
    }
    let rows = remote
      .select(tables::HEALTH_METRICS, &query.order("recorded_at", true))
      .await?;
    decode_rows(rows)
  })
  .await
}

pub async fn record_metric(
  remote: &dyn RemoteTable,
  user_id: &str,
  draft: MetricDraft,
) -> Outcome<HealthMetric> {
  guarded("record_metric", async {
    let metric = draft.into_metric(user_id);
    let rows = remote
      .insert(tables::HEALTH_METRICS, vec![to_row(&metric)?])
      .await?;
    single(rows)
  })
  .await
}

pub async fn delete_metric(remote: &dyn RemoteTable, user_id: &str, id: Uuid) -> Outcome<()> {
  guarded("delete_metric", async {
    let removed = remote
      .delete(
        tables::HEALTH_METRICS,
        &[Filter::eq("id", id.to_string()), Filter::eq("user_id", user_id)],
      )
      .await?;
    if removed.is_empty() {
      return Err(ApiError::not_found(format!("Entry {} not found", id)));
    }
    Ok(())
  })
  .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryTables;
  use chrono::{TimeZone, Utc};

  #[tokio::test]
  async fn test_filter_by_type_and_order() {
    let remote = MemoryTables::with_actor("u1");
    let at = |h| Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap();
    for (metric_type, value, hour) in [
      (MetricType::Mood, 7.0, 20),
      (MetricType::Sleep, 7.5, 7),
      (MetricType::Mood, 4.0, 9),
    ] {
      let draft = MetricDraft {
        metric_type,
        value,
        notes: None,
        recorded_at: at(hour),
      };
      record_metric(&remote, "u1", draft).await.into_result().unwrap();
    }

    let moods = list_metrics(&remote, "u1", Some(MetricType::Mood), None)
      .await
      .into_result()
      .unwrap();
    let values: Vec<f64> = moods.iter().map(|m| m.value).collect();
    assert_eq!(values, vec![4.0, 7.0]);
    assert!(moods.iter().all(|m| m.unit == "score"));

    let all = list_metrics(&remote, "u1", None, None).await.into_result().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].metric_type, MetricType::Sleep);
  }

  #[tokio::test]
  async fn test_delete_metric() {
    let remote = MemoryTables::with_actor("u1");
    let metric = record_metric(
      &remote,
      "u1",
      MetricDraft {
        metric_type: MetricType::Water,
        value: 500.0,
        notes: None,
        recorded_at: Utc::now(),
      },
    )
    .await
    .into_result()
    .unwrap();
    assert!(delete_metric(&remote, "u1", metric.id).await.success);
    assert!(remote.rows(tables::HEALTH_METRICS).is_empty());
  }
}
