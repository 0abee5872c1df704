use super::{opt_text, required, CachedQuery};
use crate::backend::tables;
use crate::context::AppContext;
use crate::data::{metrics, parse_local_datetime, DateRange};
use crate::models::{HealthMetric, MetricDraft, MetricType};
use crate::query::Query;
use crate::router::Route;
use crate::stats::{daily_average, DailyAverage};
use crate::theme::Palette;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::{local_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{ensure_valid_selection, mutation, placeholder, poll_mutation, titled_block};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Sparkline, Tabs};
use std::sync::Arc;

const HISTORY_DAYS: u32 = 30;
const TREND_DAYS: u32 = 14;

/// Mood, sleep and the other tracked measurements, one type per tab
pub struct MetricsView {
  ctx: Arc<AppContext>,
  list: CachedQuery<Vec<HealthMetric>>,
  tab: usize,
  list_state: ListState,
  form: Option<Form>,
  pending: Option<Query<String>>,
  status: Option<String>,
}

impl MetricsView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    Self::with_type(ctx, MetricType::Mood)
  }

  pub fn with_type(ctx: Arc<AppContext>, metric_type: MetricType) -> Self {
    let fetch_ctx = ctx.clone();
    let list = CachedQuery::new(move || {
      let ctx = fetch_ctx.clone();
      async move {
        let range = DateRange::last_days(HISTORY_DAYS, Utc::now().date_naive());
        ctx.metrics(range).await
      }
    });
    let tab = MetricType::ALL
      .iter()
      .position(|m| *m == metric_type)
      .unwrap_or(0);
    Self {
      ctx,
      list,
      tab,
      list_state: ListState::default(),
      form: None,
      pending: None,
      status: None,
    }
  }

  fn metric_type(&self) -> MetricType {
    MetricType::ALL[self.tab]
  }

  /// Entries of the current type, newest first
  fn visible(&self) -> Vec<&HealthMetric> {
    let metric_type = self.metric_type();
    let mut rows: Vec<&HealthMetric> = self
      .list
      .data()
      .map(|rows| rows.iter().filter(|m| m.metric_type == metric_type).collect())
      .unwrap_or_default();
    rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
    rows
  }

  fn trend(&self) -> Vec<DailyAverage> {
    let range = DateRange::last_days(TREND_DAYS, Utc::now().date_naive());
    let rows = self.list.data().map(|v| v.as_slice()).unwrap_or(&[]);
    daily_average(rows, self.metric_type(), range)
  }

  fn new_form(metric_type: MetricType) -> Form {
    let (low, high) = metric_type.bounds();
    Form::new(format!(
      "Record {} ({} to {} {})",
      metric_type,
      low,
      high,
      metric_type.default_unit()
    ))
    .field("Value", "")
    .field("When", "YYYY-MM-DD HH:MM, empty for now")
    .field("Notes", "optional")
  }

  fn draft_from(metric_type: MetricType, values: &[String]) -> Result<MetricDraft, String> {
    let [value, when, notes] = values else {
      return Err("Form is incomplete".to_string());
    };
    let recorded_at = match when.trim() {
      "" => Utc::now(),
      raw => parse_local_datetime(raw).map_err(|e| e.to_string())?,
    };
    let draft = MetricDraft {
      metric_type,
      value: required(value, "Value")?,
      notes: opt_text(notes),
      recorded_at,
    };
    draft.validate().map_err(|e| e.to_string())?;
    Ok(draft)
  }

  fn submit(&mut self, values: Vec<String>) {
    let metric_type = self.metric_type();
    let Some(form) = self.form.as_mut() else {
      return;
    };
    let draft = match Self::draft_from(metric_type, &values) {
      Ok(draft) => draft,
      Err(e) => return form.set_error(e),
    };
    form.set_busy(true);
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      let draft = draft.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        let metric = metrics::record_metric(ctx.remote.as_ref(), &user_id, draft)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok(format!("Recorded {} {} {}", metric.metric_type, metric.value, metric.unit))
      }
    }));
  }

  fn delete_selected(&mut self) {
    let Some(id) = self
      .list_state
      .selected()
      .and_then(|i| self.visible().get(i).map(|m| m.id))
    else {
      return;
    };
    let ctx = self.ctx.clone();
    self.pending = Some(mutation(move || {
      let ctx = ctx.clone();
      async move {
        let user_id = ctx.user_id().map_err(|e| e.to_string())?;
        metrics::delete_metric(ctx.remote.as_ref(), &user_id, id)
          .await
          .into_result()
          .map_err(|e| e.to_string())?;
        Ok("Entry deleted".to_string())
      }
    }));
  }

  fn switch_tab(&mut self, forward: bool) {
    let n = MetricType::ALL.len();
    self.tab = if forward { (self.tab + 1) % n } else { (self.tab + n - 1) % n };
    self.list_state.select(None);
  }

  fn render_tabs(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let titles: Vec<String> = MetricType::ALL.iter().map(|m| m.to_string()).collect();
    let tabs = Tabs::new(titles)
      .select(self.tab)
      .style(Style::default().fg(palette.muted))
      .highlight_style(Style::default().fg(palette.accent).add_modifier(Modifier::BOLD))
      .divider("|");
    frame.render_widget(tabs, area);
  }

  fn render_trend(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let trend = self.trend();
    let recorded: Vec<f64> = trend.iter().filter_map(|d| d.value).collect();
    let summary = if recorded.is_empty() {
      "no entries".to_string()
    } else {
      let avg = recorded.iter().sum::<f64>() / recorded.len() as f64;
      format!("avg {:.1} {} over {} days", avg, self.metric_type().default_unit(), recorded.len())
    };
    // Sparkline takes integers; keep one decimal of resolution
    let data: Vec<u64> = trend
      .iter()
      .map(|d| d.value.map(|v| (v * 10.0).round().max(0.0) as u64).unwrap_or(0))
      .collect();
    let block = Block::default()
      .title(format!(" Last {} days · {} ", TREND_DAYS, summary))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.border));
    let spark = Sparkline::default()
      .block(block)
      .data(&data)
      .style(Style::default().fg(palette.accent));
    frame.render_widget(spark, area);
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);
    let label = format!("{} entries{}", self.metric_type(), self.list.freshness());
    let block = titled_block(&label, self.list.query(), Some(len), palette);
    if len == 0 {
      let text = if self.list.query().is_loading() {
        "Loading..."
      } else {
        "Nothing recorded. Press 'a' to add an entry."
      };
      placeholder(frame, area, block, text, palette);
      return;
    }
    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|m| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<18}", local_time(m.recorded_at)),
            Style::default().fg(palette.muted),
          ),
          Span::styled(format!("{:>8}", m.value), Style::default().fg(palette.accent)),
          Span::raw(format!(" {:<7}", m.unit)),
          Span::styled(
            truncate(m.notes.as_deref().unwrap_or(""), 50),
            Style::default().fg(palette.muted),
          ),
        ]))
      })
      .collect();
    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(palette.highlight_bg).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for MetricsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(form) = self.form.as_mut() {
      match form.handle_key(key) {
        KeyResult::Event(FormEvent::Cancelled) => self.form = None,
        KeyResult::Event(FormEvent::Submitted(values)) => self.submit(values),
        _ => {}
      }
      return ViewAction::None;
    }
    match key.code {
      KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.switch_tab(true),
      KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.switch_tab(false),
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('a') => self.form = Some(Self::new_form(self.metric_type())),
      KeyCode::Char('d') => self.delete_selected(),
      KeyCode::Char('r') => {
        self.ctx.invalidate(tables::HEALTH_METRICS);
        self.list.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let rows = Layout::vertical([
      Constraint::Length(1),
      Constraint::Length(7),
      Constraint::Min(3),
      Constraint::Length(1),
    ])
    .split(area);
    self.render_tabs(frame, rows[0], palette);
    self.render_trend(frame, rows[1], palette);
    self.render_list(frame, rows[2], palette);
    if let Some(status) = &self.status {
      frame.render_widget(
        Paragraph::new(format!(" {}", status)).style(Style::default().fg(palette.muted)),
        rows[3],
      );
    }
    if let Some(form) = &self.form {
      form.render_popup(frame, area, palette);
    }
  }

  fn breadcrumb_label(&self) -> String {
    format!("{} · {}", Route::Metrics.title(), self.metric_type())
  }

  fn tick(&mut self) {
    self.list.tick();
    match poll_mutation(&mut self.pending) {
      Some(Ok(message)) => {
        self.form = None;
        self.status = Some(message);
        self.ctx.invalidate(tables::HEALTH_METRICS);
        self.list.refetch();
      }
      Some(Err(e)) => match self.form.as_mut() {
        Some(form) => form.set_error(e),
        None => self.status = Some(e),
      },
      None => {}
    }
  }

  fn captures_input(&self) -> bool {
    self.form.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("tab", "next type").with_priority(20),
      ShortcutInfo::new("a", "record"),
      ShortcutInfo::new("d", "delete"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn values(v: [&str; 3]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_value_must_be_in_range() {
    let draft = MetricsView::draft_from(MetricType::Mood, &values(["7", "", "good day"])).unwrap();
    assert_eq!(draft.value, 7.0);
    assert_eq!(draft.notes.as_deref(), Some("good day"));
    assert!(MetricsView::draft_from(MetricType::Mood, &values(["11", "", ""])).is_err());
    assert_eq!(
      MetricsView::draft_from(MetricType::Sleep, &values(["", "", ""])).unwrap_err(),
      "Value is required"
    );
  }

  #[tokio::test]
  async fn test_tabs_wrap_around() {
    let harness = crate::context::tests::harness();
    let mut view = MetricsView::with_type(harness.ctx.clone(), MetricType::Water);
    view.switch_tab(true);
    assert_eq!(view.metric_type(), MetricType::Mood);
    view.switch_tab(false);
    assert_eq!(view.metric_type(), MetricType::Water);
  }
}
