use crate::backend::tables;
use crate::context::AppContext;
use crate::query::Query;
use crate::router::Route;
use crate::stats::DashboardSummary;
use crate::theme::Palette;
use crate::ui::renderfns::opt_value;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::{placeholder, titled_block};
use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{BarChart, Block, Borders, Paragraph};
use std::sync::Arc;

/// Weekly summary: headline numbers and minutes trained per day
pub struct DashboardView {
  ctx: Arc<AppContext>,
  query: Query<DashboardSummary>,
}

impl DashboardView {
  pub fn new(ctx: Arc<AppContext>) -> Self {
    let fetch_ctx = ctx.clone();
    let mut query = Query::new(move || {
      let ctx = fetch_ctx.clone();
      async move { ctx.dashboard(Utc::now()).await.map_err(|e| e.to_string()) }
    });
    query.fetch();
    Self { ctx, query }
  }

  fn card(frame: &mut Frame, area: Rect, label: &str, value: String, palette: &Palette) {
    let lines = vec![
      Line::from(Span::styled(value, Style::default().fg(palette.accent).bold())),
      Line::from(Span::styled(label.to_string(), Style::default().fg(palette.muted))),
    ];
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(palette.border));
    frame.render_widget(
      Paragraph::new(lines).alignment(Alignment::Center).block(block),
      area,
    );
  }

  fn render_summary(&self, summary: &DashboardSummary, frame: &mut Frame, area: Rect, palette: &Palette) {
    let rows = Layout::vertical([
      Constraint::Length(4),
      Constraint::Length(4),
      Constraint::Min(6),
    ])
    .split(area);

    let top = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(rows[0]);
    Self::card(frame, top[0], "workouts this week", summary.workouts_this_week.to_string(), palette);
    Self::card(frame, top[1], "minutes", summary.minutes_this_week.to_string(), palette);
    Self::card(frame, top[2], "calories", summary.calories_this_week.to_string(), palette);
    Self::card(frame, top[3], "day streak", summary.streak_days.to_string(), palette);

    let bottom = Layout::horizontal([Constraint::Ratio(1, 4); 4]).split(rows[1]);
    Self::card(frame, bottom[0], "average mood", opt_value(summary.average_mood, "/ 10"), palette);
    Self::card(frame, bottom[1], "average sleep", opt_value(summary.average_sleep, "h"), palette);
    Self::card(frame, bottom[2], "latest weight", opt_value(summary.latest_weight, "kg"), palette);
    Self::card(
      frame,
      bottom[3],
      "upcoming activities",
      summary.upcoming_activities.to_string(),
      palette,
    );

    let labels: Vec<String> = summary
      .week
      .iter()
      .map(|d| d.date.format("%a").to_string())
      .collect();
    let data: Vec<(&str, u64)> = labels
      .iter()
      .zip(&summary.week)
      .map(|(label, day)| (label.as_str(), u64::from(day.minutes)))
      .collect();
    let chart = BarChart::default()
      .block(
        Block::default()
          .title(" Minutes per day ")
          .borders(Borders::ALL)
          .border_style(Style::default().fg(palette.border)),
      )
      .data(data.as_slice())
      .bar_width(5)
      .bar_gap(2)
      .bar_style(Style::default().fg(palette.accent))
      .value_style(Style::default().fg(palette.text).bg(palette.accent));
    frame.render_widget(chart, rows[2]);
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        for table in [tables::WORKOUTS, tables::HEALTH_METRICS, tables::HEALTH_ACTIVITIES] {
          self.ctx.invalidate(table);
        }
        self.query.refetch();
      }
      KeyCode::Char('w') => return ViewAction::Navigate(Route::Workouts.path().to_string()),
      KeyCode::Char('m') => return ViewAction::Navigate(Route::Metrics.path().to_string()),
      KeyCode::Char('a') => return ViewAction::Navigate(Route::Activities.path().to_string()),
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, palette: &Palette) {
    let block = titled_block("Dashboard", &self.query, None, palette);
    match self.query.data() {
      Some(summary) => {
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.render_summary(summary, frame, inner, palette);
      }
      None if self.query.is_error() => {
        placeholder(frame, area, block, "Failed to load your summary. Press 'r' to retry.", palette)
      }
      None => placeholder(frame, area, block, "Loading...", palette),
    }
  }

  fn breadcrumb_label(&self) -> String {
    Route::Dashboard.title().to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh"),
      ShortcutInfo::new("w", "workouts"),
      ShortcutInfo::new("m", "metrics"),
      ShortcutInfo::new("a", "activities"),
    ]
  }
}
