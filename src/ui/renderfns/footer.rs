use crate::theme::Palette;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with view breadcrumb and the active theme
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], theme: &str, palette: &Palette) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(palette.muted)));
    }
    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(palette.accent).bold()
    } else {
      Style::default().fg(palette.text)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  let left = Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.bar_bg));
  frame.render_widget(left, area);

  let right = Paragraph::new(Span::styled(
    format!("theme: {} ", theme),
    Style::default().fg(palette.muted),
  ))
  .alignment(Alignment::Right);
  frame.render_widget(right, area);
}
