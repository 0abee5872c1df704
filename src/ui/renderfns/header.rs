use crate::theme::Palette;
use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, backend, signed-in user and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  user: Option<&str>,
  shortcuts: &[ShortcutInfo],
  palette: &Palette,
) {
  let sep = || Span::styled("│", Style::default().fg(palette.muted));
  let mut spans = vec![
    Span::styled(" vitals ", Style::default().fg(palette.accent).bold()),
    sep(),
    Span::styled(format!(" {} ", title), Style::default().fg(palette.text)),
    sep(),
    Span::styled(
      format!(" {} ", user.unwrap_or("signed out")),
      Style::default().fg(palette.warn).bold(),
    ),
    Span::raw(" "),
  ];

  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  for shortcut in sorted {
    // Keys highlighted, descriptions dimmed
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(palette.accent),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(palette.muted),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(palette.bar_bg));
  frame.render_widget(paragraph, area);
}
