use std::time::{Duration, Instant};

use ratatui::{prelude::*, widgets::*};
use unicode_width::UnicodeWidthStr;

use crate::core::{
    colorize::{Markup, Tone},
    document::{Document, LogView, NodeKind, Table, TabMenuNode},
    request::{StatusIndicator, StatusState},
    NodeId,
};
use crate::tui::app::App;

/// Rows around the panel: title, two borders and the help line.
pub const CHROME_ROWS: u16 = 4;

const ACCENT: Color = Color::Rgb(0, 150, 0);

pub fn render_ui(f: &mut Frame, app: &App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // title
            Constraint::Min(0),
            Constraint::Length(1), // help
        ])
        .split(area);

    let title = Paragraph::new(format!("simkit  {}", app.kit.location()))
        .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    f.render_widget(title, chunks[0]);

    let block = Block::default()
        .title(format!(" {} ", app.panel_title()))
        .borders(Borders::ALL)
        .border_type(BorderType::Plain);
    if let Some(panel) = app.top_panel() {
        let context = RenderContext {
            selection: app.selection().map(|(table, row, _)| (table, row)),
            focused_menu: app.focused_menu_id(),
            now: app.kit.now(),
            abort_delay: app.kit.config().abort_delay,
        };
        let doc = app.kit.document();
        let scroll_top = doc.panel(panel).map(|p| p.scroll_top).unwrap_or(0);
        let lines = panel_lines(doc, panel, &context);
        let body = Paragraph::new(lines)
            .block(block)
            .scroll((u16::try_from(scroll_top).unwrap_or(u16::MAX), 0));
        f.render_widget(body, chunks[1]);
    } else {
        f.render_widget(block, chunks[1]);
    }

    let help = Paragraph::new("Enter open  Backspace back  Tab/Left/Right tabs  r retry  a abort  ? help  q quit")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[2]);
}

pub struct RenderContext {
    pub selection: Option<(NodeId, usize)>,
    pub focused_menu: Option<NodeId>,
    pub now: Instant,
    pub abort_delay: Duration,
}

/// One line per row the document lays out for the panel, so the panel's
/// scroll position applies to the result unchanged.
pub fn panel_lines(doc: &Document, panel: NodeId, context: &RenderContext) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for id in doc.panel_content(panel) {
        if !doc.is_visible(id) {
            continue;
        }
        let Some(node) = doc.node(id) else {
            continue;
        };
        match &node.kind {
            NodeKind::Panel(_) | NodeKind::Container => {}
            NodeKind::Heading(text) => lines.push(Line::styled(
                text.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            NodeKind::Paragraph(text) => {
                if text.lines().next().is_none() {
                    lines.push(Line::default());
                }
                lines.extend(text.lines().map(|line| Line::raw(line.to_string())));
            }
            NodeKind::TabMenu(menu) => lines.push(tab_menu_line(menu, context.focused_menu == Some(id))),
            NodeKind::Table(table) => {
                let selected = context
                    .selection
                    .and_then(|(table_id, row)| (table_id == id).then_some(row));
                lines.extend(table_lines(table, selected));
            }
            NodeKind::Log(log) => lines.extend(log_window(log)),
            NodeKind::Status(status) => lines.extend(status_lines(status, context)),
        }
    }
    lines
}

fn tab_menu_line(menu: &TabMenuNode, focused: bool) -> Line<'static> {
    let mut spans = Vec::new();
    for (index, tab) in menu.tabs.iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw(" "));
        }
        let mut style = Style::default();
        if menu.active == Some(index) {
            style = style.fg(Color::White).bg(Color::Rgb(0, 100, 0)).add_modifier(Modifier::BOLD);
        }
        if focused {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        spans.push(Span::styled(format!(" {tab} "), style));
    }
    Line::from(spans)
}

fn table_lines(table: &Table, selected: Option<usize>) -> Vec<Line<'static>> {
    let columns = table
        .rows
        .iter()
        .map(|row| row.cells.len())
        .chain(std::iter::once(table.header.len()))
        .max()
        .unwrap_or(0);
    let mut widths = vec![0; columns];
    for cells in std::iter::once(&table.header).chain(table.rows.iter().map(|row| &row.cells)) {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.width());
        }
    }
    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell}{}", " ".repeat(width - cell.width())))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = Vec::with_capacity(table.lines());
    if !table.header.is_empty() {
        lines.push(Line::styled(
            format_row(&table.header),
            Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ));
    }
    for (index, row) in table.rows.iter().enumerate() {
        let mut style = Style::default();
        if row.link.is_some() {
            style = style.fg(Color::Cyan);
        }
        if selected == Some(index) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::styled(format_row(&row.cells), style));
    }
    if let Some(notice) = &table.notice {
        lines.push(Line::styled(notice.clone(), Style::default().fg(Color::DarkGray)));
    }
    lines
}

fn tone_style(tone: Tone, bold: bool) -> Style {
    let color = match tone {
        Tone::Gray => Color::DarkGray,
        Tone::Red => Color::Red,
        Tone::Green => Color::Green,
        Tone::Yellow => Color::Yellow,
        Tone::Blue => Color::Blue,
        Tone::Magenta if bold => Color::LightMagenta,
        Tone::Magenta => Color::Magenta,
        Tone::Turquoise => Color::Cyan,
    };
    let style = Style::default().fg(color);
    if bold {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

/// Styled lines of colourized log text; a trailing newline ends the last line
/// instead of starting an empty one.
pub fn markup_lines(markup: &[Markup]) -> Vec<Line<'static>> {
    let mut lines = vec![Line::default()];
    let mut style = Style::default();
    for token in markup {
        match token {
            Markup::Open { tone, bold } => style = tone_style(*tone, *bold),
            Markup::Close => style = Style::default(),
            Markup::Text(text) => {
                for (index, part) in text.split('\n').enumerate() {
                    if index > 0 {
                        lines.push(Line::default());
                    }
                    if !part.is_empty() {
                        if let Some(line) = lines.last_mut() {
                            line.spans.push(Span::styled(part.to_string(), style));
                        }
                    }
                }
            }
        }
    }
    if lines.last().is_some_and(|line| line.spans.is_empty()) {
        lines.pop();
    }
    lines
}

fn log_window(log: &LogView) -> Vec<Line<'static>> {
    let mut window: Vec<Line<'static>> = markup_lines(&log.markup)
        .into_iter()
        .skip(log.scroll_top)
        .take(log.viewport_height)
        .collect();
    window.resize(log.viewport_height, Line::default());
    window
}

fn status_lines(status: &StatusIndicator, context: &RenderContext) -> Vec<Line<'static>> {
    match &status.state {
        StatusState::Pending { .. } => {
            let mut text = "Loading...".to_string();
            if status.abort_visible(context.now, context.abort_delay) {
                text.push_str("  [a] abort");
            }
            vec![Line::styled(text, Style::default().fg(Color::Yellow))]
        }
        StatusState::Error { message } => {
            let style = Style::default().fg(Color::Red);
            let mut lines = message_lines(message, style);
            lines.push(Line::styled("[r] retry", style.add_modifier(Modifier::BOLD)));
            lines
        }
        StatusState::Success { message } => message_lines(message, Style::default().fg(ACCENT)),
    }
}

fn message_lines(message: &str, style: Style) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = message
        .lines()
        .map(|line| Line::styled(line.to_string(), style))
        .collect();
    if lines.is_empty() {
        lines.push(Line::default());
    }
    lines
}
