use crate::state::{Board, CARD_HEIGHT, COLUMNS};
use crate::theme::{self, icons};
use leadflow_core::{format_brl, Lead, LeadStatus};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, board: &mut Board) {
    let area = f.size();
    let banner = if board.snapshot.error.is_some() { 1 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(banner),
            Constraint::Min(CARD_HEIGHT + 2),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, board, rows[0]);
    if let Some(error) = &board.snapshot.error {
        let text = format!(" {error}  (c to dismiss)");
        f.render_widget(Paragraph::new(text).style(theme::ERROR_STYLE), rows[1]);
    }
    render_columns(f, board, rows[2]);
    render_footer(f, board, rows[3]);

    if board.show_help {
        render_help(f, centered(area, 44, 16));
    }
}

fn render_header(f: &mut Frame, board: &Board, area: Rect) {
    let stats = &board.snapshot.stats;
    let mut spans = vec![
        Span::styled("leadflow", theme::HEADER_STYLE),
        Span::raw(format!("  {} leads", board.snapshot.leads.len())),
        Span::raw(format!("  conversion {}%", stats.conversion_rate)),
        Span::raw(format!(
            "  open pipeline {}",
            format_brl(stats.pipeline_value)
        )),
    ];
    if board.snapshot.loading {
        spans.push(Span::styled(
            format!("  {}", icons::LOADING),
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_columns(f: &mut Frame, board: &mut Board, area: Rect) {
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, COLUMNS as u32); COLUMNS])
        .split(area);
    board.update_layout(areas.to_vec());

    let hover = board.drag.and_then(|drag| drag.hover);
    for (column, status) in LeadStatus::ALL.into_iter().enumerate() {
        let column_area = areas[column];
        let border_style = if hover == Some(status) {
            Style::default().fg(Color::Yellow)
        } else if board.selected_column == column {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };
        let title = Span::styled(
            format!("{} ({})", status.label(), board.count(column)),
            Style::default()
                .fg(theme::status_color(status))
                .add_modifier(Modifier::BOLD),
        );
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style);
        let inner = block.inner(column_area);
        f.render_widget(block, column_area);

        let capacity = (inner.height / CARD_HEIGHT) as usize;
        let offset = board.scroll_window(column, capacity);
        let selected = (board.selected_column == column).then(|| board.selected_row(column));
        let dragging = board.drag.map(|drag| drag.lead_id);

        for (slot, (row, lead)) in board
            .cards(column)
            .enumerate()
            .skip(offset)
            .take(capacity)
            .enumerate()
        {
            let card_area = Rect {
                x: inner.x,
                y: inner.y + slot as u16 * CARD_HEIGHT,
                width: inner.width,
                height: CARD_HEIGHT,
            };
            let style = if dragging == Some(lead.id) {
                theme::DRAG_STYLE
            } else if selected == Some(row) {
                theme::SELECTED_STYLE
            } else {
                theme::zebra_row_style(row)
            };
            f.render_widget(Paragraph::new(card_lines(lead)).style(style), card_area);
        }
    }
}

fn card_lines(lead: &Lead) -> Vec<Line<'_>> {
    let company = lead.company.as_deref().unwrap_or("-");
    vec![
        Line::from(vec![
            Span::styled(
                format!("{} ", theme::temperature_icon(lead.temperature)),
                theme::temperature_color(lead.temperature),
            ),
            Span::styled(
                lead.name.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(format!("  {company}"), theme::DIM_STYLE)),
        Line::from(vec![
            Span::raw(format!("  {}", format_brl(lead.estimated_value))),
            Span::styled(
                format!(" {}", lead.temperature),
                theme::temperature_color(lead.temperature),
            ),
        ]),
    ]
}

fn render_footer(f: &mut Frame, board: &Board, area: Rect) {
    let line = match board.drag {
        Some(drag) => {
            let target = drag
                .hover
                .map(|status| status.label())
                .unwrap_or("(no column)");
            let name = board
                .snapshot
                .lead(drag.lead_id)
                .map(|lead| lead.name.as_str())
                .unwrap_or("");
            Line::from(vec![
                Span::styled(format!("{} ", icons::DROP), theme::DRAG_STYLE),
                Span::raw(format!("#{} {name} -> {target}", drag.lead_id)),
            ])
        }
        None => Line::from(Span::styled(
            "h/l column  j/k card  H/L move  r refresh  c clear error  ? help  q quit",
            theme::DIM_STYLE,
        )),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner_area = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let bindings = [
        ("h / Left", "Previous column"),
        ("l / Right", "Next column"),
        ("j / Down", "Next card"),
        ("k / Up", "Previous card"),
        ("H / <", "Move card left"),
        ("L / >", "Move card right"),
        ("drag", "Drop card on another column"),
        ("r", "Refresh leads"),
        ("c", "Dismiss error"),
        ("?", "Toggle help"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(bindings.into_iter().map(|(keys, action)| {
        Line::from(vec![
            Span::styled(format!("{keys:<11}"), Color::Cyan),
            Span::raw(action),
        ])
    }));

    let p = Paragraph::new(text).wrap(Wrap { trim: true });
    f.render_widget(p, inner_area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
