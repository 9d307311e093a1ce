//! TUI rendering: one table, one lock per frame.
//!
//! ┌ tablestat  zk1:2181  Region  #42  3.0s ─────────────────────────┐
//! │ Region              1:Reads      2:Writes   ...  0:Compacting   │
//! │ usertable,row00…    1200 | 35    80 | 2     ...  0 | 0          │
//! │ ...                                                             │
//! │ Total               9000 | 410   700 | 31   ...  0 | 0          │
//! └─────────────────────────────────────────────────────────────────┘
//!  diff from previous · sort: Reads (diff) · saved to ./tablestat_...
//!  d start/prev  c changed  r rate  R reset  S save  L# Enter load  p pause  q quit

use super::app::App;
use ratatui::{prelude::*, widgets::*};

use tablestat_core::{LoadState, Metric};

const ENTITY_WIDTH: u16 = 36;

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // table
            Constraint::Length(1), // status
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    let state = app.monitor().state();
    draw_table(f, rows[0], app, &state);
    draw_status(f, rows[1], app, &state);
    draw_keys(f, rows[2], app);
}

fn changed_style(changed: bool) -> Style {
    if changed {
        Style::default().fg(Color::Red).bold()
    } else {
        Style::default()
    }
}

fn draw_table(f: &mut Frame, area: Rect, app: &App, state: &LoadState) {
    let header_cells = std::iter::once(Cell::from(state.level().column_label())).chain(
        Metric::ALL
            .iter()
            .map(|m| Cell::from(format!("{}:{}", m.ordinal() % 10, m.name()))),
    );
    let header = Row::new(header_cells).style(Style::default().bold().fg(Color::Cyan));

    let entities = state.visible_entities();
    // borders, header and total row
    let capacity = area.height.saturating_sub(4) as usize;
    let start = app.scroll().min(entities.len().saturating_sub(1));

    let mut rows: Vec<Row> = entities
        .iter()
        .skip(start)
        .take(capacity)
        .map(|e| {
            let name = Cell::from(e.to_string()).style(changed_style(state.is_record_changed(e)));
            let cells = Metric::ALL.iter().map(|&m| {
                Cell::from(state.cell_text(e, m)).style(changed_style(state.is_value_changed(e, m)))
            });
            Row::new(std::iter::once(name).chain(cells))
        })
        .collect();

    let total = std::iter::once(Cell::from("Total")).chain(Metric::ALL.iter().map(|&m| {
        Cell::from(state.summary_cell_text(m)).style(changed_style(state.is_summary_changed(m)))
    }));
    rows.push(Row::new(total).style(Style::default().bold()));

    let widths = std::iter::once(Constraint::Length(ENTITY_WIDTH))
        .chain(Metric::ALL.iter().map(|_| Constraint::Fill(1)));

    let elapsed = state.elapsed_millis() as f64 / 1000.0;
    let config = app.monitor().config();
    let title = Line::from(vec![
        Span::styled(" tablestat ", Style::default().bold().fg(Color::Cyan)),
        Span::styled(config.target.clone(), Style::default().bold().fg(Color::Yellow)),
        Span::styled(
            format!(
                "  {}  #{}  {elapsed:.1}s  {}/{} rows ",
                state.level().column_label(),
                state.iterations(),
                entities.len(),
                state.current().len()
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title),
    );
    f.render_widget(table, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App, state: &LoadState) {
    let mut spans = vec![
        Span::raw(format!(
            " diff from {}",
            if state.is_diff_from_start() { "start" } else { "previous" }
        )),
        Span::raw(format!(" · sort: {}", state.sort_description())),
    ];
    if state.is_show_rate() {
        spans.push(Span::styled(" · rate", Style::default().fg(Color::Yellow)));
    }
    if state.is_show_changed_only() {
        spans.push(Span::styled(" · changed only", Style::default().fg(Color::Yellow)));
    }
    if app.monitor().is_paused() {
        spans.push(Span::styled(" · PAUSED", Style::default().bold().fg(Color::Red)));
    }
    if let Some((message, is_error)) = app.status() {
        let style = if is_error {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        spans.push(Span::styled(format!(" · {message}"), style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_keys(f: &mut Frame, area: Rect, app: &App) {
    let text = match app.pending_load() {
        Some(digits) => format!(
            " load saved baseline #{digits}_   0-9: index  Enter: load  Backspace: erase  other: cancel"
        ),
        None => " d start/prev  c changed  r rate  R reset  S save  L# Enter load  p pause  1-0 sort  !-) diff sort  ` natural  q quit"
            .to_string(),
    };
    let bar = Paragraph::new(text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
