//! Ratatui-based terminal dashboard.
//!
//! Renders aggregate supply against demand, the daily balance, and a daily
//! table. The consumption adjustment (←/→) only changes the displayed demand;
//! `r` drops the memoized model and refetches every source.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use plotters::style::RGBColor;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Terminal,
};

use crate::app::pipeline::ModelMemo;
use crate::data::cache::Fetch;
use crate::domain::Reconciled;
use crate::error::AppError;
use crate::report::{adjusted_rows, display_rows, fmt_fallback, summarize, AdjustedRow, Adjustment, DataOrigin};

mod plotters_chart;

use plotters_chart::{DailyChart, Series};

/// Start the dashboard.
pub fn run<F: Fetch>(memo: ModelMemo<F>, adjustment: Adjustment) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(memo, adjustment);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App<F> {
    memo: ModelMemo<F>,
    data: Arc<Reconciled>,
    adjustment: Adjustment,
    table_state: TableState,
    /// Row count of the last drawn table.
    shown_len: usize,
    status: String,
}

impl<F: Fetch> App<F> {
    fn new(mut memo: ModelMemo<F>, adjustment: Adjustment) -> Self {
        let data = memo.get();
        let status = loaded_status(&data);
        Self {
            memo,
            data,
            adjustment,
            table_state: TableState::default(),
            shown_len: 0,
            status,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Left | KeyCode::Char('-') => {
                self.adjustment = self.adjustment.decrement();
                self.status = format!("adjustment: {} TJ/d", self.adjustment.value());
            }
            KeyCode::Right | KeyCode::Char('+') => {
                self.adjustment = self.adjustment.increment();
                self.status = format!("adjustment: {} TJ/d", self.adjustment.value());
            }
            KeyCode::Char('0') => {
                self.adjustment = Adjustment::default();
                self.status = format!("adjustment reset to {} TJ/d", Adjustment::DEFAULT);
            }
            KeyCode::Down => self.scroll(1),
            KeyCode::Up => self.scroll(-1),
            KeyCode::Char('r') => {
                self.memo.invalidate();
                self.data = self.memo.get();
                self.status = format!("refreshed: {}", loaded_status(&self.data));
                return false;
            }
            _ => {}
        }

        // Picks up a new model once the memo has expired.
        self.data = self.memo.get();
        false
    }

    fn scroll(&mut self, delta: i32) {
        let next = step_selection(self.table_state.selected(), delta, self.shown_len);
        self.table_state.select(next);
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let (rows, origin) = display_rows(&self.data.model);
        let shown = adjusted_rows(&rows, self.adjustment);
        self.shown_len = shown.len();
        if self.table_state.selected().is_some_and(|i| i >= shown.len()) {
            self.table_state.select(shown.len().checked_sub(1));
        }

        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0], &shown, origin);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(52)])
            .split(chunks[1]);
        draw_charts(frame, body[0], &shown, origin);
        self.draw_table(frame, body[1], &shown);

        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect, shown: &[AdjustedRow], origin: DataOrigin) {
        let summary = summarize(shown);
        let mut lines: Vec<Line> = Vec::new();

        let origin_style = match origin {
            DataOrigin::Live => Style::default().fg(Color::Green),
            DataOrigin::Placeholder => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        };
        lines.push(Line::from(vec![
            Span::styled("gasb", Style::default().fg(Color::Cyan)),
            Span::raw(" | gas supply & demand balance | "),
            Span::styled(origin.label(), origin_style),
        ]));

        let memo_age = self
            .memo
            .age()
            .map(|a| format!("{}m", a.as_secs() / 60))
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(Span::styled(
            format!(
                "supply rows: {} | days: {} | fallback: {} | model age: {memo_age}",
                self.data.supply.len(),
                self.data.model.len(),
                fmt_fallback(self.data.fallback),
            ),
            Style::default().fg(Color::Gray),
        )));

        let tightest = summary
            .min_shortfall
            .map(|(d, v)| format!("{d} ({v:.0} TJ)"))
            .unwrap_or_else(|| "-".to_string());
        lines.push(Line::from(Span::styled(
            format!(
                "adjustment: {} TJ/d (shift {:+.0}) | deficit days: {} | tightest: {tightest}",
                self.adjustment.value(),
                self.adjustment.demand_delta(),
                summary.deficit_days,
            ),
            Style::default().fg(Color::Gray),
        )));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_table(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect, shown: &[AdjustedRow]) {
        let header = Row::new(vec!["gas day", "supply", "demand", "balance"])
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));

        let rows = shown.iter().map(|r| {
            let balance = r.shortfall();
            let balance_style = if balance < 0.0 {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Green)
            };
            Row::new(vec![
                Cell::from(r.gas_day.to_string()),
                Cell::from(format!("{:>9.1}", r.tj_available)),
                Cell::from(format!("{:>9.1}", r.tj_demand)),
                Cell::from(format!("{balance:>9.1}")).style(balance_style),
            ])
        });

        let table = Table::new(
            rows,
            [
                Constraint::Length(11),
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .block(Block::default().title("Daily balance (TJ)").borders(Borders::ALL))
        .row_highlight_style(Style::default().fg(Color::Black).bg(Color::White));

        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "←/→ adjust  0 reset  ↑/↓ scroll  r refresh  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn loaded_status(data: &Reconciled) -> String {
    if data.model.is_empty() {
        format!("no live model ({})", crate::report::fmt_status(&data.model.status))
    } else {
        format!("{} days loaded", data.model.len())
    }
}

fn draw_charts(frame: &mut ratatui::Frame<'_>, area: Rect, shown: &[AdjustedRow], origin: DataOrigin) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let series = ChartData::from_rows(shown);
    let suffix = match origin {
        DataOrigin::Live => "",
        DataOrigin::Placeholder => " [SAMPLE]",
    };

    let title = format!("Supply (cyan) vs Demand (yellow){suffix}");
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);
    frame.render_widget(Clear, inner);

    let Some(x_bounds) = series.x_bounds else {
        let msg = Paragraph::new("Waiting for data...").style(Style::default().fg(Color::Yellow));
        frame.render_widget(msg, inner);
        return;
    };

    frame.render_widget(
        DailyChart {
            series: vec![
                Series {
                    points: &series.supply,
                    color: RGBColor(0, 255, 255),
                },
                Series {
                    points: &series.demand,
                    color: RGBColor(255, 255, 0),
                },
            ],
            zero_line: false,
            x_bounds,
            y_bounds: series.level_bounds,
            fmt_x: fmt_axis_day,
            fmt_y: fmt_axis_tj,
        },
        inner,
    );

    let block = Block::default()
        .title(format!("Daily balance{suffix}"))
        .borders(Borders::ALL);
    let inner = block.inner(chunks[1]);
    frame.render_widget(block, chunks[1]);
    frame.render_widget(Clear, inner);
    frame.render_widget(
        DailyChart {
            series: vec![Series {
                points: &series.balance,
                color: RGBColor(0, 255, 0),
            }],
            zero_line: true,
            x_bounds,
            y_bounds: series.balance_bounds,
            fmt_x: fmt_axis_day,
            fmt_y: fmt_axis_tj,
        },
        inner,
    );
}

/// Chart-ready series; x is days since CE so axis labels can recover the date.
#[derive(Debug, Clone, PartialEq)]
struct ChartData {
    supply: Vec<(f64, f64)>,
    demand: Vec<(f64, f64)>,
    balance: Vec<(f64, f64)>,
    x_bounds: Option<[f64; 2]>,
    level_bounds: [f64; 2],
    balance_bounds: [f64; 2],
}

impl ChartData {
    fn from_rows(rows: &[AdjustedRow]) -> Self {
        let x = |r: &AdjustedRow| f64::from(r.gas_day.num_days_from_ce());
        let supply: Vec<_> = rows.iter().map(|r| (x(r), r.tj_available)).collect();
        let demand: Vec<_> = rows.iter().map(|r| (x(r), r.tj_demand)).collect();
        let balance: Vec<_> = rows.iter().map(|r| (x(r), r.shortfall())).collect();

        let x_bounds = match (supply.first(), supply.last()) {
            (Some(first), Some(last)) if last.0 > first.0 => Some([first.0, last.0]),
            (Some(first), Some(_)) => Some([first.0 - 1.0, first.0 + 1.0]),
            _ => None,
        };

        let level_bounds = padded_bounds(supply.iter().chain(&demand).map(|p| p.1));
        let balance_bounds = padded_bounds(balance.iter().map(|p| p.1).chain([0.0]));

        Self {
            supply,
            demand,
            balance,
            x_bounds,
            level_bounds,
            balance_bounds,
        }
    }
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((hi - lo).abs() * 0.05).max(1.0);
    [lo - pad, hi + pad]
}

/// Move a table selection by `delta`, staying within `len` rows.
fn step_selection(current: Option<usize>, delta: i32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let cur = current.unwrap_or(0) as i64;
    let next = (cur + i64::from(delta)).clamp(0, len as i64 - 1);
    Some(next as usize)
}

fn fmt_axis_day(v: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(v.round() as i32)
        .map(|d| d.format("%d %b").to_string())
        .unwrap_or_default()
}

fn fmt_axis_tj(v: f64) -> String {
    format!("{v:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::placeholder_rows;

    #[test]
    fn chart_data_spans_the_rows() {
        let shown = adjusted_rows(&placeholder_rows(), Adjustment::default());
        let data = ChartData::from_rows(&shown);

        assert_eq!(data.supply.len(), 30);
        let [x0, x1] = data.x_bounds.unwrap();
        assert_eq!(x1 - x0, 29.0);
        assert_eq!(fmt_axis_day(x0), "28 Jul");
        assert!(data.level_bounds[0] < 1600.0 && data.level_bounds[1] > 1945.0);
        assert!(data.balance_bounds[0] <= 0.0);
    }

    #[test]
    fn selection_stops_at_last_shown_row() {
        let mut sel = None;
        for _ in 0..10 {
            sel = step_selection(sel, 1, 3);
        }
        assert_eq!(sel, Some(2));
        assert_eq!(step_selection(Some(0), -1, 3), Some(0));
        assert_eq!(step_selection(Some(5), 1, 0), None);
    }

    #[test]
    fn empty_rows_have_no_x_range() {
        let data = ChartData::from_rows(&[]);
        assert_eq!(data.x_bounds, None);
        assert_eq!(data.level_bounds, [0.0, 1.0]);
    }
}
