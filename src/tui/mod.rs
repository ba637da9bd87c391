//! Ratatui-based risk dashboard.
//!
//! Applicants are scored once (in-process or through a running scoring
//! service); the dashboard then lets an underwriter move the decision
//! threshold and watch decline rate and confusion figures change.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
};
use tracing::info;

use crate::app::pipeline::run_score;
use crate::client::ScoringClient;
use crate::domain::{ApplicantRecord, Decision, ModelSummary, ScoredApplicant};
use crate::error::AppError;
use crate::eval::{ConfusionMatrix, confusion_at, roc_auc, roc_curve};
use crate::io::table::Frame;
use crate::models::{frame_labels, record_from_frame_row};
use crate::report::{ScoreSummary, format::truncate, summarize};

mod plotters_chart;

use plotters_chart::ScorePlottersChart;

/// Threshold change per arrow key press.
const THRESHOLD_STEP: f64 = 0.01;
const HISTOGRAM_BINS: usize = 20;

/// Where the dashboard gets its scores.
#[derive(Debug, Clone)]
pub enum DashboardSource {
    /// Score `input` in-process with a saved model.
    Local { model: PathBuf, input: PathBuf },
    /// Post `input` rows to a running `crs serve`, `chunk` applicants per request.
    Remote {
        url: String,
        input: PathBuf,
        chunk: Option<usize>,
    },
}

/// Scored applicants plus the model they were scored with.
#[derive(Debug, Clone)]
pub struct DashboardData {
    pub source: String,
    pub model: ModelSummary,
    /// Sorted by probability, riskiest first.
    pub rows: Vec<ScoredApplicant>,
}

/// Load and score the dashboard input.
pub fn load_data(source: &DashboardSource) -> Result<DashboardData, AppError> {
    let (label, model, mut rows) = match source {
        DashboardSource::Local { model, input } => {
            let (scorer, rows) = run_score(model, input)?;
            (format!("local {}", model.display()), scorer.summary(), rows)
        }
        DashboardSource::Remote { url, input, chunk } => {
            let client = ScoringClient::new(url)?;
            let chunk = client.chunk_size(*chunk)?;
            let model = client.model_summary()?.summary;
            let rows = score_remote(&client, &model, input, chunk)?;
            (format!("remote {}", client.base_url()), model, rows)
        }
    };
    rows.sort_by(|a, b| b.score.probability.total_cmp(&a.score.probability));
    info!(rows = rows.len(), source = %label, "dashboard data loaded");
    Ok(DashboardData {
        source: label,
        model,
        rows,
    })
}

fn score_remote(
    client: &ScoringClient,
    model: &ModelSummary,
    input: &Path,
    chunk: usize,
) -> Result<Vec<ScoredApplicant>, AppError> {
    let frame = Frame::read_csv(input)?;
    let records: Vec<ApplicantRecord> = (0..frame.n_rows())
        .map(|row| record_from_frame_row(&frame, row, &model.id_column))
        .collect();
    let scores = client.score_batch(&records, chunk)?;
    let labels = frame_labels(&frame, &model.target_column);

    Ok(scores
        .into_iter()
        .zip(labels)
        .enumerate()
        .map(|(row, (score, label))| ScoredApplicant {
            id: score.id.clone().unwrap_or_else(|| (row + 1).to_string()),
            score,
            label,
        })
        .collect())
}

/// Start the dashboard.
pub fn run(source: DashboardSource) -> Result<(), AppError> {
    // Score before touching the terminal so errors print normally.
    let data = load_data(&source)?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = Dashboard::new(data);
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartMode {
    Roc,
    Histogram,
}

struct Dashboard {
    data: DashboardData,
    /// Outcomes and probabilities of the labelled rows.
    labels: Vec<f64>,
    labelled_probs: Vec<f64>,
    roc: Vec<(f64, f64)>,
    auc: Option<f64>,
    histogram: Vec<(f64, f64)>,
    histogram_max: f64,

    threshold: f64,
    summary: ScoreSummary,
    confusion: Option<ConfusionMatrix>,

    chart: ChartMode,
    selected: usize,
    offset: usize,
    status: String,
}

impl Dashboard {
    fn new(data: DashboardData) -> Self {
        let (labels, labelled_probs): (Vec<f64>, Vec<f64>) = data
            .rows
            .iter()
            .filter_map(|r| r.label.map(|y| (y, r.score.probability)))
            .unzip();
        let roc = roc_curve(&labels, &labelled_probs)
            .into_iter()
            .map(|p| (p.fpr, p.tpr))
            .collect();
        let auc = roc_auc(&labels, &labelled_probs);

        let probs: Vec<f64> = data.rows.iter().map(|r| r.score.probability).collect();
        let counts = histogram(&probs, HISTOGRAM_BINS);
        let histogram_max = counts.iter().copied().max().unwrap_or(0) as f64;

        let threshold = data.model.threshold;
        let chart = if auc.is_some() {
            ChartMode::Roc
        } else {
            ChartMode::Histogram
        };
        let status = format!("{} applicants scored", data.rows.len());

        let mut app = Self {
            summary: summarize(data.rows.iter().map(|r| &r.score), threshold),
            data,
            labels,
            labelled_probs,
            roc,
            auc,
            histogram: step_path(&counts),
            histogram_max,
            threshold,
            confusion: None,
            chart,
            selected: 0,
            offset: 0,
            status,
        };
        app.set_threshold(threshold);
        app
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold.clamp(0.0, 1.0);
        self.summary = summarize(self.data.rows.iter().map(|r| &r.score), self.threshold);
        self.confusion = (!self.labels.is_empty())
            .then(|| confusion_at(&self.labels, &self.labelled_probs, self.threshold));
    }

    /// Move the threshold by `delta`, snapping to the step grid so repeated presses do not drift.
    fn nudge_threshold(&mut self, delta: f64) {
        let next = ((self.threshold + delta) / THRESHOLD_STEP).round() * THRESHOLD_STEP;
        self.set_threshold(next);
        self.status = format!("threshold: {:.2}", self.threshold);
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
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
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

    /// Returns `true` when the dashboard should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let last = self.data.rows.len().saturating_sub(1);
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => self.selected = (self.selected + 1).min(last),
            KeyCode::PageUp => self.selected = self.selected.saturating_sub(10),
            KeyCode::PageDown => self.selected = (self.selected + 10).min(last),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = last,
            KeyCode::Left => self.nudge_threshold(-THRESHOLD_STEP),
            KeyCode::Right => self.nudge_threshold(THRESHOLD_STEP),
            KeyCode::Char('c') => match self.chart {
                ChartMode::Histogram if self.auc.is_none() => {
                    self.status = "No labelled rows: ROC unavailable.".to_string();
                }
                ChartMode::Histogram => self.chart = ChartMode::Roc,
                ChartMode::Roc => self.chart = ChartMode::Histogram,
            },
            _ => {}
        }
        false
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[1]);
        self.draw_chart(frame, body[0]);
        self.draw_table(frame, body[1]);

        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let model = &self.data.model;
        let gray = Style::default().fg(Color::Gray);
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("crs", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" credit risk dashboard | {}", self.data.source)),
        ]));
        lines.push(Line::from(Span::styled(
            format!(
                "model v{} trained {} | features={} | lambda={:.4} | holdout AUC={} | input AUC={}",
                model.version,
                model.created_at.format("%Y-%m-%d %H:%M"),
                model.feature_count,
                model.lambda,
                fmt_opt(model.auc),
                fmt_opt(self.auc),
            ),
            gray,
        )));

        let s = &self.summary;
        lines.push(Line::from(vec![
            Span::styled(
                format!("threshold={:.2}", self.threshold),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    " (model {:.2}) | declined {}/{} ({:.1}%) | mean p={:.4}",
                    model.threshold,
                    s.declined,
                    s.count,
                    100.0 * s.decline_rate(),
                    s.mean_probability
                ),
                gray,
            ),
        ]));

        let confusion_line = match &self.confusion {
            Some(c) => format!(
                "TP={} FP={} TN={} FN={} | precision={:.3} recall={:.3} F1={:.3}",
                c.true_positive,
                c.false_positive,
                c.true_negative,
                c.false_negative,
                c.precision(),
                c.recall(),
                c.f1()
            ),
            None => "no labels in input".to_string(),
        };
        lines.push(Line::from(Span::styled(confusion_line, gray)));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = match self.chart {
            ChartMode::Roc => "ROC curve",
            ChartMode::Histogram => "Score distribution",
        };
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        if self.data.rows.is_empty() {
            let msg = Paragraph::new("No applicants to chart.").style(Style::default().fg(Color::Yellow));
            frame.render_widget(msg, inner);
            return;
        }

        let t = self.threshold;
        let (series, reference, marker, axes) = match self.chart {
            ChartMode::Roc => {
                let (fpr, tpr) = self.confusion.map(|c| c.operating_point()).unwrap_or((0.0, 0.0));
                (
                    self.roc.as_slice(),
                    vec![(0.0, 0.0), (1.0, 1.0)],
                    vec![(fpr, 0.0), (fpr, tpr), (0.0, tpr)],
                    ChartAxes {
                        x_bounds: [0.0, 1.0],
                        y_bounds: [0.0, 1.0],
                        x_label: "FPR",
                        y_label: "TPR",
                        fmt_y: fmt_axis_rate,
                    },
                )
            }
            ChartMode::Histogram => {
                let y_max = (self.histogram_max * 1.05).max(1.0);
                (
                    self.histogram.as_slice(),
                    Vec::new(),
                    vec![(t, 0.0), (t, y_max)],
                    ChartAxes {
                        x_bounds: [0.0, 1.0],
                        y_bounds: [0.0, y_max],
                        x_label: "probability",
                        y_label: "count",
                        fmt_y: fmt_axis_count,
                    },
                )
            }
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = ScorePlottersChart {
            series,
            reference: &reference,
            marker: &marker,
            x_bounds: axes.x_bounds,
            y_bounds: axes.y_bounds,
            x_label: axes.x_label,
            y_label: axes.y_label,
            fmt_x: fmt_axis_rate,
            fmt_y: axes.fmt_y,
        };
        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, &axes);
        }
    }

    fn draw_table(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(format!("Applicants by risk ({})", self.data.rows.len()))
            .borders(Borders::ALL);

        // Borders plus the header row.
        let visible = area.height.saturating_sub(3).max(1) as usize;
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + visible {
            self.offset = self.selected + 1 - visible;
        }

        let end = (self.offset + visible).min(self.data.rows.len());
        let rows: Vec<Row> = self.data.rows[self.offset..end]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let decision = Decision::from_probability(s.score.probability, self.threshold);
                let decision_style = match decision {
                    Decision::Decline => Style::default().fg(Color::Red),
                    Decision::Approve => Style::default().fg(Color::Green),
                };
                let factor = s
                    .score
                    .top_factors
                    .first()
                    .map(|f| format!("{} ({:+.2})", f.feature, f.contribution))
                    .unwrap_or_default();
                Row::new(vec![
                    Cell::from(format!("{}", self.offset + i + 1)),
                    Cell::from(truncate(&s.id, 12)),
                    Cell::from(format!("{:.4}", s.score.probability)),
                    Cell::from(decision.as_str()).style(decision_style),
                    Cell::from(s.score.grade.as_str()),
                    Cell::from(s.label.map(|y| format!("{y:.0}")).unwrap_or_else(|| "-".to_string())),
                    Cell::from(truncate(&factor, 32)),
                ])
            })
            .collect();

        let header = Row::new(vec!["#", "id", "prob", "decision", "grade", "label", "top factor"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        let widths = [
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Min(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().fg(Color::Black).bg(Color::White));

        let mut state = TableState::default();
        if !self.data.rows.is_empty() {
            state.select(Some(self.selected - self.offset));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ scroll  ←/→ threshold  c chart  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Count probabilities into `bins` equal-width bins over `[0, 1]`.
fn histogram(probs: &[f64], bins: usize) -> Vec<usize> {
    let mut counts = vec![0; bins];
    if bins == 0 {
        return counts;
    }
    for &p in probs {
        let i = ((p.clamp(0.0, 1.0) * bins as f64) as usize).min(bins - 1);
        counts[i] += 1;
    }
    counts
}

/// Outline of a histogram as a single line path.
fn step_path(counts: &[usize]) -> Vec<(f64, f64)> {
    if counts.is_empty() {
        return Vec::new();
    }
    let w = 1.0 / counts.len() as f64;
    let mut out = Vec::with_capacity(2 * counts.len() + 2);
    out.push((0.0, 0.0));
    for (i, &c) in counts.iter().enumerate() {
        let lo = i as f64 * w;
        out.push((lo, c as f64));
        out.push((lo + w, c as f64));
    }
    out.push((1.0, 0.0));
    out
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.3}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_axis_rate(v: f64) -> String {
    format!("{v:.2}")
}

fn fmt_axis_count(v: f64) -> String {
    format!("{v:.0}")
}

struct ChartAxes {
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    x_label: &'static str,
    y_label: &'static str,
    fmt_y: fn(f64) -> String,
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    axes: &ChartAxes,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = axes.x_bounds;
    let [y0, y1] = axes.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = fmt_axis_rate(x0 + u * (x1 - x0));
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let label = (axes.fmt_y)(y0 + u * (y1 - y0));
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        let width = label.len() as u16;
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(axes.x_label)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(axes.y_label)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
