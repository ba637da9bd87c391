//! Plotters-powered score chart widget for Ratatui.
//!
//! Plotters output is rendered into the Ratatui buffer through
//! `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A render-only chart description; all series and bounds are computed by the caller.
pub struct ScorePlottersChart<'a> {
    /// Main line series (ROC curve or histogram outline).
    pub series: &'a [(f64, f64)],
    /// Dimmed reference line (the chance diagonal for ROC; may be empty).
    pub reference: &'a [(f64, f64)],
    /// Threshold marker path.
    pub marker: &'a [(f64, f64)],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl Widget for ScorePlottersChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to lay out a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let series_color = RGBColor(0, 255, 255); // cyan
            let reference_color = RGBColor(128, 128, 128);
            let marker_color = RGBColor(255, 0, 0);

            if !self.reference.is_empty() {
                chart.draw_series(LineSeries::new(self.reference.iter().copied(), &reference_color))?;
            }
            chart.draw_series(LineSeries::new(self.series.iter().copied(), &series_color))?;
            // Circles render with the wrong radius on this backend, so the
            // marker is drawn as a path.
            if !self.marker.is_empty() {
                chart.draw_series(LineSeries::new(self.marker.iter().copied(), &marker_color))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
