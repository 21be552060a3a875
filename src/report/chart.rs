//! SVG bar charts for the static report.

use std::fmt::Write;

use super::html::escape;
use crate::metrics::Average;

const PANEL_WIDTH: f64 = 600.0;
const PANEL_HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 70.0;
const BAR_COLOR: &str = "#4c72b0";

/// One bar chart panel.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub y_label: String,
    pub x_label: Option<String>,
    pub bars: Vec<(String, f64)>,
}

impl BarChart {
    fn render(&self, out: &mut String, offset_x: f64, offset_y: f64) {
        let plot_w = PANEL_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = PANEL_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let x0 = offset_x + MARGIN_LEFT;
        let y0 = offset_y + MARGIN_TOP + plot_h;

        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="16" font-weight="bold">{}</text>"#,
            offset_x + PANEL_WIDTH / 2.0,
            offset_y + MARGIN_TOP / 2.0 + 6.0,
            escape(&self.title)
        );
        let _ = writeln!(
            out,
            r#"<line x1="{x0:.1}" y1="{:.1}" x2="{x0:.1}" y2="{y0:.1}" stroke="black"/>"#,
            offset_y + MARGIN_TOP
        );
        let _ = writeln!(
            out,
            r#"<line x1="{x0:.1}" y1="{y0:.1}" x2="{:.1}" y2="{y0:.1}" stroke="black"/>"#,
            x0 + plot_w
        );
        let _ = writeln!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12" transform="rotate(-90 {:.1} {:.1})">{}</text>"#,
            offset_x + 18.0,
            offset_y + MARGIN_TOP + plot_h / 2.0,
            offset_x + 18.0,
            offset_y + MARGIN_TOP + plot_h / 2.0,
            escape(&self.y_label)
        );
        if let Some(label) = &self.x_label {
            let _ = writeln!(
                out,
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="12">{}</text>"#,
                x0 + plot_w / 2.0,
                offset_y + PANEL_HEIGHT - 10.0,
                escape(label)
            );
        }

        if self.bars.is_empty() {
            return;
        }

        let max = self.bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
        let slot = plot_w / self.bars.len() as f64;
        let bar_w = slot * 0.6;

        for (i, (label, value)) in self.bars.iter().enumerate() {
            let h = if max > 0.0 { value.max(0.0) / max * plot_h } else { 0.0 };
            let x = x0 + slot * i as f64 + (slot - bar_w) / 2.0;
            let cx = x + bar_w / 2.0;
            let _ = writeln!(
                out,
                r#"<rect x="{x:.1}" y="{:.1}" width="{bar_w:.1}" height="{h:.1}" fill="{BAR_COLOR}"/>"#,
                y0 - h
            );
            let _ = writeln!(
                out,
                r#"<text x="{cx:.1}" y="{:.1}" text-anchor="middle" font-size="11">{value:.2}</text>"#,
                y0 - h - 4.0
            );
            let _ = writeln!(
                out,
                r#"<text x="{cx:.1}" y="{:.1}" text-anchor="end" font-size="11" transform="rotate(-45 {cx:.1} {:.1})">{}</text>"#,
                y0 + 16.0,
                y0 + 16.0,
                escape(label)
            );
        }
    }
}

/// The four report panels in a 2x2 grid.
pub fn report_charts(by_strategy: &[Average], by_period: &[Average]) -> [BarChart; 4] {
    fn bars(avgs: &[Average], f: fn(&Average) -> f64) -> Vec<(String, f64)> {
        avgs.iter().map(|a| (a.key.clone(), f(a))).collect()
    }
    [
        BarChart {
            title: "Average Tokens by Strategy".into(),
            y_label: "Tokens".into(),
            x_label: None,
            bars: bars(by_strategy, |a| a.tokens),
        },
        BarChart {
            title: "Average Time by Strategy".into(),
            y_label: "Time (seconds)".into(),
            x_label: None,
            bars: bars(by_strategy, |a| a.time),
        },
        BarChart {
            title: "Average Tokens by Period".into(),
            y_label: "Tokens".into(),
            x_label: Some("Period (days)".into()),
            bars: bars(by_period, |a| a.tokens),
        },
        BarChart {
            title: "Average Time by Period".into(),
            y_label: "Time (seconds)".into(),
            x_label: Some("Period (days)".into()),
            bars: bars(by_period, |a| a.time),
        },
    ]
}

/// Render panels two per row into a standalone SVG document.
pub fn render_svg(charts: &[BarChart]) -> String {
    let rows = charts.len().div_ceil(2).max(1);
    let width = PANEL_WIDTH * 2.0;
    let height = PANEL_HEIGHT * rows as f64;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" font-family="Arial, sans-serif">"#
    );
    let _ = writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#);
    for (i, chart) in charts.iter().enumerate() {
        let col = (i % 2) as f64;
        let row = (i / 2) as f64;
        chart.render(&mut out, col * PANEL_WIDTH, row * PANEL_HEIGHT);
    }
    out.push_str("</svg>\n");
    out
}
