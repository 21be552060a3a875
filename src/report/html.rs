use crate::metrics::{fastest, most_token_efficient, Average};
use crate::storage::repository::SummaryRow;

use super::{CHARTS_FILE, EXPORT_FILE, STATISTICS_FILE};

/// Escape text for HTML element content and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn averages_list(averages: &[Average], value: fn(&Average) -> f64, places: usize) -> String {
    averages
        .iter()
        .map(|a| format!("{}: {:.*}", escape(&a.key), places, value(a)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn results_table(rows: &[SummaryRow]) -> String {
    let mut out = String::from(
        "<table class=\"data\" id=\"results\">\n<thead>\n<tr><th>id</th><th>level</th><th>entity</th>\
         <th>period_days</th><th>strategy</th><th>summary_text</th><th>tokens</th>\
         <th>time_taken</th><th>generated_at</th></tr>\n</thead>\n<tbody>\n",
    );
    for row in rows {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            row.id,
            escape(&row.level),
            escape(&row.entity),
            row.period_days,
            escape(&row.strategy),
            escape(&row.summary_text),
            row.tokens,
            row.time_taken,
            escape(&row.generated_at),
        ));
    }
    out.push_str("</tbody>\n</table>");
    out
}

/// Render the report page. `by_strategy` drives the key findings.
pub fn render_report(rows: &[SummaryRow], by_strategy: &[Average], generated_on: &str) -> String {
    let efficient = most_token_efficient(by_strategy)
        .map(|a| escape(&a.key))
        .unwrap_or_default();
    let quickest = fastest(by_strategy)
        .map(|a| escape(&a.key))
        .unwrap_or_default();
    let token_averages = averages_list(by_strategy, |a| a.tokens, 0);
    let time_averages = averages_list(by_strategy, |a| a.time, 2);
    let table = results_table(rows);
    let generated_on = escape(generated_on);

    format!(
        r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Summarization Analysis Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; vertical-align: top; }}
        th {{ background-color: #f2f2f2; }}
        .summary {{ background-color: #f9f9f9; padding: 10px; margin: 10px 0; }}
    </style>
</head>
<body>
    <h1>Summarization Analysis Report</h1>
    <p>Generated on: {generated_on}</p>

    <h2>Summary Statistics</h2>
    <img src="{CHARTS_FILE}" alt="Analysis Charts" style="max-width: 100%;">

    <h2>Key Findings</h2>
    <div class="summary">
        <h3>Token Usage</h3>
        <p>Most efficient strategy: {efficient}</p>
        <p>Average tokens: {token_averages}</p>
    </div>

    <div class="summary">
        <h3>Time Performance</h3>
        <p>Fastest strategy: {quickest}</p>
        <p>Average time (seconds): {time_averages}</p>
    </div>

    <h2>Detailed Results</h2>
    {table}

    <h2>Files</h2>
    <ul>
        <li><a href="{EXPORT_FILE}">Raw Data (CSV)</a></li>
        <li><a href="{STATISTICS_FILE}">Summary Statistics (CSV)</a></li>
        <li><a href="{CHARTS_FILE}">Charts (SVG)</a></li>
    </ul>
</body>
</html>
"##
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, strategy: &str, text: &str) -> SummaryRow {
        SummaryRow {
            id,
            level: "user".into(),
            entity: "alice".into(),
            period_days: 3,
            strategy: strategy.into(),
            summary_text: text.into(),
            tokens: 120,
            time_taken: 1.25,
            generated_at: "2024-07-10T12:00:00".into(),
        }
    }

    fn averages() -> Vec<Average> {
        vec![
            Average {
                key: "daily_chained".into(),
                count: 2,
                tokens: 812.6,
                time: 3.456,
            },
            Average {
                key: "direct".into(),
                count: 2,
                tokens: 301.4,
                time: 4.0,
            },
        ]
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_render_report_findings() {
        let html = render_report(&[row(1, "direct", "ok")], &averages(), "2024-07-10 12:00:00");
        assert!(html.contains("<h1>Summarization Analysis Report</h1>"));
        assert!(html.contains("Generated on: 2024-07-10 12:00:00"));
        assert!(html.contains("Most efficient strategy: direct"));
        assert!(html.contains("Average tokens: daily_chained: 813, direct: 301"));
        assert!(html.contains("Fastest strategy: daily_chained"));
        assert!(html.contains("Average time (seconds): daily_chained: 3.46, direct: 4.00"));
        assert!(html.contains(r#"<img src="analysis_charts.svg""#));
        assert!(html.contains(r#"<a href="summaries_export.csv">"#));
        assert!(html.contains(r#"<a href="summary_statistics.csv">"#));
    }

    #[test]
    fn test_render_report_escapes_rows() {
        let html = render_report(
            &[row(7, "direct", "<script>alert(1)</script>")],
            &averages(),
            "now",
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("<td>7</td>"));
        assert!(html.contains("<td>1.25</td>"));
    }
}
