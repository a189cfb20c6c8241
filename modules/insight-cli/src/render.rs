//! Plain-text rendering of the progress log and the results dashboard.

use std::fmt::Write;

use insight_common::{magnitude_label, MetricData, SentimentBand};
use insight_stream::{Dashboard, LogEntry, PersistedResult, ProgressSnapshot};

pub fn log_entry(entry: &LogEntry) -> String {
    format!("{}\n{}\n", entry.header(), indent(&entry.body.to_string(), "   "))
}

pub fn dashboard(dashboard: &Dashboard) -> String {
    match dashboard {
        Dashboard::Empty => "No Analysis Results\nNo summary data available.\n".to_string(),
        Dashboard::Ready(result) => ready(result),
    }
}

fn ready(result: &PersistedResult) -> String {
    let mut out = String::from("📊 Analysis Dashboard\n\n");
    out.push_str(&metrics("📊", "BigQuery Analytics", &result.bigquery_metrics));
    out.push('\n');
    out.push_str(&metrics("📈", "Market Insights", &result.statista_insights));
    out.push('\n');

    out.push_str("🌐 Google Analysis Summary\n");
    out.push_str(&indent(&html_to_text(&result.summary), "   "));
    out.push('\n');

    if let (Some(score), Some(magnitude)) = (result.sentiment_score, result.sentiment_magnitude) {
        out.push('\n');
        out.push_str(&sentiment(score, magnitude));
    }

    let _ = writeln!(
        out,
        "\nAnalysis completed: {}",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}

fn metrics(icon: &str, title: &str, metrics: &[MetricData]) -> String {
    let mut out = format!("{icon} {title}\n");
    if metrics.is_empty() {
        out.push_str("   No data available\n");
        return out;
    }
    for metric in metrics {
        let _ = writeln!(out, "   • {} ({})", metric.metric_name, metric.source_dataset);
        if metric.unit.is_empty() {
            let _ = writeln!(out, "     {}", metric.value);
        } else {
            let _ = writeln!(out, "     {} {}", metric.value, metric.unit);
        }
        if !metric.insight_summary.is_empty() {
            let _ = writeln!(out, "     {}", metric.insight_summary);
        }
    }
    out
}

fn sentiment(score: f64, magnitude: f64) -> String {
    let band = SentimentBand::from_score(score);
    format!(
        "Content Sentiment Analysis\n   Overall Sentiment: {} {band} ({score:.2})\n   {} ({magnitude:.2})\n   {}\n",
        band.icon(),
        magnitude_label(magnitude),
        band.interpretation(),
    )
}

pub fn progress(snapshot: Option<&ProgressSnapshot>) -> String {
    let Some(snapshot) = snapshot else {
        return "No analysis in progress.\n".to_string();
    };
    let mut out = format!("Progress: {}%\n", snapshot.progress);
    match &snapshot.current_stage {
        Some(stage) => {
            let _ = writeln!(out, "Current stage: {} ({})", stage.title, stage.description);
        }
        None => out.push_str("Current stage: none\n"),
    }
    if !snapshot.completed_stages.is_empty() {
        let _ = writeln!(out, "Completed: {}", snapshot.completed_stages.join(", "));
    }
    out
}

/// The stored summary is HTML for the browser; terminals get the text.
pub fn html_to_text(html: &str) -> String {
    ["<strong>", "</strong>", "<em>", "</em>"]
        .iter()
        .fold(html.to_string(), |text, tag| text.replace(tag, ""))
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
