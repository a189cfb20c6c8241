use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

// --- Authors ---

/// The agent that produced a stream event.
///
/// Upstream sends authors as free strings. Known producers get their own
/// variant; anything else lands in `Other` and round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Author {
    SearchAgent,
    FetchWebsiteAgent,
    BigqueryAgent,
    StatistaAgent,
    SequentialAgent,
    FinalResults,
    System,
    Other(String),
}

impl Author {
    pub fn as_str(&self) -> &str {
        match self {
            Author::SearchAgent => "search_agent",
            Author::FetchWebsiteAgent => "fetch_website_agent",
            Author::BigqueryAgent => "bigquery_agent",
            Author::StatistaAgent => "statista_agent",
            Author::SequentialAgent => "sequential_agent",
            Author::FinalResults => "final_results",
            Author::System => "system",
            Author::Other(name) => name,
        }
    }

    /// Supplementary data-source agents. Their failures degrade the result
    /// instead of ending the run.
    pub fn is_supplementary(&self) -> bool {
        matches!(self, Author::BigqueryAgent | Author::StatistaAgent)
    }
}

impl From<&str> for Author {
    fn from(s: &str) -> Self {
        match s {
            "search_agent" => Author::SearchAgent,
            "fetch_website_agent" => Author::FetchWebsiteAgent,
            "bigquery_agent" => Author::BigqueryAgent,
            "statista_agent" => Author::StatistaAgent,
            "sequential_agent" => Author::SequentialAgent,
            "final_results" => Author::FinalResults,
            "system" => Author::System,
            other => Author::Other(other.to_string()),
        }
    }
}

impl From<String> for Author {
    fn from(s: String) -> Self {
        Author::from(s.as_str())
    }
}

impl From<Author> for String {
    fn from(author: Author) -> Self {
        match author {
            Author::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Metrics ---

/// Metric value as sent by the data agents: usually a JSON number or a
/// string. Anything else (null, booleans, nested JSON) is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(serde_json::Number),
    Text(String),
    Other(Value),
}

impl Default for MetricValue {
    fn default() -> Self {
        MetricValue::Other(Value::Null)
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{n}"),
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Other(Value::Null) => f.write_str("n/a"),
            MetricValue::Other(other) => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    #[serde(default, deserialize_with = "lenient_text")]
    pub metric_name: String,
    #[serde(default)]
    pub value: MetricValue,
    #[serde(default, deserialize_with = "lenient_text")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source_dataset: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub insight_summary: String,
}

/// Null reads as empty, non-string scalars as their JSON text.
fn lenient_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Keeps every readable entry. An entry that is not a metric object is
/// dropped on its own rather than failing the whole result.
fn lenient_metrics<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<MetricData>, D::Error> {
    let entries = match Value::deserialize(de)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        _ => {
            warn!("Ignoring metric list that is not an array");
            return Ok(Vec::new());
        }
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<MetricData>(entry) {
            Ok(metric) => Some(metric),
            Err(e) => {
                warn!(error = %e, "Dropping unreadable metric");
                None
            }
        })
        .collect())
}

/// Unix seconds, also accepted as a numeric string.
fn lenient_seconds<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

// --- Structured result ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryWithSentiment {
    pub summary: String,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
    #[serde(default)]
    pub sentiment_magnitude: Option<f64>,
}

/// The summary is either bare text or text with a sentiment reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Summary {
    Text(String),
    WithSentiment(SummaryWithSentiment),
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Text(text) => text,
            Summary::WithSentiment(s) => &s.summary,
        }
    }

    /// `(score, magnitude)` when the upstream attached a complete reading.
    pub fn sentiment(&self) -> Option<(f64, f64)> {
        match self {
            Summary::Text(_) => None,
            Summary::WithSentiment(s) => Some((s.sentiment_score?, s.sentiment_magnitude?)),
        }
    }
}

/// Payload of the terminal `final_results` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysisResult {
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default, deserialize_with = "lenient_metrics")]
    pub bigquery_metrics: Vec<MetricData>,
    #[serde(default, deserialize_with = "lenient_metrics")]
    pub statista_insights: Vec<MetricData>,
    /// Unix seconds as produced by the analysis service.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub timestamp: Option<f64>,
}

impl StructuredAnalysisResult {
    /// Only a result with a summary ends a run.
    pub fn is_terminal(&self) -> bool {
        self.summary.is_some()
    }

    /// Upstream completion time. Missing or non-positive stamps fall back to `now`.
    pub fn completed_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp
            .filter(|ts| *ts > 0.0 && ts.is_finite())
            .and_then(|ts| {
                let secs = ts.trunc() as i64;
                let nanos = (ts.fract() * 1e9) as u32;
                DateTime::from_timestamp(secs, nanos)
            })
            .unwrap_or(now)
    }
}

// --- Stream errors ---

/// Error reported inside the stream, normalized from either wire shape:
/// a bare string or `{"message": .., "type": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireError")]
pub struct StreamError {
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    /// Upstream capacity problems (model overloaded, HTTP 503).
    pub fn is_capacity(&self) -> bool {
        self.message.contains("overloaded") || self.message.contains("503")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireError {
    Text(String),
    Detailed {
        message: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
    Opaque(serde_json::Value),
}

impl From<WireError> for StreamError {
    fn from(wire: WireError) -> Self {
        match wire {
            WireError::Text(message) => StreamError {
                message,
                kind: None,
            },
            WireError::Detailed { message, kind } => StreamError { message, kind },
            WireError::Opaque(value) => StreamError {
                message: value.to_string(),
                kind: None,
            },
        }
    }
}

// --- Events ---

/// One unit of progress from the analysis service, as kept in the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub author: Author,
    pub content: String,
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredAnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StreamError>,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisEvent {
    /// A locally generated status line shown in the event log.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            author: Author::System,
            content: content.into(),
            is_final: true,
            structured_data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// The terminal payload, if this event ends the run.
    pub fn terminal_result(&self) -> Option<&StructuredAnalysisResult> {
        if self.author != Author::FinalResults {
            return None;
        }
        self.structured_data.as_ref().filter(|r| r.is_terminal())
    }
}
