//! Hands run state to the dashboard through session storage.
//!
//! Two keys: `analysisProgress` is rewritten on every progress change and is
//! only a resume hint for the progress display; `analysisResult` is written
//! once per successful run and is what the dashboard reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use insight_common::format::format_summary;
use insight_common::{MetricData, StageDescriptor, StructuredAnalysisResult};

use crate::error::Result;
use crate::store::SessionStore;

pub const RESULT_KEY: &str = "analysisResult";
pub const PROGRESS_KEY: &str = "analysisProgress";

/// Final result in the shape the dashboard consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedResult {
    /// Escaped HTML with bold/italic markup applied.
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_magnitude: Option<f64>,
    #[serde(default)]
    pub bigquery_metrics: Vec<MetricData>,
    #[serde(default)]
    pub statista_insights: Vec<MetricData>,
    pub timestamp: DateTime<Utc>,
}

impl PersistedResult {
    pub fn from_structured(result: &StructuredAnalysisResult, now: DateTime<Utc>) -> Self {
        let summary = result.summary.as_ref();
        let sentiment = summary.and_then(|s| s.sentiment());
        Self {
            summary: summary.map(|s| format_summary(s.text())).unwrap_or_default(),
            sentiment_score: sentiment.map(|(score, _)| score),
            sentiment_magnitude: sentiment.map(|(_, magnitude)| magnitude),
            bigquery_metrics: result.bigquery_metrics.clone(),
            statista_insights: result.statista_insights.clone(),
            timestamp: result.completed_at(now),
        }
    }
}

/// Progress display state, persisted so a reload can redraw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub progress: u8,
    pub current_stage: Option<StageDescriptor>,
    pub completed_stages: Vec<String>,
}

/// What the results view shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Dashboard {
    /// No result stored. A normal state, not an error.
    Empty,
    Ready(PersistedResult),
}

pub struct PersistenceBridge<S> {
    store: S,
}

impl<S: SessionStore> PersistenceBridge<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save_progress(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        self.store.set(PROGRESS_KEY, &json)
    }

    pub fn load_progress(&self) -> Result<Option<ProgressSnapshot>> {
        match self.store.get(PROGRESS_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn save_result(&self, result: &PersistedResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.store.set(RESULT_KEY, &json)
    }

    /// Read the stored result. Unreadable values are logged and shown as empty.
    pub fn load_dashboard(&self) -> Dashboard {
        let json = match self.store.get(RESULT_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return Dashboard::Empty,
            Err(e) => {
                warn!(error = %e, "Failed to read analysis result");
                return Dashboard::Empty;
            }
        };
        match serde_json::from_str(&json) {
            Ok(result) => Dashboard::Ready(result),
            Err(e) => {
                warn!(error = %e, "Failed to parse stored analysis result");
                Dashboard::Empty
            }
        }
    }

    pub fn clear_result(&self) -> Result<()> {
        self.store.remove(RESULT_KEY)
    }

    /// Drop both keys.
    pub fn reset(&self) -> Result<()> {
        self.store.remove(PROGRESS_KEY)?;
        self.store.remove(RESULT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use insight_common::{analysis_stages, MetricValue, Summary, SummaryWithSentiment};

    fn metric(name: &str, value: MetricValue) -> MetricData {
        MetricData {
            metric_name: name.to_string(),
            value,
            unit: "%".to_string(),
            source_dataset: "bigquery-public-data.google_trends".to_string(),
            insight_summary: format!("{name} is trending"),
        }
    }

    fn structured() -> StructuredAnalysisResult {
        StructuredAnalysisResult {
            summary: Some(Summary::Text("**Strong** demand".to_string())),
            bigquery_metrics: vec![
                metric("growth", MetricValue::Number(12.into())),
                metric("share", MetricValue::Text("n/a".into())),
            ],
            statista_insights: vec![metric("market", MetricValue::Text("$4B".into()))],
            timestamp: Some(1_718_000_000.0),
        }
    }

    #[test]
    fn test_result_round_trip_preserves_metric_order() {
        let bridge = PersistenceBridge::new(MemorySessionStore::new());
        let persisted = PersistedResult::from_structured(&structured(), Utc::now());
        bridge.save_result(&persisted).unwrap();

        match bridge.load_dashboard() {
            Dashboard::Ready(loaded) => {
                assert_eq!(loaded.bigquery_metrics, structured().bigquery_metrics);
                assert_eq!(loaded.statista_insights, structured().statista_insights);
                assert_eq!(loaded, persisted);
            }
            Dashboard::Empty => panic!("expected stored result"),
        }
    }

    #[test]
    fn test_summary_is_formatted_but_metrics_untouched() {
        let persisted = PersistedResult::from_structured(&structured(), Utc::now());
        assert_eq!(persisted.summary, "<strong>Strong</strong> demand");
        assert_eq!(persisted.bigquery_metrics[0].metric_name, "growth");
        assert_eq!(persisted.timestamp.timestamp(), 1_718_000_000);
    }

    #[test]
    fn test_sentiment_carried_when_present() {
        let mut result = structured();
        result.summary = Some(Summary::WithSentiment(SummaryWithSentiment {
            summary: "fine".to_string(),
            sentiment_score: Some(0.7),
            sentiment_magnitude: Some(0.4),
        }));
        let persisted = PersistedResult::from_structured(&result, Utc::now());
        assert_eq!(persisted.summary, "fine");
        assert_eq!(persisted.sentiment_score, Some(0.7));
        assert_eq!(persisted.sentiment_magnitude, Some(0.4));

        let json = serde_json::to_value(PersistedResult::from_structured(&structured(), Utc::now()))
            .unwrap();
        assert!(json.get("sentiment_score").is_none());
    }

    #[test]
    fn test_missing_result_is_empty_dashboard() {
        let bridge = PersistenceBridge::new(MemorySessionStore::new());
        assert_eq!(bridge.load_dashboard(), Dashboard::Empty);
    }

    #[test]
    fn test_corrupt_result_is_empty_dashboard() {
        let store = MemorySessionStore::new();
        store.set(RESULT_KEY, "{not json").unwrap();
        let bridge = PersistenceBridge::new(store);
        assert_eq!(bridge.load_dashboard(), Dashboard::Empty);
    }

    #[test]
    fn test_progress_snapshot_uses_camel_case_keys() {
        let bridge = PersistenceBridge::new(MemorySessionStore::new());
        let snapshot = ProgressSnapshot {
            progress: 25,
            current_stage: Some(analysis_stages()[1].clone()),
            completed_stages: vec!["search".to_string()],
        };
        bridge.save_progress(&snapshot).unwrap();

        let raw = bridge.store().get(PROGRESS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["progress"], 25);
        assert_eq!(value["currentStage"]["id"], "website_analysis");
        assert_eq!(value["completedStages"][0], "search");

        assert_eq!(bridge.load_progress().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_reset_clears_both_keys() {
        let bridge = PersistenceBridge::new(MemorySessionStore::new());
        bridge
            .save_result(&PersistedResult::from_structured(&structured(), Utc::now()))
            .unwrap();
        bridge
            .save_progress(&ProgressSnapshot {
                progress: 100,
                current_stage: None,
                completed_stages: vec![],
            })
            .unwrap();
        bridge.reset().unwrap();
        assert_eq!(bridge.load_dashboard(), Dashboard::Empty);
        assert_eq!(bridge.load_progress().unwrap(), None);
    }
}
