//! Fixed analysis stages and the progress milestones that complete them.

use serde::{Deserialize, Serialize};

use crate::types::Author;

/// One step of an analysis run as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Expected duration in seconds. Display hint only.
    pub duration: u32,
}

struct StageRow {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    duration: u32,
}

const STAGES: [StageRow; 5] = [
    StageRow {
        id: "search",
        title: "Web Search",
        description: "Finding relevant sources for the business idea",
        duration: 20,
    },
    StageRow {
        id: "website_analysis",
        title: "Website Analysis",
        description: "Reading and summarizing the sources found",
        duration: 40,
    },
    StageRow {
        id: "bigquery_metrics",
        title: "Data Warehouse Metrics",
        description: "Querying public datasets for market signals",
        duration: 30,
    },
    StageRow {
        id: "market_insights",
        title: "Market Insights",
        description: "Collecting market statistics and forecasts",
        duration: 30,
    },
    StageRow {
        id: "final_report",
        title: "Final Report",
        description: "Composing the summary and metrics",
        duration: 10,
    },
];

/// Ordered stage list for a run.
pub fn analysis_stages() -> Vec<StageDescriptor> {
    STAGES
        .iter()
        .map(|s| StageDescriptor {
            id: s.id.to_string(),
            title: s.title.to_string(),
            description: s.description.to_string(),
            duration: s.duration,
        })
        .collect()
}

/// Progress value and stage reached when an agent finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub stage_index: usize,
    pub progress: u8,
}

/// Reached only through the terminal `final_results` event.
pub const TERMINAL_MILESTONE: Milestone = Milestone {
    stage_index: 4,
    progress: 100,
};

/// Milestone for a final event from `author`. Non-final events and
/// authors without a stage advance nothing. `final_results` is handled by
/// the terminal path and never matches here.
pub fn milestone(author: &Author, is_final: bool) -> Option<Milestone> {
    if !is_final {
        return None;
    }
    let (stage_index, progress) = match author {
        Author::SearchAgent => (0, 25),
        Author::FetchWebsiteAgent => (1, 50),
        Author::BigqueryAgent => (2, 75),
        Author::StatistaAgent => (3, 90),
        _ => return None,
    };
    Some(Milestone {
        stage_index,
        progress,
    })
}

/// Milestone for a supplementary agent that gave up. The stage is closed
/// regardless of `is_final` so the run can move on.
pub fn fallback_milestone(author: &Author) -> Option<Milestone> {
    milestone(author, true).filter(|_| author.is_supplementary())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestones_strictly_increase_in_stage_order() {
        let authors = [
            Author::SearchAgent,
            Author::FetchWebsiteAgent,
            Author::BigqueryAgent,
            Author::StatistaAgent,
        ];
        let values: Vec<u8> = authors
            .iter()
            .map(|a| milestone(a, true).unwrap().progress)
            .chain(std::iter::once(TERMINAL_MILESTONE.progress))
            .collect();
        assert_eq!(values, vec![25, 50, 75, 90, 100]);
    }

    #[test]
    fn test_non_final_events_have_no_milestone() {
        assert_eq!(milestone(&Author::SearchAgent, false), None);
    }

    #[test]
    fn test_unknown_and_terminal_authors_have_no_milestone() {
        assert_eq!(milestone(&Author::Other("x".into()), true), None);
        assert_eq!(milestone(&Author::SequentialAgent, true), None);
        assert_eq!(milestone(&Author::FinalResults, true), None);
    }

    #[test]
    fn test_milestone_indices_point_into_stage_list() {
        let stages = analysis_stages();
        assert_eq!(stages.len(), 5);
        assert_eq!(stages[TERMINAL_MILESTONE.stage_index].id, "final_report");
        let m = milestone(&Author::BigqueryAgent, true).unwrap();
        assert_eq!(stages[m.stage_index].id, "bigquery_metrics");
    }

    #[test]
    fn test_fallback_only_for_supplementary_agents() {
        assert!(fallback_milestone(&Author::StatistaAgent).is_some());
        assert!(fallback_milestone(&Author::SearchAgent).is_none());
    }
}
