//! How events appear in the progress view's log.

use insight_common::format::search_urls;
use insight_common::{AgentProfile, AnalysisEvent, Author};

/// Body text of one log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBody {
    /// Search agent announcing the pages it will read.
    Searching { urls: Vec<String> },
    /// Website agent working through fetched pages.
    Summarizing,
    Text(String),
}

impl std::fmt::Display for DisplayBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayBody::Searching { urls } => {
                write!(f, "Searching for information at")?;
                for url in urls {
                    write!(f, "\n  - {url}")?;
                }
                Ok(())
            }
            DisplayBody::Summarizing => write!(f, "Summarizing"),
            DisplayBody::Text(text) => write!(f, "{text}"),
        }
    }
}

pub fn display_body(event: &AnalysisEvent) -> DisplayBody {
    match event.author {
        Author::SearchAgent => match search_urls(&event.content) {
            Some(urls) => DisplayBody::Searching { urls },
            None => DisplayBody::Text(event.content.clone()),
        },
        Author::FetchWebsiteAgent => DisplayBody::Summarizing,
        _ => DisplayBody::Text(event.content.clone()),
    }
}

/// Only final events are shown; intermediate chunks stay in the state.
pub fn visible_events(events: &[AnalysisEvent]) -> impl Iterator<Item = &AnalysisEvent> {
    events.iter().filter(|e| e.is_final)
}

/// One rendered log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub profile: AgentProfile,
    pub body: DisplayBody,
}

impl LogEntry {
    pub fn from_event(event: &AnalysisEvent) -> Self {
        Self {
            profile: event.author.profile(),
            body: display_body(event),
        }
    }

    /// `🔍 Google Search Agent`
    pub fn header(&self) -> String {
        format!("{} {}", self.profile.icon, self.profile.name)
    }
}
