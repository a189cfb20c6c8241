pub mod agents;
pub mod config;
pub mod error;
pub mod format;
pub mod sentiment;
pub mod stages;
pub mod types;

pub use agents::AgentProfile;
pub use config::RelayConfig;
pub use error::{RunFailure, CAPACITY_MESSAGE};
pub use sentiment::{magnitude_label, SentimentBand};
pub use stages::{analysis_stages, milestone, Milestone, StageDescriptor, TERMINAL_MILESTONE};
pub use types::*;
