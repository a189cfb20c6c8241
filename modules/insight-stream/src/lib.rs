//! Client side of an analysis run.
//!
//! Decodes the relay's SSE body into events, folds them into run state,
//! and persists progress and the final result for the dashboard:
//! bytes → frames → signals → reduce → persist.

pub mod bridge;
pub mod consumer;
pub mod display;
pub mod engine;
pub mod error;
pub mod frame;
pub mod reducer;
pub mod runner;
pub mod store;
pub mod traits;

pub use bridge::{Dashboard, PersistedResult, PersistenceBridge, ProgressSnapshot};
pub use consumer::{consume, AnalysisClient, RunReport};
pub use display::{display_body, visible_events, DisplayBody, LogEntry};
pub use engine::{Outcome, RunUpdate, StreamEngine};
pub use error::{Result, StoreError};
pub use frame::{classify, Frame, FrameDecoder, StreamSignal, MAX_FRAME_BYTES};
pub use reducer::{AnalysisState, ProgressReducer, RunStatus};
pub use runner::AnalysisRunner;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use traits::Reducer;
