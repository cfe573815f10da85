//! # steppanel-orchestration
//!
//! Sessions that tie a step tracker to a panel renderer and observers, step
//! scope guards, and a pipeline runner with a failure policy.

pub mod config;
pub mod pipeline;
pub mod plain;
pub mod scope;
pub mod session;

pub use config::{PlainOutput, SessionConfig, SurfaceChoice};
pub use pipeline::{FailurePolicy, Pipeline, PipelineReport, StepBody};
pub use plain::PlainReporter;
pub use scope::StepScope;
pub use session::{begin, with_session, Session, SessionReport};
