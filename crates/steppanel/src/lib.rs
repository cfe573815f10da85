//! steppanel demo library: CLI configuration, the demo pipeline, and exit
//! code mapping.

pub mod app;
pub mod completion;
pub mod config;
pub mod errors;
pub mod version;
