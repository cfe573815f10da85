//! Workspace-level integration tests for steppanel.
//!
//! The tests live under `tests/`: golden panel frames replayed from
//! `tests/testdata`, and end-to-end session scenarios on an in-memory
//! terminal.
