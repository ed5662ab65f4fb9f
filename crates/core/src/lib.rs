//! Domain types and pure logic for the tabular batch pipeline.
//!
//! Everything in this crate is free of registry state: job descriptors and
//! their identity, the fixed stage table, the retry policy, secret redaction,
//! and the subprocess-backed stage executor. The orchestration state machine
//! lives in `tabrun-pipeline`; the HTTP surface lives in `tabrun-api`.

pub mod error;
pub mod job;
pub mod redact;
pub mod retry;
pub mod runtime_status;
pub mod scripting;
pub mod stage;
pub mod types;
