//! End-to-end engine behavior, exercised through the feature-test harness.

mod batching;
mod cancellation;
mod checkers;
mod error_scoping;
mod instrumentation_hooks;
mod node_cache;
mod queries;
mod variables;
