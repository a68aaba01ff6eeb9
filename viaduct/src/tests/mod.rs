//! Feature-test support: a small DSL for standing up an engine from SDL
//! text plus module registrations and running operations to JSON.

pub mod harness;
