//! Tool-calling agents for a handful of everyday scenarios: expense
//! analysis, café orders, appliance manuals, basketball scouting, a
//! travel assistant with memory and college admissions help.
//!
//! The crate includes a CLI tool to run each scenario against an
//! OpenAI-compatible model. The tools, the vector store and the
//! scenario builders can also be used as a library.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod callbacks;
mod error;
pub mod knowledge;
pub mod scenarios;
pub mod tools;

pub use error::Error;

/// Re-exports of [`stepwise_core`] crate.
pub mod core {
    pub use stepwise_core::*;
}
