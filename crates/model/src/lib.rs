//! Provider-neutral protocol between the agent and language models.
//!
//! The agent only talks to the traits and plain data types defined here,
//! so chat models and embedding models can be swapped without touching
//! the agent loop. Types in this crate carry no behavior of their own;
//! they are the contract that provider crates implement.

#![deny(missing_docs)]

mod embedding;
mod error;
mod opaque;
mod provider;
mod request;
mod response;
mod usage;

pub use embedding::*;
pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
pub use usage::*;
