//! Core logic of the agent: the step loop, tool execution, memory and
//! step callbacks.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
pub mod memory;
mod model_client;
pub mod tool;

pub use agent::{Agent, AgentBuilder, ManagedAgent, ManagedAgentInput};
pub use conversation::TranscriptSource;
pub use error::AgentError;
pub use memory::{ActionStep, AgentMemory};
pub use model_client::RetryPolicy;
