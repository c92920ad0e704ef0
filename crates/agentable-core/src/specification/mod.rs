//! Task specifications
//!
//! A specification is the JSON document an LLM produces from a prompt:
//! the agents to create, the tasks to run and how they depend on each
//! other. This module holds the document model and the generator that
//! asks the LLM for one.

mod generator;
mod types;

#[cfg(test)]
mod tests;

pub use generator::{GeneratedSpec, GeneratorConfig, SpecGenerator, SpecOrigin, SPEC_AGENT};
pub use types::{AgentConfig, AgentSpec, TaskSpec, TaskSpecification};
