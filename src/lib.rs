//! itdept - a supervisor-routed team of LLM agents working on a local repository
//!
//! A supervisor plans the task, then routes work one step at a time to a
//! developer, QA, reviewer, devops or docs worker until it decides the task
//! is finished or the iteration ceiling stops the run.

pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod id;
pub mod llm;
pub mod store;
pub mod supervisor;
pub mod tools;
pub mod workers;

pub use error::{ItDeptError, Result};
