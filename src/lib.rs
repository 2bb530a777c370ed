//! # toolloop
//!
//! An autonomous agent loop that turns a natural-language task into a
//! sequence of discrete tool invocations. A language model picks exactly
//! one action per turn through a single-line directive protocol
//! (`FUNCTION_CALL:` / `FINAL_ANSWER:` / `ERROR_HALT:`), and an MCP-style
//! stdio session executes the chosen tool.
//!
//! ## Architecture
//!
//! Each turn runs the same pipeline:
//! 1. Compose a prompt from the tool catalog and the run's progress so far
//! 2. Generate one line of output under a wall-clock bound
//! 3. Interpret the line as a directive
//! 4. On `FUNCTION_CALL`, validate and dispatch the tool over the session
//! 5. Record the outcome and advance
//!
//! A malformed or unsupported action degrades to a recorded failure and
//! the loop continues; only infrastructure faults (generator unreachable
//! or timed out) end the run early.
//!
//! ## Example
//!
//! ```rust,ignore
//! use toolloop::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let report = agent.run(&mut session, &catalog, &request, &mut state).await;
//! ```

pub mod agent;
pub mod catalog;
pub mod config;
pub mod directive;
pub mod dispatch;
pub mod llm;
pub mod mcp;
pub mod params;

pub use config::Config;
