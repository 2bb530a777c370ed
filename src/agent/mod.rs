//! Agent module - the control loop itself.
//!
//! Each run drives the same turn pipeline:
//! 1. Compose a prompt from the tool catalog and progress so far
//! 2. Generate one line of output under a wall-clock bound
//! 3. Interpret the line as a directive
//! 4. On an invoke directive, dispatch the tool over the session channel
//! 5. Record the outcome and advance, until a terminal directive,
//!    max iterations, or an unrecoverable fault

mod agent_loop;
mod prompt;

pub use agent_loop::{
    Agent, ErrorPolicy, LoopState, Milestone, RunOutcome, RunReport, RunRequest,
};
pub use prompt::{build_system_prompt, compose_prompt, compose_query};
