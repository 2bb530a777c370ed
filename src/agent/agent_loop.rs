//! Core loop controller implementation.
//!
//! Drives compose -> generate -> interpret -> dispatch -> record ->
//! advance until a terminal directive, an unrecoverable generation fault,
//! or iteration exhaustion. Every exit path resets the caller's
//! [`LoopState`] so nothing leaks into a subsequent run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::ToolCatalog;
use crate::directive::{parse_directive, Directive};
use crate::dispatch::{Dispatcher, StepOutcome};
use crate::llm::{generate_with_timeout, TextGenerator};
use crate::mcp::{SessionChannel, ToolResult};

use super::prompt::{build_system_prompt, compose_prompt, compose_query};

/// A named task milestone, flipped to true the first time its tool
/// succeeds. Rendered as the progress table in later prompts.
#[derive(Debug, Clone)]
pub struct Milestone {
    pub label: String,
    pub tool: String,
}

impl Milestone {
    pub fn new(label: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tool: tool.into(),
        }
    }
}

/// One run's goal, the standing user preference folded into every prompt,
/// and the progress milestones for that goal.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub task: String,
    pub user_preference: String,
    pub milestones: Vec<Milestone>,
}

/// Mutable per-run state. `iteration` counts completed non-terminal turns;
/// a terminal directive does not increment it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    pub iteration: usize,
    pub last_result: Option<ToolResult>,
    pub history: Vec<String>,
    pub last_successful_tool: Option<String>,
    pub step_flags: BTreeMap<String, bool>,
}

/// Whether a failed dispatch ends the run or is recorded and skipped.
/// An explicit deployment choice, never mixed implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    Continue,
    Halt,
}

/// Terminal outcome of a run. Every run ends in exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// FINAL_ANSWER payload.
    Success(String),
    /// ERROR_HALT reason, or the first dispatch failure under
    /// [`ErrorPolicy::Halt`].
    Halted(String),
    /// Unrecoverable infrastructure fault: generator unreachable or timed
    /// out.
    Error(String),
    /// `max_iterations` completed turns without a terminal directive.
    Exhausted,
}

/// What a finished run looked like: the terminal outcome, the number of
/// completed turns, and every recorded invocation in order.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub iterations: usize,
    pub log: Vec<StepOutcome>,
}

/// The autonomous agent.
pub struct Agent {
    generator: Arc<dyn TextGenerator>,
    dispatcher: Dispatcher,
    max_iterations: usize,
    generation_timeout: Duration,
    error_policy: ErrorPolicy,
}

impl Agent {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        dispatcher: Dispatcher,
        max_iterations: usize,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            max_iterations,
            generation_timeout,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Drive one run to a terminal outcome.
    ///
    /// The referenced state is reset to default on every exit path, so a
    /// caller sharing one `LoopState` across runs never observes residue.
    pub async fn run(
        &self,
        session: &mut dyn SessionChannel,
        catalog: &ToolCatalog,
        request: &RunRequest,
        state: &mut LoopState,
    ) -> RunReport {
        let report = self.drive(session, catalog, request, state).await;
        *state = LoopState::default();
        match &report.outcome {
            RunOutcome::Success(answer) => tracing::info!("Run complete: {}", answer),
            RunOutcome::Halted(reason) => tracing::warn!("Run halted: {}", reason),
            RunOutcome::Error(message) => tracing::error!("Run failed: {}", message),
            RunOutcome::Exhausted => {
                tracing::warn!("Max iterations ({}) reached without completion", self.max_iterations)
            }
        }
        report
    }

    async fn drive(
        &self,
        session: &mut dyn SessionChannel,
        catalog: &ToolCatalog,
        request: &RunRequest,
        state: &mut LoopState,
    ) -> RunReport {
        *state = LoopState::default();
        for milestone in &request.milestones {
            state.step_flags.insert(milestone.label.clone(), false);
        }
        let system_prompt = build_system_prompt(catalog, &request.user_preference);
        let mut log = Vec::new();

        while state.iteration < self.max_iterations {
            tracing::info!("--- Iteration {} ---", state.iteration + 1);

            let query = compose_query(&request.task, state, &request.milestones);
            let prompt = compose_prompt(&system_prompt, &query);

            let raw = match generate_with_timeout(
                self.generator.as_ref(),
                &prompt,
                self.generation_timeout,
            )
            .await
            {
                Ok(text) => text,
                Err(e) => {
                    return RunReport {
                        outcome: RunOutcome::Error(e.to_string()),
                        iterations: state.iteration,
                        log,
                    }
                }
            };

            match parse_directive(&raw) {
                Directive::Invoke {
                    tool_name,
                    raw_tokens,
                } => {
                    let outcome = self
                        .dispatcher
                        .dispatch(catalog, session, &tool_name, &raw_tokens, state.iteration)
                        .await;
                    state.history.push(outcome.summary());
                    if outcome.succeeded {
                        state.last_result = outcome.result.clone();
                        state.last_successful_tool = Some(tool_name.clone());
                        for milestone in &request.milestones {
                            if milestone.tool == tool_name {
                                state.step_flags.insert(milestone.label.clone(), true);
                            }
                        }
                    } else if self.error_policy == ErrorPolicy::Halt {
                        let reason = outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| "tool dispatch failed".to_string());
                        log.push(outcome);
                        return RunReport {
                            outcome: RunOutcome::Halted(reason),
                            iterations: state.iteration,
                            log,
                        };
                    }
                    log.push(outcome);
                    state.iteration += 1;
                }
                Directive::FinalAnswer(payload) => {
                    return RunReport {
                        outcome: RunOutcome::Success(payload),
                        iterations: state.iteration,
                        log,
                    }
                }
                Directive::Halt(reason) => {
                    return RunReport {
                        outcome: RunOutcome::Halted(reason),
                        iterations: state.iteration,
                        log,
                    }
                }
                Directive::Unrecognized => {
                    // Never guess a tool from unstructured text; record the
                    // dead turn and keep going until exhaustion.
                    tracing::warn!("Generator produced no actionable output");
                    state.history.push(format!(
                        "No actionable output in iteration {}.",
                        state.iteration + 1
                    ));
                    state.iteration += 1;
                }
            }
        }

        RunReport {
            outcome: RunOutcome::Exhausted,
            iterations: state.iteration,
            log,
        }
    }
}
