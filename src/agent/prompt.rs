//! Prompt templates for the control loop.
//!
//! Both functions are pure: given the same catalog, state, and texts they
//! always produce the same prompt. The per-turn query grows linearly with
//! completed turns because every prior outcome summary is replayed
//! verbatim; `max_iterations` bounds that growth.

use crate::agent::agent_loop::{LoopState, Milestone};
use crate::catalog::ToolCatalog;

/// Fixed system framing: the single-line directive contract, the rendered
/// tool catalog, and the user's standing preference.
pub fn build_system_prompt(catalog: &ToolCatalog, user_preference: &str) -> String {
    format!(
        r#"You are an intelligent agent that must complete a multi-step task using available tools.

USER PREFERENCE (important): {user_preference}

AVAILABLE TOOLS:
{tools}

TOOL EXECUTION RULES
- Use only one FUNCTION_CALL per step
- Never repeat a tool with the same parameters
- Use results from prior steps as inputs
- If a tool fails, retry once. If it still fails, use ERROR_HALT

OUTPUT FORMAT
Respond with exactly one line:
1. FUNCTION_CALL: tool_name|param1=value1|param2=value2
2. FINAL_ANSWER: [result]
3. ERROR_HALT: [reason]

Examples:
- FUNCTION_CALL: open_paint
- FUNCTION_CALL: draw_rectangle|x1=780|y1=380|x2=1140|y2=700
- FUNCTION_CALL: strings_to_chars_to_int|input.string=Dhanush
- FINAL_ANSWER: [12345.67]

DO NOT include any explanations or extra text.
Only output a single line starting with FUNCTION_CALL, FINAL_ANSWER, or ERROR_HALT."#,
        user_preference = user_preference,
        tools = catalog.render(),
    )
}

/// Per-turn query: the bare task on the first turn; afterwards a progress
/// table, every prior outcome summary verbatim, and a do-not-repeat hint
/// when the last turn's tool succeeded.
pub fn compose_query(task: &str, state: &LoopState, milestones: &[Milestone]) -> String {
    if state.iteration == 0 && state.last_result.is_none() {
        return format!("{}\n\nStart with the first step.", task);
    }

    let mut query = String::from("Current progress:\nSteps completed so far:\n");
    for (i, milestone) in milestones.iter().enumerate() {
        let done = state
            .step_flags
            .get(&milestone.label)
            .copied()
            .unwrap_or(false);
        query.push_str(&format!("{}. {}: {}\n", i + 1, milestone.label, done));
    }
    query.push_str("Recent tool outputs:\n");
    query.push_str(&state.history.join("\n"));
    query.push('\n');
    if let Some(tool) = &state.last_successful_tool {
        query.push_str(&format!(
            "\nYou have already called {}. Do not call it again. Move to the next step.\n",
            tool
        ));
    }
    query.push_str("\nWhat should I do next to complete the task?");
    query
}

/// Full prompt handed to the generator.
pub fn compose_prompt(system_prompt: &str, query: &str) -> String {
    format!("{}\n\nQuery: {}", system_prompt, query)
}
