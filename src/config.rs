//! Configuration for the agent binary.
//!
//! Everything is set via environment variables:
//! - `GEMINI_API_KEY` - Required. API key for the Gemini backend.
//! - `GEMINI_MODEL` - Optional. Model name. Defaults to `gemini-2.0-flash`.
//! - `MAX_ITERATIONS` - Optional. Maximum loop turns. Defaults to `11`.
//! - `GENERATION_TIMEOUT_SECS` - Optional. Wall-clock bound per generation. Defaults to `10`.
//! - `PARAM_STYLE` - Optional. `keyed` or `positional`. Defaults to `keyed`.
//! - `ON_TOOL_ERROR` - Optional. `continue` or `halt`. Defaults to `continue`.
//! - `MCP_SERVER_COMMAND` - Required. Command that starts the stdio tool server.
//! - `MCP_SERVER_ARGS` - Optional. Whitespace-separated arguments for it.
//! - `TASK_GOAL` - Optional. The task statement given to the agent.
//! - `USER_PREFERENCE` - Optional. Free-text preference folded into every prompt.

use std::time::Duration;

use thiserror::Error;

use crate::agent::ErrorPolicy;
use crate::dispatch::ParamStyle;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

const DEFAULT_TASK: &str = "First open Paint. Then draw a rectangle from (780, 380) to (1140, 700), by selecting the rectangle button at the coordinate (640, 109). Finally, calculate the sum of the exponentials of the ASCII values of the word Dhanush and add this sum as text inside the rectangle.";

/// Run configuration, loaded once before the loop starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: String,

    /// Gemini model name
    pub model: String,

    /// Maximum loop turns before the run is declared exhausted
    pub max_iterations: usize,

    /// Wall-clock bound for a single generation
    pub generation_timeout: Duration,

    /// How FUNCTION_CALL parameter tokens bind to tool schemas
    pub param_style: ParamStyle,

    /// Whether a failed dispatch ends the run
    pub error_policy: ErrorPolicy,

    /// Command starting the stdio tool server
    pub server_command: String,

    /// Arguments for the tool server command
    pub server_args: Vec<String>,

    /// The task goal text
    pub task: String,

    /// Free-text user preference folded into every prompt
    pub user_preference: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` or
    /// `MCP_SERVER_COMMAND` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string());

        let max_iterations = std::env::var("MAX_ITERATIONS")
            .unwrap_or_else(|_| "11".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e))
            })?;

        let generation_timeout = std::env::var("GENERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidValue("GENERATION_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let param_style = parse_param_style(
            &std::env::var("PARAM_STYLE").unwrap_or_else(|_| "keyed".to_string()),
        )?;

        let error_policy = parse_error_policy(
            &std::env::var("ON_TOOL_ERROR").unwrap_or_else(|_| "continue".to_string()),
        )?;

        let server_command = std::env::var("MCP_SERVER_COMMAND")
            .map_err(|_| ConfigError::MissingEnvVar("MCP_SERVER_COMMAND".to_string()))?;

        let server_args = std::env::var("MCP_SERVER_ARGS")
            .map(|args| args.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let task = std::env::var("TASK_GOAL").unwrap_or_else(|_| DEFAULT_TASK.to_string());
        let user_preference = std::env::var("USER_PREFERENCE").unwrap_or_default();

        Ok(Self {
            api_key,
            model,
            max_iterations,
            generation_timeout,
            param_style,
            error_policy,
            server_command,
            server_args,
            task,
            user_preference,
        })
    }
}

fn parse_param_style(value: &str) -> Result<ParamStyle, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "keyed" => Ok(ParamStyle::Keyed),
        "positional" => Ok(ParamStyle::Positional),
        other => Err(ConfigError::InvalidValue(
            "PARAM_STYLE".to_string(),
            other.to_string(),
        )),
    }
}

fn parse_error_policy(value: &str) -> Result<ErrorPolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "continue" => Ok(ErrorPolicy::Continue),
        "halt" => Ok(ErrorPolicy::Halt),
        other => Err(ConfigError::InvalidValue(
            "ON_TOOL_ERROR".to_string(),
            other.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_style_values() {
        assert_eq!(parse_param_style("keyed").unwrap(), ParamStyle::Keyed);
        assert_eq!(
            parse_param_style(" Positional ").unwrap(),
            ParamStyle::Positional
        );
        assert!(parse_param_style("both").is_err());
    }

    #[test]
    fn error_policy_values() {
        assert_eq!(
            parse_error_policy("continue").unwrap(),
            ErrorPolicy::Continue
        );
        assert_eq!(parse_error_policy("HALT").unwrap(), ErrorPolicy::Halt);
        assert!(parse_error_policy("retry").is_err());
    }
}
