//! Text generation backend and the timeout gateway in front of it.
//!
//! The backend is opaque: prompt in, text out, fallible, with unbounded
//! latency. The gateway's only jobs are bounded latency and error
//! normalization; filtering noisy output belongs to the directive parser.

pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation failed: {0}")]
    Backend(#[source] anyhow::Error),
}

/// The opaque prompt-to-text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Invoke the generator under a wall-clock bound so the loop never blocks
/// indefinitely on a stalled backend. Returns the raw text unmodified.
pub async fn generate_with_timeout(
    generator: &dyn TextGenerator,
    prompt: &str,
    timeout: Duration,
) -> Result<String, GenerationError> {
    tracing::debug!("Starting generation ({} byte prompt)", prompt.len());
    match tokio::time::timeout(timeout, generator.generate(prompt)).await {
        Ok(Ok(text)) => {
            tracing::debug!("Generation completed ({} bytes)", text.len());
            Ok(text)
        }
        Ok(Err(e)) => Err(GenerationError::Backend(e)),
        Err(_) => Err(GenerationError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            Ok(prompt.to_string())
        }
    }

    struct Stall;

    #[async_trait]
    impl TextGenerator for Stall {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn passes_text_through_unmodified() {
        let text = generate_with_timeout(&Echo, "  noisy\ntext ", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "  noisy\ntext ");
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let err = generate_with_timeout(&Stall, "prompt", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }
}
