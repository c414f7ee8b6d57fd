use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::Result,
    infrastructure::db::entities::{ai_provider, ai_task},
};

/// Provider answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Synchronous providers return the image right away.
    Completed { result_url: String },
    /// Asynchronous providers hand back a job to poll.
    Accepted { job_id: String },
}

/// Provider answer to a status query or a pushed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Running,
    Completed { result_url: String },
    Failed { message: String },
}

/// One external image-generation API.
///
/// `Err` means the call itself failed (transport, HTTP status, unreadable
/// body). A job the provider reports as failed is `Ok(PollOutcome::Failed)`.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn submit(&self, config: &ai_provider::Model, task: &ai_task::Model)
    -> Result<SubmitOutcome>;

    async fn poll(
        &self,
        config: &ai_provider::Model,
        task: &ai_task::Model,
        job_id: &str,
    ) -> Result<PollOutcome>;

    async fn cancel(
        &self,
        config: &ai_provider::Model,
        task: &ai_task::Model,
        job_id: &str,
    ) -> Result<()>;
}

/// Body a provider pushes to the callback route.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderReply {
    pub task_id: Uuid,
    pub status: String,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl ProviderReply {
    pub fn outcome(&self) -> PollOutcome {
        match self.status.to_ascii_lowercase().as_str() {
            "completed" | "succeeded" | "success" => match &self.result_url {
                Some(url) if !url.is_empty() => PollOutcome::Completed {
                    result_url: url.clone(),
                },
                _ => PollOutcome::Failed {
                    message: "provider reported success without a result url".into(),
                },
            },
            "failed" | "error" => PollOutcome::Failed {
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "provider reported failure".into()),
            },
            _ => PollOutcome::Running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: &str, result_url: Option<&str>, error: Option<&str>) -> ProviderReply {
        ProviderReply {
            task_id: Uuid::new_v4(),
            status: status.into(),
            result_url: result_url.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn maps_reply_statuses() {
        assert_eq!(
            reply("SUCCESS", Some("https://cdn/x.png"), None).outcome(),
            PollOutcome::Completed {
                result_url: "https://cdn/x.png".into()
            }
        );
        assert_eq!(
            reply("failed", None, Some("nsfw")).outcome(),
            PollOutcome::Failed {
                message: "nsfw".into()
            }
        );
        assert_eq!(reply("queued", None, None).outcome(), PollOutcome::Running);
        assert!(matches!(
            reply("completed", None, None).outcome(),
            PollOutcome::Failed { .. }
        ));
    }
}
