use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use crate::{
    error::{AppError, Result},
    infrastructure::db::entities::{
        ai_provider::{self, ProviderKind},
        ai_task,
    },
    services::ai_tasks::provider::{GenerationProvider, PollOutcome, SubmitOutcome},
};

const SERVICE: &str = "ai_provider";

/// Speaks the wire dialect named by the provider row's `kind`.
#[derive(Clone)]
pub struct HttpGenerationProvider {
    client: Client,
}

impl HttpGenerationProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn post(
        &self,
        config: &ai_provider::Model,
        path: &str,
        body: &Value,
    ) -> Result<Value> {
        let url = config.endpoint(path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("{}: {e}", config.name)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("{}: {e}", config.name)))?;

        if status != StatusCode::OK {
            return Err(AppError::external(
                SERVICE,
                format!("{} answered HTTP {}: {}", config.name, status.as_u16(), truncate(&text)),
            ));
        }

        serde_json::from_str(&text).map_err(|_| {
            AppError::external(
                SERVICE,
                format!("{} returned an unreadable body: {}", config.name, truncate(&text)),
            )
        })
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(200).collect()
}

fn param<'a>(task: &'a ai_task::Model, key: &str, default: &'a str) -> &'a str {
    task.params
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
}

fn text_at<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// `code` is either absent or zero on success.
fn code_ok(body: &Value) -> bool {
    body.get("code").and_then(Value::as_i64).is_none_or(|code| code == 0)
}

fn error_message(body: &Value) -> String {
    ["/msg", "/message", "/errorMessage", "/data/error"]
        .iter()
        .find_map(|pointer| text_at(body, pointer))
        .unwrap_or("provider rejected the request")
        .to_string()
}

pub fn submit_body(config: &ai_provider::Model, task: &ai_task::Model) -> Value {
    let aspect_ratio = param(task, "aspectRatio", "1:1");
    let image_size = param(task, "imageSize", "1K");

    match config.kind {
        ProviderKind::NanoBanana => json!({
            "model": config.model_name,
            "prompt": task.prompt,
            "aspectRatio": aspect_ratio,
            "imageSize": image_size,
            "shutProgress": false,
            "webHook": "-1",
            "urls": [task.input_image_path],
        }),
        ProviderKind::RunningHub => json!({
            "prompt": task.prompt,
            "resolution": image_size,
            "aspectRatio": aspect_ratio,
            "imageUrls": [task.input_image_path],
        }),
        ProviderKind::Direct => {
            let mut body = json!({
                "model": config.model_name,
                "prompt": task.prompt,
                "image_url": task.input_image_path,
            });
            if let (Some(target), Some(extra)) = (body.as_object_mut(), task.params.as_object()) {
                for (key, value) in extra {
                    target.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            body
        }
    }
}

pub fn parse_submit(kind: ProviderKind, body: &Value) -> std::result::Result<SubmitOutcome, String> {
    if !code_ok(body) {
        return Err(error_message(body));
    }

    let result_url = ["/url", "/data/url", "/data/results/0/url", "/results/0/url"]
        .iter()
        .find_map(|pointer| text_at(body, pointer));
    if let Some(url) = result_url {
        return Ok(SubmitOutcome::Completed {
            result_url: url.to_string(),
        });
    }

    let job_pointers: &[&str] = match kind {
        ProviderKind::NanoBanana => &["/data/id", "/id"],
        ProviderKind::RunningHub => &["/taskId", "/data/taskId"],
        ProviderKind::Direct => &[],
    };

    job_pointers
        .iter()
        .find_map(|pointer| text_at(body, pointer))
        .map(|job_id| SubmitOutcome::Accepted {
            job_id: job_id.to_string(),
        })
        .ok_or_else(|| error_message(body))
}

pub fn poll_body(config: &ai_provider::Model, job_id: &str) -> Value {
    match config.kind {
        ProviderKind::NanoBanana => json!({ "Id": job_id }),
        ProviderKind::RunningHub if config.poll_path.contains("/openapi/v2/") => {
            json!({ "taskId": job_id })
        }
        ProviderKind::RunningHub | ProviderKind::Direct => {
            json!({ "apiKey": config.api_key, "taskId": job_id })
        }
    }
}

fn map_status(status: &str, url: Option<&str>, error: Option<&str>) -> PollOutcome {
    match status.to_ascii_lowercase().as_str() {
        "succeeded" | "completed" | "success" => match url {
            Some(url) => PollOutcome::Completed {
                result_url: url.to_string(),
            },
            None => PollOutcome::Failed {
                message: "provider finished without a result url".into(),
            },
        },
        "failed" | "error" => PollOutcome::Failed {
            message: error.unwrap_or("provider reported failure").to_string(),
        },
        _ => PollOutcome::Running,
    }
}

pub fn parse_poll(kind: ProviderKind, body: &Value) -> std::result::Result<PollOutcome, String> {
    match kind {
        ProviderKind::NanoBanana => {
            if !code_ok(body) {
                return Err(error_message(body));
            }
            let status = text_at(body, "/data/status").unwrap_or("running");
            Ok(map_status(
                status,
                text_at(body, "/data/url").or_else(|| text_at(body, "/data/results/0/url")),
                text_at(body, "/data/error").or_else(|| text_at(body, "/data/failure_reason")),
            ))
        }
        ProviderKind::RunningHub => {
            // Newer endpoints answer flat, older ones wrap in code/data.
            if let Some(status) = text_at(body, "/status") {
                return Ok(map_status(
                    status,
                    text_at(body, "/results/0/url"),
                    text_at(body, "/errorMessage"),
                ));
            }
            if !code_ok(body) {
                return Err(error_message(body));
            }
            let status = text_at(body, "/data/status").unwrap_or("running");
            Ok(map_status(
                status,
                text_at(body, "/data/url").or_else(|| text_at(body, "/data/results/0/url")),
                text_at(body, "/data/errorMessage"),
            ))
        }
        ProviderKind::Direct => Err("direct providers answer synchronously".into()),
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn submit(
        &self,
        config: &ai_provider::Model,
        task: &ai_task::Model,
    ) -> Result<SubmitOutcome> {
        let body = submit_body(config, task);
        let response = self.post(config, &config.submit_path, &body).await?;

        parse_submit(config.kind, &response)
            .map_err(|message| AppError::external(SERVICE, format!("{}: {message}", config.name)))
    }

    async fn poll(
        &self,
        config: &ai_provider::Model,
        _task: &ai_task::Model,
        job_id: &str,
    ) -> Result<PollOutcome> {
        if config.kind == ProviderKind::Direct {
            return Err(AppError::external(SERVICE, "direct providers cannot be polled"));
        }

        let body = poll_body(config, job_id);
        let response = self.post(config, &config.poll_path, &body).await?;

        parse_poll(config.kind, &response)
            .map_err(|message| AppError::external(SERVICE, format!("{}: {message}", config.name)))
    }

    async fn cancel(
        &self,
        config: &ai_provider::Model,
        _task: &ai_task::Model,
        job_id: &str,
    ) -> Result<()> {
        let Some(cancel_path) = config.cancel_path.as_deref() else {
            return Ok(());
        };

        self.post(config, cancel_path, &json!({ "taskId": job_id }))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nano_banana_submit_yields_job() {
        let body = json!({ "code": 0, "data": { "id": "job-1" } });
        assert_eq!(
            parse_submit(ProviderKind::NanoBanana, &body),
            Ok(SubmitOutcome::Accepted {
                job_id: "job-1".into()
            })
        );

        let rejected = json!({ "code": 401, "msg": "bad key" });
        assert_eq!(
            parse_submit(ProviderKind::NanoBanana, &rejected),
            Err("bad key".to_string())
        );
    }

    #[test]
    fn running_hub_accepts_flat_and_wrapped_task_ids() {
        assert_eq!(
            parse_submit(ProviderKind::RunningHub, &json!({ "taskId": "rh-1" })),
            Ok(SubmitOutcome::Accepted {
                job_id: "rh-1".into()
            })
        );
        assert_eq!(
            parse_submit(
                ProviderKind::RunningHub,
                &json!({ "code": 0, "data": { "taskId": "rh-2" } })
            ),
            Ok(SubmitOutcome::Accepted {
                job_id: "rh-2".into()
            })
        );
    }

    #[test]
    fn direct_submit_reads_nested_results() {
        let body = json!({ "data": { "results": [{ "url": "https://cdn/a.png" }] } });
        assert_eq!(
            parse_submit(ProviderKind::Direct, &body),
            Ok(SubmitOutcome::Completed {
                result_url: "https://cdn/a.png".into()
            })
        );
    }

    #[test]
    fn running_hub_poll_understands_both_formats() {
        let flat = json!({ "status": "SUCCESS", "results": [{ "url": "https://cdn/b.png" }] });
        assert_eq!(
            parse_poll(ProviderKind::RunningHub, &flat),
            Ok(PollOutcome::Completed {
                result_url: "https://cdn/b.png".into()
            })
        );

        let queued = json!({ "status": "QUEUED" });
        assert_eq!(parse_poll(ProviderKind::RunningHub, &queued), Ok(PollOutcome::Running));

        let wrapped = json!({ "code": 0, "data": { "status": "failed", "errorMessage": "oom" } });
        assert_eq!(
            parse_poll(ProviderKind::RunningHub, &wrapped),
            Ok(PollOutcome::Failed {
                message: "oom".into()
            })
        );
    }

    #[test]
    fn nano_banana_poll_maps_statuses() {
        let running = json!({ "code": 0, "data": { "status": "processing" } });
        assert_eq!(parse_poll(ProviderKind::NanoBanana, &running), Ok(PollOutcome::Running));

        let done = json!({ "code": 0, "data": { "status": "succeeded", "url": "https://cdn/c.png" } });
        assert_eq!(
            parse_poll(ProviderKind::NanoBanana, &done),
            Ok(PollOutcome::Completed {
                result_url: "https://cdn/c.png".into()
            })
        );
    }
}
