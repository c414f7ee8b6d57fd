use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    infrastructure::db::entities::ai_task::{self, AiTaskStatus},
    services::ai_tasks::types::NewTask,
};

use super::common::default_actor;

#[derive(Deserialize)]
pub struct CreateTaskParams {
    #[serde(flatten)]
    pub task: NewTask,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAiParams {
    pub order_id: i32,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(default)]
    pub expected_version: Option<i32>,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskActionParams {
    pub task_id: Uuid,

    #[serde(default = "default_actor")]
    pub actor: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub order_id: Option<i32>,
    pub provider_id: i32,
    pub status: AiTaskStatus,
    pub attempt_count: i32,
    pub result_image_path: Option<String>,
    pub last_error: Option<String>,
    pub version: i32,
}

impl From<ai_task::Model> for TaskResponse {
    fn from(task: ai_task::Model) -> Self {
        Self {
            id: task.id,
            order_id: task.order_id,
            provider_id: task.provider_id,
            status: task.status,
            attempt_count: task.attempt_count,
            result_image_path: task.result_image_path,
            last_error: task.last_error,
            version: task.version,
        }
    }
}
