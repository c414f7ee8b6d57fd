use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Typed configuration row for one external generation API.
#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "ai_providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub kind: ProviderKind,

    pub mode: ProviderMode,

    pub base_url: String,

    pub submit_path: String,

    pub poll_path: String,

    #[sea_orm(nullable)]
    pub cancel_path: Option<String>,

    #[serde(skip_serializing)]
    pub api_key: String,

    #[serde(skip_serializing)]
    #[sea_orm(nullable)]
    pub callback_secret: Option<String>,

    pub model_name: String,

    pub max_retries: i32,

    pub task_timeout_secs: i64,

    pub poll_base_secs: i64,

    pub poll_cap_secs: i64,

    pub is_active: bool,

    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Wire dialect spoken by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[sea_orm(string_value = "nano_banana")]
    NanoBanana,

    #[sea_orm(string_value = "running_hub")]
    RunningHub,

    #[sea_orm(string_value = "direct")]
    Direct,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    #[sea_orm(string_value = "sync")]
    Sync,

    #[sea_orm(string_value = "async")]
    Async,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ai_task::Entity")]
    AiTask,
}

impl Related<super::ai_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AiTask.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
