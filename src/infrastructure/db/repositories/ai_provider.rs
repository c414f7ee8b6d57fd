use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};

use crate::{
    error::{AppError, Result},
    infrastructure::db::entities::{
        AiProvider,
        ai_provider::{self, ProviderKind, ProviderMode},
    },
};

/// Connection settings for a new provider row.
#[derive(Debug, Clone)]
pub struct ProviderDraft {
    pub name: String,
    pub kind: ProviderKind,
    pub mode: ProviderMode,
    pub base_url: String,
    pub submit_path: String,
    pub poll_path: String,
    pub cancel_path: Option<String>,
    pub api_key: String,
    pub callback_secret: Option<String>,
    pub model_name: String,
    pub max_retries: i32,
    pub task_timeout_secs: i64,
    pub poll_base_secs: i64,
    pub poll_cap_secs: i64,
}

pub struct AiProviderRepository;

impl AiProviderRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db_connection: &C,
        id: i32,
    ) -> Result<Option<ai_provider::Model>> {
        AiProvider::find_by_id(id)
            .one(db_connection)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn find_by_name<C: ConnectionTrait>(
        db_connection: &C,
        name: &str,
    ) -> Result<Option<ai_provider::Model>> {
        Ok(AiProvider::find()
            .filter(ai_provider::Column::Name.eq(name))
            .one(db_connection)
            .await?)
    }

    pub async fn create<C: ConnectionTrait>(
        db_connection: &C,
        draft: ProviderDraft,
        now: DateTime<Utc>,
    ) -> Result<ai_provider::Model> {
        let provider = ai_provider::ActiveModel {
            name: Set(draft.name),
            kind: Set(draft.kind),
            mode: Set(draft.mode),
            base_url: Set(draft.base_url),
            submit_path: Set(draft.submit_path),
            poll_path: Set(draft.poll_path),
            cancel_path: Set(draft.cancel_path),
            api_key: Set(draft.api_key),
            callback_secret: Set(draft.callback_secret),
            model_name: Set(draft.model_name),
            max_retries: Set(draft.max_retries.max(1)),
            task_timeout_secs: Set(draft.task_timeout_secs),
            poll_base_secs: Set(draft.poll_base_secs),
            poll_cap_secs: Set(draft.poll_cap_secs),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        };

        Ok(provider.insert(db_connection).await?)
    }
}
