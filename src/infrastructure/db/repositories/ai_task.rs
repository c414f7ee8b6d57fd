use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, sea_query::Condition,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    infrastructure::db::{
        entities::{
            AiTask,
            ai_task::{self, AiTaskStatus},
        },
        repositories::cas_error,
    },
};

pub struct AiTaskRepository;

impl AiTaskRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db_connection: &C,
        id: Uuid,
    ) -> Result<Option<ai_task::Model>> {
        AiTask::find_by_id(id)
            .one(db_connection)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Tasks attached to an order, oldest first. Orphaned tasks never match.
    pub async fn list_for_order<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<Vec<ai_task::Model>> {
        Ok(AiTask::find()
            .filter(ai_task::Column::OrderId.eq(order_id))
            .order_by_asc(ai_task::Column::CreatedAt)
            .order_by_asc(ai_task::Column::Id)
            .all(db_connection)
            .await?)
    }

    pub async fn list_active_for_order<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<Vec<ai_task::Model>> {
        let tasks = Self::list_for_order(db_connection, order_id).await?;
        Ok(tasks.into_iter().filter(ai_task::Model::is_active).collect())
    }

    /// In-flight tasks whose next poll is due, pending tasks with a retry
    /// scheduled, and submit claims whose window ran out. Fresh tasks have no
    /// `next_attempt_at`.
    pub async fn list_due<C: ConnectionTrait>(
        db_connection: &C,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<ai_task::Model>> {
        let in_flight = Condition::all()
            .add(ai_task::Column::Status.is_in([AiTaskStatus::Submitted, AiTaskStatus::Polling]))
            .add(
                Condition::any()
                    .add(ai_task::Column::NextAttemptAt.is_null())
                    .add(ai_task::Column::NextAttemptAt.lte(now)),
            );

        let retryable = Condition::all()
            .add(ai_task::Column::Status.is_in([AiTaskStatus::Pending, AiTaskStatus::Submitting]))
            .add(ai_task::Column::NextAttemptAt.lte(now));

        Ok(AiTask::find()
            .filter(ai_task::Column::SupersededBy.is_null())
            .filter(ai_task::Column::CancelRequested.eq(false))
            .filter(Condition::any().add(in_flight).add(retryable))
            .order_by_asc(ai_task::Column::NextAttemptAt)
            .limit(limit)
            .all(db_connection)
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create<C: ConnectionTrait>(
        db_connection: &C,
        order_id: Option<i32>,
        provider_id: i32,
        input_image_path: &str,
        prompt: &str,
        params: Value,
        style_category_id: Option<i32>,
        style_image_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<ai_task::Model> {
        let task = ai_task::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            style_category_id: Set(style_category_id),
            style_image_id: Set(style_image_id),
            provider_id: Set(provider_id),
            input_image_path: Set(input_image_path.to_string()),
            prompt: Set(prompt.to_string()),
            params: Set(params),
            result_image_path: Set(None),
            provider_job_id: Set(None),
            status: Set(AiTaskStatus::Pending),
            attempt_count: Set(0),
            last_error: Set(None),
            cancel_requested: Set(false),
            superseded_by: Set(None),
            next_attempt_at: Set(None),
            created_at: Set(now),
            submitted_at: Set(None),
            polled_at: Set(None),
            finished_at: Set(None),
            version: Set(0),
        };

        Ok(task.insert(db_connection).await?)
    }

    /// Compare-and-swap on `version`. A status regression is rejected before the write.
    pub async fn save<C: ConnectionTrait>(
        db_connection: &C,
        current: &ai_task::Model,
        mut active: ai_task::ActiveModel,
    ) -> Result<ai_task::Model> {
        if let sea_orm::ActiveValue::Set(next) = &active.status {
            if *next != current.status && !current.status.can_advance_to(next) {
                return Err(AppError::InternalServerError(format!(
                    "AI task {} cannot move from {} to {}",
                    current.id,
                    current.status.as_str(),
                    next.as_str()
                )));
            }
        }

        active.version = Set(current.version + 1);

        AiTask::update(active)
            .filter(ai_task::Column::Version.eq(current.version))
            .exec(db_connection)
            .await
            .map_err(cas_error("ai task", current.id))
    }
}
