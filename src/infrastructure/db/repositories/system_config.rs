use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};

use crate::{
    error::Result,
    infrastructure::db::entities::{SystemConfig, system_config},
};

pub struct SystemConfigRepository;

impl SystemConfigRepository {
    pub async fn list_prefixed<C: ConnectionTrait>(
        db_connection: &C,
        prefix: &str,
    ) -> Result<Vec<system_config::Model>> {
        Ok(SystemConfig::find()
            .filter(system_config::Column::ConfigKey.starts_with(prefix))
            .all(db_connection)
            .await?)
    }

    pub async fn upsert<C: ConnectionTrait>(
        db_connection: &C,
        key: &str,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<system_config::Model> {
        let existing = SystemConfig::find_by_id(key.to_string())
            .one(db_connection)
            .await?;

        match existing {
            Some(row) => {
                let mut active: system_config::ActiveModel = row.into();
                active.config_value = Set(value.to_string());
                active.updated_at = Set(now);
                Ok(active.update(db_connection).await?)
            }
            None => {
                let row = system_config::ActiveModel {
                    config_key: Set(key.to_string()),
                    config_value: Set(value.to_string()),
                    updated_at: Set(now),
                };
                Ok(row.insert(db_connection).await?)
            }
        }
    }
}
