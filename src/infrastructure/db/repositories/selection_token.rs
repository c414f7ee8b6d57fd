use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    prelude::Expr,
};
use serde_json::Value;

use crate::{
    error::{AppError, Result},
    infrastructure::db::entities::{
        SelectionToken,
        selection_token::{self, TokenPurpose},
    },
};

pub struct SelectionTokenRepository;

impl SelectionTokenRepository {
    pub async fn find_by_jti<C: ConnectionTrait>(
        db_connection: &C,
        jti: &str,
    ) -> Result<Option<selection_token::Model>> {
        SelectionToken::find_by_id(jti.to_string())
            .one(db_connection)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn insert<C: ConnectionTrait>(
        db_connection: &C,
        jti: &str,
        order_id: i32,
        purpose: TokenPurpose,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<selection_token::Model> {
        let token = selection_token::ActiveModel {
            jti: Set(jti.to_string()),
            order_id: Set(order_id),
            purpose: Set(purpose),
            issued_at: Set(issued_at),
            expires_at: Set(expires_at),
            consumed_at: Set(None),
            revoked_at: Set(None),
            result: Set(None),
        };

        Ok(token.insert(db_connection).await?)
    }

    /// Takes a live, unused token for one consumer; `false` when someone else holds it.
    pub async fn claim<C: ConnectionTrait>(
        db_connection: &C,
        jti: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = SelectionToken::update_many()
            .col_expr(selection_token::Column::ConsumedAt, Expr::value(now))
            .filter(selection_token::Column::Jti.eq(jti))
            .filter(selection_token::Column::ConsumedAt.is_null())
            .filter(selection_token::Column::RevokedAt.is_null())
            .exec(db_connection)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Hands a claimed token back when its consumer failed before recording a result.
    pub async fn release<C: ConnectionTrait>(db_connection: &C, jti: &str) -> Result<()> {
        SelectionToken::update_many()
            .col_expr(
                selection_token::Column::ConsumedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(selection_token::Column::Jti.eq(jti))
            .filter(selection_token::Column::Result.is_null())
            .exec(db_connection)
            .await?;

        Ok(())
    }

    pub async fn record_result<C: ConnectionTrait>(
        db_connection: &C,
        jti: &str,
        result: Value,
    ) -> Result<()> {
        SelectionToken::update_many()
            .col_expr(selection_token::Column::Result, Expr::value(result))
            .filter(selection_token::Column::Jti.eq(jti))
            .filter(selection_token::Column::Result.is_null())
            .exec(db_connection)
            .await?;

        Ok(())
    }

    /// Revokes every live token of the order; returns how many were revoked.
    pub async fn revoke_for_order<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let result = SelectionToken::update_many()
            .col_expr(selection_token::Column::RevokedAt, Expr::value(now))
            .filter(selection_token::Column::OrderId.eq(order_id))
            .filter(selection_token::Column::RevokedAt.is_null())
            .filter(selection_token::Column::ConsumedAt.is_null())
            .exec(db_connection)
            .await?;

        Ok(result.rows_affected)
    }

    /// Result recorded by an earlier confirmation of the order, if any.
    pub async fn find_confirmed_result<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<Option<Value>> {
        let token = SelectionToken::find()
            .filter(selection_token::Column::OrderId.eq(order_id))
            .filter(selection_token::Column::Purpose.eq(TokenPurpose::Confirm))
            .filter(selection_token::Column::ConsumedAt.is_not_null())
            .filter(selection_token::Column::Result.is_not_null())
            .one(db_connection)
            .await?;

        Ok(token.and_then(|token| token.result))
    }
}
