use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};

use crate::{
    error::{AppError, Result},
    infrastructure::db::{
        entities::{
            Coupon, CouponUsage,
            coupon::{self, CouponStatus, DiscountType},
            coupon_usage,
        },
        repositories::{cas_error, is_unique_violation},
    },
};

pub struct CouponRepository;

impl CouponRepository {
    pub async fn find_by_code<C: ConnectionTrait>(
        db_connection: &C,
        code: &str,
    ) -> Result<Option<coupon::Model>> {
        Ok(Coupon::find()
            .filter(coupon::Column::Code.eq(code))
            .one(db_connection)
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create<C: ConnectionTrait>(
        db_connection: &C,
        code: &str,
        discount_type: DiscountType,
        value: i64,
        creator_type: &str,
        customer_phone: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<coupon::Model> {
        let coupon = coupon::ActiveModel {
            code: Set(code.to_string()),
            discount_type: Set(discount_type),
            value: Set(value),
            creator_type: Set(creator_type.to_string()),
            customer_phone: Set(customer_phone),
            status: Set(CouponStatus::Unused),
            expires_at: Set(expires_at),
            created_at: Set(now),
            version: Set(0),
            ..Default::default()
        };

        Ok(coupon.insert(db_connection).await?)
    }

    pub async fn save_status<C: ConnectionTrait>(
        db_connection: &C,
        current: &coupon::Model,
        status: CouponStatus,
    ) -> Result<coupon::Model> {
        let mut active: coupon::ActiveModel = current.clone().into();
        active.status = Set(status);
        active.version = Set(current.version + 1);

        Coupon::update(active)
            .filter(coupon::Column::Version.eq(current.version))
            .exec(db_connection)
            .await
            .map_err(cas_error("coupon", current.id))
    }

    pub async fn find_usage<C: ConnectionTrait>(
        db_connection: &C,
        coupon_id: i32,
        order_id: i32,
    ) -> Result<Option<coupon_usage::Model>> {
        Ok(CouponUsage::find()
            .filter(coupon_usage::Column::CouponId.eq(coupon_id))
            .filter(coupon_usage::Column::OrderId.eq(order_id))
            .one(db_connection)
            .await?)
    }

    pub async fn record_usage<C: ConnectionTrait>(
        db_connection: &C,
        coupon_id: i32,
        order_id: i32,
        discount_cents: i64,
        now: DateTime<Utc>,
    ) -> Result<coupon_usage::Model> {
        let usage = coupon_usage::ActiveModel {
            coupon_id: Set(coupon_id),
            order_id: Set(order_id),
            discount_cents: Set(discount_cents),
            used_at: Set(now),
            ..Default::default()
        };

        usage.insert(db_connection).await.map_err(|err| {
            if is_unique_violation(&err) {
                AppError::CouponAlreadyConsumed
            } else {
                AppError::DatabaseError(err)
            }
        })
    }
}
