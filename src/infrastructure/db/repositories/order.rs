use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, prelude::Expr, sea_query::OnConflict,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    infrastructure::db::{
        entities::{
            Order, OrderImage,
            order::{self, OrderStatus, PrinterSendStatus, SourceType},
            order_image::{self, ImageKind},
        },
        repositories::{cas_error, is_unique_violation},
    },
};

/// Fields supplied by the CRUD layer when an order row is created.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    /// Reuse an existing number when splitting an order by category.
    pub order_number: Option<String>,
    pub product_category: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: Option<String>,
    pub size: Option<String>,
    pub style_name: Option<String>,
    pub product_name: Option<String>,
    pub product_type: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub commission_cents: i64,
    pub franchisee_id: Option<i32>,
    pub promotion_code: Option<String>,
    pub referrer_user_id: Option<i32>,
    #[serde(default)]
    pub source_type: SourceType,
    pub openid: Option<String>,
    #[serde(default)]
    pub need_confirmation: bool,
    #[serde(default)]
    pub skipped_production: bool,
}

pub struct OrderRepository;

impl OrderRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db_connection: &C,
        id: i32,
    ) -> Result<Option<order::Model>> {
        Order::find_by_id(id)
            .one(db_connection)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn find_by_number<C: ConnectionTrait>(
        db_connection: &C,
        order_number: &str,
    ) -> Result<Vec<order::Model>> {
        Ok(Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .order_by_asc(order::Column::Id)
            .all(db_connection)
            .await?)
    }

    pub async fn create<C: ConnectionTrait>(
        db_connection: &C,
        draft: &OrderDraft,
        order_number: String,
        now: DateTime<Utc>,
    ) -> Result<order::Model> {
        let order = order::ActiveModel {
            order_number: Set(order_number),
            product_category: Set(draft.product_category.clone()),
            customer_name: Set(draft.customer_name.clone()),
            customer_phone: Set(draft.customer_phone.clone()),
            customer_address: Set(draft.customer_address.clone()),
            logistics_info: Set(None),
            size: Set(draft.size.clone()),
            style_name: Set(draft.style_name.clone()),
            product_name: Set(draft.product_name.clone()),
            product_type: Set(draft.product_type.clone()),
            price_cents: Set(draft.price_cents),
            commission_cents: Set(draft.commission_cents),
            franchisee_id: Set(draft.franchisee_id),
            promotion_code: Set(draft.promotion_code.clone()),
            referrer_user_id: Set(draft.referrer_user_id),
            source_type: Set(draft.source_type),
            openid: Set(draft.openid.clone()),
            transaction_id: Set(None),
            paid_amount_cents: Set(None),
            coupon_code: Set(None),
            status: Set(OrderStatus::Unpaid.as_str().to_string()),
            printer_send_status: Set(PrinterSendStatus::NotSent),
            need_confirmation: Set(draft.need_confirmation),
            franchisee_confirmed: Set(false),
            skipped_production: Set(draft.skipped_production),
            has_failed_task: Set(false),
            ai_last_error: Set(None),
            needs_manual_review: Set(false),
            manual_review_reason: Set(None),
            printer_error_message: Set(None),
            cancel_requested_at: Set(None),
            cancel_reason: Set(None),
            refund_key: Set(None),
            selection_extra_cents: Set(0),
            selection_extra_paid: Set(false),
            original_image: Set(None),
            final_image: Set(None),
            final_image_clean: Set(None),
            hd_image: Set(None),
            hd_image_clean: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            payment_time: Set(None),
            shooting_completed_at: Set(None),
            retouch_completed_at: Set(None),
            confirmation_deadline: Set(None),
            franchisee_confirmed_at: Set(None),
            completed_at: Set(None),
            shipped_at: Set(None),
            cancelled_at: Set(None),
            refunded_at: Set(None),
            version: Set(0),
            ..Default::default()
        };

        order.insert(db_connection).await.map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict(format!(
                    "order for category '{}' already exists",
                    draft.product_category
                ))
            } else {
                AppError::DatabaseError(err)
            }
        })
    }

    /// Compare-and-swap on `version`; a lost race is a `Conflict`.
    pub async fn save<C: ConnectionTrait>(
        db_connection: &C,
        current: &order::Model,
        mut active: order::ActiveModel,
        now: DateTime<Utc>,
    ) -> Result<order::Model> {
        active.version = Set(current.version + 1);
        active.updated_at = Set(now);

        Order::update(active)
            .filter(order::Column::Version.eq(current.version))
            .exec(db_connection)
            .await
            .map_err(cas_error("order", current.id))
    }

    pub async fn list_by_status<C: ConnectionTrait>(
        db_connection: &C,
        status: OrderStatus,
        limit: u64,
    ) -> Result<Vec<order::Model>> {
        Ok(Order::find()
            .filter(order::Column::Status.is_in(status.stored_values().iter().copied()))
            .order_by_asc(order::Column::Id)
            .limit(limit)
            .all(db_connection)
            .await?)
    }

    pub async fn list_confirmation_expired<C: ConnectionTrait>(
        db_connection: &C,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<order::Model>> {
        Ok(Order::find()
            .filter(
                order::Column::Status.is_in(
                    OrderStatus::PendingSelection
                        .stored_values()
                        .iter()
                        .copied(),
                ),
            )
            .filter(order::Column::NeedConfirmation.eq(true))
            .filter(order::Column::NeedsManualReview.eq(false))
            .filter(order::Column::ConfirmationDeadline.lte(now))
            .order_by_asc(order::Column::ConfirmationDeadline)
            .limit(limit)
            .all(db_connection)
            .await?)
    }

    pub async fn list_stale_cancel_requests<C: ConnectionTrait>(
        db_connection: &C,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<order::Model>> {
        let terminal = [OrderStatus::Cancelled, OrderStatus::Refunded]
            .iter()
            .flat_map(|status| status.stored_values().iter().copied())
            .collect::<Vec<_>>();

        Ok(Order::find()
            .filter(order::Column::CancelRequestedAt.lte(cutoff))
            .filter(order::Column::NeedsManualReview.eq(false))
            .filter(order::Column::Status.is_not_in(terminal))
            .order_by_asc(order::Column::CancelRequestedAt)
            .limit(limit)
            .all(db_connection)
            .await?)
    }

    pub async fn list_images<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<Vec<order_image::Model>> {
        Ok(OrderImage::find()
            .filter(order_image::Column::OrderId.eq(order_id))
            .order_by_asc(order_image::Column::SortOrder)
            .order_by_asc(order_image::Column::Id)
            .all(db_connection)
            .await?)
    }

    pub async fn has_main_image<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<bool> {
        let count = OrderImage::find()
            .filter(order_image::Column::OrderId.eq(order_id))
            .filter(order_image::Column::IsMain.eq(true))
            .count(db_connection)
            .await?;

        Ok(count > 0)
    }

    pub async fn add_image<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
        image_path: &str,
        kind: ImageKind,
        source_task_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<order_image::Model> {
        let is_main = !Self::has_main_image(db_connection, order_id).await?;
        let sort_order = OrderImage::find()
            .filter(order_image::Column::OrderId.eq(order_id))
            .count(db_connection)
            .await? as i32;

        let image = order_image::ActiveModel {
            order_id: Set(order_id),
            image_path: Set(image_path.to_string()),
            kind: Set(kind),
            is_main: Set(is_main),
            is_selected: Set(false),
            source_task_id: Set(source_task_id),
            sort_order: Set(sort_order),
            created_at: Set(now),
            ..Default::default()
        };

        Ok(image.insert(db_connection).await?)
    }

    /// Attaches a task's render once; `false` when the task already has one.
    pub async fn attach_render<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
        image_path: &str,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let is_main = !Self::has_main_image(db_connection, order_id).await?;
        let sort_order = OrderImage::find()
            .filter(order_image::Column::OrderId.eq(order_id))
            .count(db_connection)
            .await? as i32;

        let image = order_image::ActiveModel {
            order_id: Set(order_id),
            image_path: Set(image_path.to_string()),
            kind: Set(ImageKind::Render),
            is_main: Set(is_main),
            is_selected: Set(false),
            source_task_id: Set(Some(task_id)),
            sort_order: Set(sort_order),
            created_at: Set(now),
            ..Default::default()
        };

        let inserted = OrderImage::insert(image)
            .on_conflict(
                OnConflict::columns([
                    order_image::Column::OrderId,
                    order_image::Column::SourceTaskId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db_connection)
            .await?;

        Ok(inserted > 0)
    }

    /// Marks exactly `image_ids` as the order's picks.
    pub async fn set_selection<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
        image_ids: &[i32],
    ) -> Result<()> {
        OrderImage::update_many()
            .col_expr(order_image::Column::IsSelected, Expr::value(false))
            .filter(order_image::Column::OrderId.eq(order_id))
            .exec(db_connection)
            .await?;

        if !image_ids.is_empty() {
            OrderImage::update_many()
                .col_expr(order_image::Column::IsSelected, Expr::value(true))
                .filter(order_image::Column::OrderId.eq(order_id))
                .filter(order_image::Column::Id.is_in(image_ids.iter().copied()))
                .exec(db_connection)
                .await?;
        }

        Ok(())
    }

    pub async fn count_selected<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<u64> {
        Ok(OrderImage::find()
            .filter(order_image::Column::OrderId.eq(order_id))
            .filter(order_image::Column::IsSelected.eq(true))
            .count(db_connection)
            .await?)
    }
}
