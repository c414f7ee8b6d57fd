use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::db::entities::{
    order::OrderStatus, order_image, selection_token::TokenPurpose,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub free_selection_count: i32,
    pub extra_photo_price_cents: i64,
}

impl Pricing {
    /// Surplus picks beyond the free allowance, and their price.
    pub fn extra_for(&self, picks: usize) -> (i64, i64) {
        let extra = (picks as i64 - self.free_selection_count.max(0) as i64).max(0);
        (extra, extra * self.extra_photo_price_cents)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderVariant {
    pub id: i32,
    pub image_path: String,
    pub is_main: bool,
    pub is_selected: bool,
}

impl From<order_image::Model> for RenderVariant {
    fn from(image: order_image::Model) -> Self {
        Self {
            id: image.id,
            image_path: image.image_path,
            is_main: image.is_main,
            is_selected: image.is_selected,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSession {
    pub order_id: i32,
    pub order_number: String,
    pub pricing: Pricing,
    pub variants: Vec<RenderVariant>,
    pub confirmation_deadline: Option<DateTime<Utc>>,
    pub pick: IssuedToken,
    pub confirm: IssuedToken,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickReceipt {
    pub order_id: i32,
    pub selected_image_ids: Vec<i32>,
    pub extra_count: i64,
    pub extra_fee_cents: i64,
    /// Surplus was debited from the franchisee balance.
    pub charged_to_franchisee: bool,
    /// Customer still owes the surplus.
    pub payment_pending: bool,
}

/// Stored on the consumed confirm token and replayed on repeat calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResult {
    pub order_id: i32,
    pub order_number: String,
    pub status: OrderStatus,
    pub selected_image_ids: Vec<i32>,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surplus_is_priced_per_photo() {
        let pricing = Pricing {
            free_selection_count: 1,
            extra_photo_price_cents: 1_000,
        };

        assert_eq!(pricing.extra_for(1), (0, 0));
        assert_eq!(pricing.extra_for(3), (2, 2_000));
        assert_eq!(pricing.extra_for(0), (0, 0));
    }
}
