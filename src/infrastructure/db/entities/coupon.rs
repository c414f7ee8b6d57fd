use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub code: String,

    pub discount_type: DiscountType,

    /// Cents for fixed discounts, whole percent for percentage discounts.
    pub value: i64,

    pub creator_type: String,

    #[sea_orm(nullable)]
    pub customer_phone: Option<String>,

    pub status: CouponStatus,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub version: i32,
}

impl Model {
    pub fn discount_for(&self, price_cents: i64) -> i64 {
        let discount = match self.discount_type {
            DiscountType::Fixed => self.value,
            DiscountType::Percent => price_cents * self.value.clamp(0, 100) / 100,
        };
        discount.clamp(0, price_cents.max(0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "fixed")]
    Fixed,

    #[sea_orm(string_value = "percent")]
    Percent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    #[default]
    #[sea_orm(string_value = "unused")]
    Unused,

    #[sea_orm(string_value = "used")]
    Used,

    #[sea_orm(string_value = "expired")]
    Expired,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_usage::Entity")]
    CouponUsage,
}

impl Related<super::coupon_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponUsage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn coupon(discount_type: DiscountType, value: i64) -> Model {
        Model {
            id: 1,
            code: "WELCOME".into(),
            discount_type,
            value,
            creator_type: "admin".into(),
            customer_phone: None,
            status: CouponStatus::Unused,
            expires_at: None,
            created_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn discounts_never_exceed_price() {
        assert_eq!(coupon(DiscountType::Fixed, 500).discount_for(19_900), 500);
        assert_eq!(coupon(DiscountType::Fixed, 50_000).discount_for(19_900), 19_900);
        assert_eq!(coupon(DiscountType::Percent, 20).discount_for(10_000), 2_000);
        assert_eq!(coupon(DiscountType::Percent, 150).discount_for(10_000), 10_000);
    }
}
