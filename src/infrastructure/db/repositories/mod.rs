pub mod ai_provider;
pub mod ai_task;
pub mod catalog;
pub mod coupon;
pub mod event;
pub mod franchisee;
pub mod order;
pub mod printer_dispatch;
pub mod selection_token;
pub mod system_config;

pub use ai_provider::{AiProviderRepository, ProviderDraft};
pub use ai_task::AiTaskRepository;
pub use catalog::CatalogRepository;
pub use coupon::CouponRepository;
pub use event::EventRepository;
pub use franchisee::FranchiseeRepository;
pub use order::{OrderDraft, OrderRepository};
pub use printer_dispatch::PrinterDispatchRepository;
pub use selection_token::SelectionTokenRepository;
pub use system_config::SystemConfigRepository;

use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::DbErr;

use crate::error::AppError;

/// `PET` + creation time + 4 random characters; sorts by creation time.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let suffix: String = (0..4)
        .map(|_| {
            let mut rng = rand::rng();
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("PET{}{}", now.format("%Y%m%d%H%M%S"), suffix)
}

/// Maps a lost compare-and-swap onto `Conflict`.
pub(crate) fn cas_error(entity: &str, id: impl std::fmt::Display) -> impl FnOnce(DbErr) -> AppError {
    let entity = entity.to_string();
    let id = id.to_string();
    move |err| match err {
        DbErr::RecordNotUpdated => {
            AppError::Conflict(format!("{entity} {id} was modified concurrently"))
        }
        other => AppError::DatabaseError(other),
    }
}

/// Unique-key violations surface as `Conflict`.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn order_numbers_carry_timestamp_and_suffix() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let number = generate_order_number(now);

        assert_eq!(number.len(), 21);
        assert!(number.starts_with("PET20250101000000"));
        assert!(
            number[17..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn order_numbers_sort_by_creation_time() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();

        assert!(generate_order_number(earlier) < generate_order_number(later));
    }
}
