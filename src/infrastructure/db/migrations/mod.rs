use sea_orm_migration::{MigrationTrait, MigratorTrait, async_trait::async_trait};

mod m20250101_000001_create_franchisees;
mod m20250101_000002_create_orders;
mod m20250101_000003_create_ai_tasks;
mod m20250101_000004_create_coupons;
mod m20250101_000005_create_fulfillment_support;

pub struct Migrator;

#[async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_franchisees::Migration),
            Box::new(m20250101_000002_create_orders::Migration),
            Box::new(m20250101_000003_create_ai_tasks::Migration),
            Box::new(m20250101_000004_create_coupons::Migration),
            Box::new(m20250101_000005_create_fulfillment_support::Migration),
        ]
    }
}
