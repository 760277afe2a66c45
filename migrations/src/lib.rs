pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_business_tables;
mod m20240301_000002_create_products_table;
mod m20240301_000003_create_cart_tables;
mod m20240301_000004_create_checkout_sessions_table;
mod m20240301_000005_create_shop_order_tables;
mod m20240301_000006_create_bookings_table;
mod m20240301_000007_create_calendar_integrations_table;
mod m20240301_000008_add_checkout_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_business_tables::Migration),
            Box::new(m20240301_000002_create_products_table::Migration),
            Box::new(m20240301_000003_create_cart_tables::Migration),
            Box::new(m20240301_000004_create_checkout_sessions_table::Migration),
            Box::new(m20240301_000005_create_shop_order_tables::Migration),
            Box::new(m20240301_000006_create_bookings_table::Migration),
            Box::new(m20240301_000007_create_calendar_integrations_table::Migration),
            Box::new(m20240301_000008_add_checkout_indexes::Migration),
        ]
    }
}
