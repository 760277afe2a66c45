use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // At most one paid checkout session may ever exist per cart. The
        // application checks before charging, but only this index makes the
        // guarantee hold under concurrent submissions of the same cart.
        // Partial indexes use the same syntax on Postgres and SQLite.
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_checkout_sessions_paid_cart \
             ON checkout_sessions (cart_id) WHERE status = 'paid'",
        )
        .await?;

        // A session token maps to at most one live cart per business; carts
        // that are checked out or abandoned free the token for reuse.
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_carts_active_token \
             ON carts (business_id, session_token) WHERE status = 'active'",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP INDEX IF EXISTS uq_checkout_sessions_paid_cart")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS uq_carts_active_token")
            .await?;
        Ok(())
    }
}
