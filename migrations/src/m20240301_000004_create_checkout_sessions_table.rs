use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CheckoutSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CheckoutSessions::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CheckoutSessions::CartId).uuid().not_null())
                    .col(
                        ColumnDef::new(CheckoutSessions::IdempotencyKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::AmountSubtotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::AmountTaxCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::AmountTotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::Status)
                            .string_len(20)
                            .not_null()
                            .default("processing"),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::SquarePaymentId)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(CheckoutSessions::PaidAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(CheckoutSessions::ErrorMessage)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_checkout_sessions_cart_id")
                            .from(CheckoutSessions::Table, CheckoutSessions::CartId)
                            .to(
                                super::m20240301_000003_create_cart_tables::Carts::Table,
                                super::m20240301_000003_create_cart_tables::Carts::Id,
                            ),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_checkout_sessions_cart_id")
                    .table(CheckoutSessions::Table)
                    .col(CheckoutSessions::CartId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CheckoutSessions {
    Table,
    Id,
    CartId,
    IdempotencyKey,
    AmountSubtotalCents,
    AmountTaxCents,
    AmountTotalCents,
    Currency,
    Status,
    SquarePaymentId,
    PaidAt,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
