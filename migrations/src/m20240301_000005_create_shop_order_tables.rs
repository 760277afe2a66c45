use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ShopOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShopOrders::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopOrders::BusinessId).uuid().not_null())
                    .col(
                        ColumnDef::new(ShopOrders::CheckoutSessionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::OrderNumber)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ShopOrders::CustomerName).string().not_null())
                    .col(
                        ColumnDef::new(ShopOrders::CustomerEmail)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopOrders::CustomerPhone).string().null())
                    .col(
                        ColumnDef::new(ShopOrders::SubtotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::TaxCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::TotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::SquarePaymentId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrders::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopOrders::PaidAt).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(ShopOrders::Status)
                            .string_len(20)
                            .not_null()
                            .default("confirmed"),
                    )
                    .col(ColumnDef::new(ShopOrders::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(ShopOrders::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShopOrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShopOrderItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ShopOrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(ShopOrderItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ShopOrderItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(ShopOrderItems::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrderItems::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrderItems::LineTotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopOrderItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shop_order_items_order_id")
                            .from(ShopOrderItems::Table, ShopOrderItems::OrderId)
                            .to(ShopOrders::Table, ShopOrders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shop_order_items_order_id")
                    .table(ShopOrderItems::Table)
                    .col(ShopOrderItems::OrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShopOrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ShopOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ShopOrders {
    Table,
    Id,
    BusinessId,
    CheckoutSessionId,
    OrderNumber,
    CustomerName,
    CustomerEmail,
    CustomerPhone,
    SubtotalCents,
    TaxCents,
    TotalCents,
    Currency,
    SquarePaymentId,
    IdempotencyKey,
    PaidAt,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ShopOrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    Name,
    UnitPriceCents,
    Quantity,
    LineTotalCents,
    CreatedAt,
}
