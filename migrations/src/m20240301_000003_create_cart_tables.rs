use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Carts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Carts::SessionToken).string().not_null())
                    .col(ColumnDef::new(Carts::BusinessId).uuid().not_null())
                    .col(
                        ColumnDef::new(Carts::Status)
                            .string_len(20)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Carts::ExpiresAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Carts::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Carts::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CartItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::Name).string().not_null())
                    .col(
                        ColumnDef::new(CartItems::ItemType)
                            .string_len(20)
                            .not_null()
                            .default("product"),
                    )
                    .col(
                        ColumnDef::new(CartItems::UnitPriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(CartItems::LineTotalCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CartItems::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(CartItems::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_cart_id")
                            .from(CartItems::Table, CartItems::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CartBookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CartBookings::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CartBookings::CartId).uuid().not_null())
                    .col(ColumnDef::new(CartBookings::ServiceId).uuid().not_null())
                    .col(
                        ColumnDef::new(CartBookings::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CartBookings::EndTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(CartBookings::Timezone).string().not_null())
                    .col(ColumnDef::new(CartBookings::CustomerName).string().null())
                    .col(ColumnDef::new(CartBookings::CustomerEmail).string().null())
                    .col(ColumnDef::new(CartBookings::CustomerPhone).string().null())
                    .col(ColumnDef::new(CartBookings::Notes).text().null())
                    .col(
                        ColumnDef::new(CartBookings::Status)
                            .string_len(20)
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(CartBookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartBookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_bookings_cart_id")
                            .from(CartBookings::Table, CartBookings::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cart_items_cart_id")
                    .table(CartItems::Table)
                    .col(CartItems::CartId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cart_bookings_cart_id")
                    .table(CartBookings::Table)
                    .col(CartBookings::CartId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CartBookings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Carts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Carts {
    Table,
    Id,
    SessionToken,
    BusinessId,
    Status,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum CartItems {
    Table,
    Id,
    CartId,
    ProductId,
    Name,
    ItemType,
    UnitPriceCents,
    Quantity,
    LineTotalCents,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum CartBookings {
    Table,
    Id,
    CartId,
    ServiceId,
    StartTime,
    EndTime,
    Timezone,
    CustomerName,
    CustomerEmail,
    CustomerPhone,
    Notes,
    Status,
    CreatedAt,
    UpdatedAt,
}
