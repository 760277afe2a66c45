use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Bookings::BusinessId).uuid().not_null())
                    .col(
                        ColumnDef::new(Bookings::CheckoutSessionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::ServiceId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::ServiceName).string().not_null())
                    .col(ColumnDef::new(Bookings::CustomerName).string().not_null())
                    .col(ColumnDef::new(Bookings::CustomerEmail).string().not_null())
                    .col(ColumnDef::new(Bookings::CustomerPhone).string().null())
                    .col(ColumnDef::new(Bookings::Notes).text().null())
                    .col(ColumnDef::new(Bookings::BookingDate).timestamp_with_time_zone().not_null())
                    .col(
                        ColumnDef::new(Bookings::DurationMinutes)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::Timezone).string().not_null())
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string_len(20)
                            .not_null()
                            .default("confirmed"),
                    )
                    .col(
                        ColumnDef::new(Bookings::PaymentAmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::PaymentStatus)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Bookings::PaymentId).string().not_null())
                    .col(ColumnDef::new(Bookings::CalendarEventId).string().null())
                    .col(
                        ColumnDef::new(Bookings::CalendarSyncStatus)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Bookings::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Bookings::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_business_id")
                    .table(Bookings::Table)
                    .col(Bookings::BusinessId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Bookings {
    Table,
    Id,
    BusinessId,
    CheckoutSessionId,
    ServiceId,
    ServiceName,
    CustomerName,
    CustomerEmail,
    CustomerPhone,
    Notes,
    BookingDate,
    DurationMinutes,
    Timezone,
    Status,
    PaymentAmountCents,
    PaymentStatus,
    PaymentId,
    CalendarEventId,
    CalendarSyncStatus,
    CreatedAt,
    UpdatedAt,
}
