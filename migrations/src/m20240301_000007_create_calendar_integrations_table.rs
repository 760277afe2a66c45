use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CalendarIntegrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CalendarIntegrations::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::BusinessId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::Provider)
                            .string()
                            .not_null()
                            .default("google"),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::CalendarId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::AccessToken)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::RefreshToken)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::Timezone)
                            .string()
                            .not_null()
                            .default("UTC"),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::Connected)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CalendarIntegrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CalendarIntegrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CalendarIntegrations {
    Table,
    Id,
    BusinessId,
    Provider,
    CalendarId,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
    Timezone,
    Connected,
    CreatedAt,
    UpdatedAt,
}
