use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BusinessProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BusinessProfiles::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BusinessProfiles::Name).string().not_null())
                    .col(
                        ColumnDef::new(BusinessProfiles::SquareLocationId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BusinessProfiles::NotificationEmail)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BusinessProfiles::Currency)
                            .string()
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(BusinessProfiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BusinessProfiles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BusinessServices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BusinessServices::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BusinessServices::BusinessId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BusinessServices::Name).string().not_null())
                    .col(
                        ColumnDef::new(BusinessServices::PriceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BusinessServices::DurationMinutes)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BusinessServices::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BusinessServices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BusinessServices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_business_services_business_id")
                    .table(BusinessServices::Table)
                    .col(BusinessServices::BusinessId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BusinessServices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BusinessProfiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BusinessProfiles {
    Table,
    Id,
    Name,
    SquareLocationId,
    NotificationEmail,
    Currency,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum BusinessServices {
    Table,
    Id,
    BusinessId,
    Name,
    PriceCents,
    DurationMinutes,
    Active,
    CreatedAt,
    UpdatedAt,
}
