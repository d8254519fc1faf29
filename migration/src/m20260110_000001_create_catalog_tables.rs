use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Plans: what is being sold (duration + price)
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Plans::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Plans::Name).string().not_null())
                    .col(ColumnDef::new(Plans::DurationHours).integer().not_null())
                    .col(ColumnDef::new(Plans::Price).big_integer().not_null())
                    .col(ColumnDef::new(Plans::Description).string().null())
                    .col(
                        ColumnDef::new(Plans::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Plans::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Plans::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Points of sale, each bound to one access-control device
        manager
            .create_table(
                Table::create()
                    .table(PointsOfSale::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PointsOfSale::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PointsOfSale::Name).string().not_null())
                    .col(ColumnDef::new(PointsOfSale::Location).string().not_null())
                    .col(
                        ColumnDef::new(PointsOfSale::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(PointsOfSale::DeviceHost).string().not_null())
                    .col(
                        ColumnDef::new(PointsOfSale::DevicePort)
                            .integer()
                            .not_null()
                            .default(8728),
                    )
                    .col(
                        ColumnDef::new(PointsOfSale::DeviceUsername)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsOfSale::DevicePassword)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsOfSale::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PointsOfSale::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PointsOfSale::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    Name,
    DurationHours,
    Price,
    Description,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PointsOfSale {
    Table,
    Id,
    Name,
    Location,
    IsActive,
    DeviceHost,
    DevicePort,
    DeviceUsername,
    DevicePassword,
    CreatedAt,
    UpdatedAt,
}
