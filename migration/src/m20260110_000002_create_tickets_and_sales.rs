use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tickets::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tickets::Code).string().not_null())
                    .col(ColumnDef::new(Tickets::PlanId).uuid().not_null())
                    .col(ColumnDef::new(Tickets::PointOfSaleId).uuid().not_null())
                    .col(
                        ColumnDef::new(Tickets::Status)
                            .string()
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(Tickets::UsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_plan")
                            .from(Tickets::Table, Tickets::PlanId)
                            .to(Plans::Table, Plans::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_point_of_sale")
                            .from(Tickets::Table, Tickets::PointOfSaleId)
                            .to(PointsOfSale::Table, PointsOfSale::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Voucher codes are globally unique for the lifetime of the system.
        // This index is what turns a concurrent code collision into an
        // insert error the issuance path can retry on.
        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_code")
                    .table(Tickets::Table)
                    .col(Tickets::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sales::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sales::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sales::TicketId).uuid().not_null())
                    .col(ColumnDef::new(Sales::PlanId).uuid().not_null())
                    .col(ColumnDef::new(Sales::PointOfSaleId).uuid().not_null())
                    .col(ColumnDef::new(Sales::CashierId).uuid().not_null())
                    .col(ColumnDef::new(Sales::PaymentMethod).string().not_null())
                    .col(ColumnDef::new(Sales::Amount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Sales::PaymentStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Sales::TransactionId).string().null())
                    .col(ColumnDef::new(Sales::CustomerEmail).string().null())
                    .col(ColumnDef::new(Sales::CustomerPhone).string().null())
                    .col(
                        ColumnDef::new(Sales::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sales::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_ticket")
                            .from(Sales::Table, Sales::TicketId)
                            .to(Tickets::Table, Tickets::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_plan")
                            .from(Sales::Table, Sales::PlanId)
                            .to(Plans::Table, Plans::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sales_point_of_sale")
                            .from(Sales::Table, Sales::PointOfSaleId)
                            .to(PointsOfSale::Table, PointsOfSale::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One sale per ticket
        manager
            .create_index(
                Index::create()
                    .name("idx_sales_ticket_id")
                    .table(Sales::Table)
                    .col(Sales::TicketId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sales::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tickets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    Code,
    PlanId,
    PointOfSaleId,
    Status,
    UsedAt,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Sales {
    Table,
    Id,
    TicketId,
    PlanId,
    PointOfSaleId,
    CashierId,
    PaymentMethod,
    Amount,
    PaymentStatus,
    TransactionId,
    CustomerEmail,
    CustomerPhone,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum PointsOfSale {
    Table,
    Id,
}
