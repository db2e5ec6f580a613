use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_orders_tables::Migration),
            Box::new(m20250101_000003_create_deliveries_table::Migration),
            Box::new(m20250101_000004_create_harvest_tables::Migration),
            Box::new(m20250101_000005_create_audit_records_table::Migration),
        ]
    }
}

mod m20250101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Phone).string().null())
                        .col(ColumnDef::new(Users::Role).string().not_null())
                        .col(
                            ColumnDef::new(Users::Status)
                                .string()
                                .not_null()
                                .default("ACTIVE"),
                        )
                        .col(
                            ColumnDef::new(Users::Availability)
                                .string()
                                .not_null()
                                .default("UNAVAILABLE"),
                        )
                        .col(ColumnDef::new(Users::ServiceArea).string().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Role,
        Status,
        Availability,
        ServiceArea,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::DeliveryType).string().not_null())
                        .col(
                            ColumnDef::new(Orders::Subtotal)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveryFee)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Total).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ListingId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::LineTotal)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        CustomerId,
        DeliveryType,
        Subtotal,
        DeliveryFee,
        Total,
        Status,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ListingId,
        Quantity,
        UnitPrice,
        LineTotal,
    }
}

mod m20250101_000003_create_deliveries_table {
    use super::m20250101_000002_create_orders_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_deliveries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Deliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Deliveries::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Deliveries::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Deliveries::DriverId).uuid().null())
                        .col(ColumnDef::new(Deliveries::Address).string().not_null())
                        .col(ColumnDef::new(Deliveries::ContactName).string().not_null())
                        .col(ColumnDef::new(Deliveries::Phone).string().not_null())
                        .col(ColumnDef::new(Deliveries::Status).string().not_null())
                        .col(
                            ColumnDef::new(Deliveries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_deliveries_order_id")
                                .from(Deliveries::Table, Deliveries::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_deliveries_driver_id")
                        .table(Deliveries::Table)
                        .col(Deliveries::DriverId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_deliveries_customer_id")
                        .table(Deliveries::Table)
                        .col(Deliveries::CustomerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Deliveries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Deliveries {
        Table,
        Id,
        OrderId,
        CustomerId,
        DriverId,
        Address,
        ContactName,
        Phone,
        Status,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20250101_000004_create_harvest_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_harvest_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(HarvestRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HarvestRequests::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(HarvestRequests::FarmerId).uuid().not_null())
                        .col(ColumnDef::new(HarvestRequests::Crop).string().not_null())
                        .col(
                            ColumnDef::new(HarvestRequests::ExpectedYield)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(HarvestRequests::YieldUnit)
                                .string()
                                .not_null()
                                .default("kg"),
                        )
                        .col(ColumnDef::new(HarvestRequests::HarvestDate).date().not_null())
                        .col(ColumnDef::new(HarvestRequests::Location).string().null())
                        .col(ColumnDef::new(HarvestRequests::Notes).text().null())
                        .col(ColumnDef::new(HarvestRequests::ExpertId).uuid().null())
                        .col(ColumnDef::new(HarvestRequests::ExpertName).string().null())
                        .col(ColumnDef::new(HarvestRequests::AdminAdvice).text().null())
                        .col(ColumnDef::new(HarvestRequests::ScheduledDate).date().null())
                        .col(ColumnDef::new(HarvestRequests::Status).string().not_null())
                        .col(
                            ColumnDef::new(HarvestRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(HarvestRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(HarvestRequests::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_harvest_requests_farmer_id")
                        .table(HarvestRequests::Table)
                        .col(HarvestRequests::FarmerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_harvest_requests_expert_status")
                        .table(HarvestRequests::Table)
                        .col(HarvestRequests::ExpertId)
                        .col(HarvestRequests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(HarvestTracking::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HarvestTracking::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(HarvestTracking::RequestId).uuid().not_null())
                        .col(ColumnDef::new(HarvestTracking::Progress).integer().not_null())
                        .col(ColumnDef::new(HarvestTracking::Notes).text().null())
                        .col(ColumnDef::new(HarvestTracking::UpdatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(HarvestTracking::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_harvest_tracking_request_id")
                                .from(HarvestTracking::Table, HarvestTracking::RequestId)
                                .to(HarvestRequests::Table, HarvestRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(HarvestPhases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(HarvestPhases::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(HarvestPhases::RequestId).uuid().not_null())
                        .col(ColumnDef::new(HarvestPhases::Position).integer().not_null())
                        .col(ColumnDef::new(HarvestPhases::Phase).string().not_null())
                        .col(ColumnDef::new(HarvestPhases::Status).string().not_null())
                        .col(ColumnDef::new(HarvestPhases::Activities).json().not_null())
                        .col(ColumnDef::new(HarvestPhases::Notes).text().null())
                        .col(
                            ColumnDef::new(HarvestPhases::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_harvest_phases_request_id")
                                .from(HarvestPhases::Table, HarvestPhases::RequestId)
                                .to(HarvestRequests::Table, HarvestRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_harvest_phases_request_position")
                        .table(HarvestPhases::Table)
                        .col(HarvestPhases::RequestId)
                        .col(HarvestPhases::Position)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(HarvestPhases::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(HarvestTracking::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(HarvestRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum HarvestRequests {
        Table,
        Id,
        FarmerId,
        Crop,
        ExpectedYield,
        YieldUnit,
        HarvestDate,
        Location,
        Notes,
        ExpertId,
        ExpertName,
        AdminAdvice,
        ScheduledDate,
        Status,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum HarvestTracking {
        Table,
        Id,
        RequestId,
        Progress,
        Notes,
        UpdatedBy,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum HarvestPhases {
        Table,
        Id,
        RequestId,
        Position,
        Phase,
        Status,
        Activities,
        Notes,
        CompletedAt,
    }
}

mod m20250101_000005_create_audit_records_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_audit_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditRecords::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(AuditRecords::EntityType).string().not_null())
                        .col(ColumnDef::new(AuditRecords::EntityId).uuid().not_null())
                        .col(ColumnDef::new(AuditRecords::FromStatus).string().null())
                        .col(ColumnDef::new(AuditRecords::ToStatus).string().not_null())
                        .col(ColumnDef::new(AuditRecords::ActorId).uuid().not_null())
                        .col(ColumnDef::new(AuditRecords::ActorRole).string().not_null())
                        .col(ColumnDef::new(AuditRecords::Note).text().null())
                        .col(
                            ColumnDef::new(AuditRecords::RecordedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_records_entity")
                        .table(AuditRecords::Table)
                        .col(AuditRecords::EntityType)
                        .col(AuditRecords::EntityId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditRecords {
        Table,
        Id,
        EntityType,
        EntityId,
        FromStatus,
        ToStatus,
        ActorId,
        ActorRole,
        Note,
        RecordedAt,
    }
}
