use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240105_000001_create_master_data::Migration),
            Box::new(m20240105_000002_create_stock_lots::Migration),
            Box::new(m20240105_000003_create_stock_quants::Migration),
            Box::new(m20240105_000004_create_pickings::Migration),
            Box::new(m20240105_000005_create_document_sequences::Migration),
        ]
    }
}

// Migration implementations

mod m20240105_000001_create_master_data {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240105_000001_create_master_data"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::DefaultCode).string())
                        .col(
                            ColumnDef::new(Products::Tracking)
                                .string()
                                .not_null()
                                .default("none"),
                        )
                        .col(
                            ColumnDef::new(Products::Ownership)
                                .string()
                                .not_null()
                                .default("owned"),
                        )
                        .col(
                            ColumnDef::new(Products::StandardPrice)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Locations::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Locations::Name).string().not_null())
                        .col(
                            ColumnDef::new(Locations::Usage)
                                .string()
                                .not_null()
                                .default("internal"),
                        )
                        .col(ColumnDef::new(Locations::Category).string())
                        .col(
                            ColumnDef::new(Locations::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Locations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Locations::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_locations_usage")
                        .table(Locations::Table)
                        .col(Locations::Usage)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Projects::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Projects::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Projects::Name).string().not_null())
                        .col(ColumnDef::new(Projects::Code).string())
                        .col(
                            ColumnDef::new(Projects::Phase)
                                .string()
                                .not_null()
                                .default("open"),
                        )
                        .col(
                            ColumnDef::new(Projects::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Projects::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Projects::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Name,
        DefaultCode,
        Tracking,
        Ownership,
        StandardPrice,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Locations {
        Table,
        Id,
        Name,
        Usage,
        Category,
        Active,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Projects {
        Table,
        Id,
        Name,
        Code,
        Phase,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240105_000002_create_stock_lots {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240105_000002_create_stock_lots"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLots::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockLots::ProductId).big_integer().not_null())
                        .col(ColumnDef::new(StockLots::Name).string().not_null())
                        .col(
                            ColumnDef::new(StockLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Lot names are unique per product.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_lots_product_name")
                        .table(StockLots::Table)
                        .col(StockLots::ProductId)
                        .col(StockLots::Name)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockLots {
        Table,
        Id,
        ProductId,
        Name,
        CreatedAt,
    }
}

mod m20240105_000003_create_stock_quants {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240105_000003_create_stock_quants"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockQuants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockQuants::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockQuants::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockQuants::LocationId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockQuants::LotId).big_integer())
                        .col(ColumnDef::new(StockQuants::ProjectId).big_integer())
                        .col(
                            ColumnDef::new(StockQuants::Quantity)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockQuants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockQuants::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            // The four-part logical key is enforced by the ledger primitive;
            // this index keeps its lookups cheap.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_quants_key")
                        .table(StockQuants::Table)
                        .col(StockQuants::ProductId)
                        .col(StockQuants::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockQuants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockQuants {
        Table,
        Id,
        ProductId,
        LocationId,
        LotId,
        ProjectId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240105_000004_create_pickings {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240105_000004_create_pickings"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockPickings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockPickings::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockPickings::Name).string().not_null())
                        .col(
                            ColumnDef::new(StockPickings::PickingType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockPickings::State)
                                .string()
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(StockPickings::LocationId).big_integer())
                        .col(ColumnDef::new(StockPickings::LocationDestId).big_integer())
                        .col(ColumnDef::new(StockPickings::PartnerName).string())
                        .col(ColumnDef::new(StockPickings::Origin).string())
                        .col(ColumnDef::new(StockPickings::ProjectId).big_integer())
                        .col(ColumnDef::new(StockPickings::Notes).text())
                        .col(ColumnDef::new(StockPickings::DateDone).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(StockPickings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockPickings::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_pickings_state")
                        .table(StockPickings::Table)
                        .col(StockPickings::State)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMoves::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMoves::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockMoves::PickingId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMoves::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMoves::ProductUomQty)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMoves::QuantityDone)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockMoves::PriceUnit)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockMoves::LocationId).big_integer())
                        .col(ColumnDef::new(StockMoves::LocationDestId).big_integer())
                        .col(ColumnDef::new(StockMoves::ProjectId).big_integer())
                        .col(
                            ColumnDef::new(StockMoves::State)
                                .string()
                                .not_null()
                                .default("draft"),
                        )
                        .col(
                            ColumnDef::new(StockMoves::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_moves_picking")
                                .from(StockMoves::Table, StockMoves::PickingId)
                                .to(StockPickings::Table, StockPickings::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_moves_picking_id")
                        .table(StockMoves::Table)
                        .col(StockMoves::PickingId)
                        .to_owned(),
                )
                .await?;

            // Serves the reservation query: moves by product and source
            // location, filtered by state.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_moves_product_location")
                        .table(StockMoves::Table)
                        .col(StockMoves::ProductId)
                        .col(StockMoves::LocationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMoveLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMoveLines::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(StockMoveLines::MoveId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMoveLines::LotId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMoveLines::QtyDone)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_move_lines_move")
                                .from(StockMoveLines::Table, StockMoveLines::MoveId)
                                .to(StockMoves::Table, StockMoves::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_move_lines_move_id")
                        .table(StockMoveLines::Table)
                        .col(StockMoveLines::MoveId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMoveLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockMoves::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockPickings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockPickings {
        Table,
        Id,
        Name,
        PickingType,
        State,
        LocationId,
        LocationDestId,
        PartnerName,
        Origin,
        ProjectId,
        Notes,
        DateDone,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMoves {
        Table,
        Id,
        PickingId,
        ProductId,
        ProductUomQty,
        QuantityDone,
        PriceUnit,
        LocationId,
        LocationDestId,
        ProjectId,
        State,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMoveLines {
        Table,
        Id,
        MoveId,
        LotId,
        QtyDone,
    }
}

mod m20240105_000005_create_document_sequences {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240105_000005_create_document_sequences"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::Prefix)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::NextNumber)
                                .big_integer()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DocumentSequences {
        Table,
        Prefix,
        NextNumber,
    }
}
