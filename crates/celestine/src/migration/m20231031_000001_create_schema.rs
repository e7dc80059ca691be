//! Initial migration to create the celestine database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_addresses(manager).await?;
        self.create_prices(manager).await?;
        self.create_celestials(manager).await?;
        self.create_sync_state(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Celestials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Prices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Addresses::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_addresses(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Addresses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Addresses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Addresses::Height).big_integer().not_null())
                    .col(ColumnDef::new(Addresses::Hash).binary().not_null())
                    .col(ColumnDef::new(Addresses::Address).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_addresses_hash")
                    .table(Addresses::Table)
                    .col(Addresses::Hash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_prices(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prices::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prices::Currency).string().not_null())
                    .col(
                        ColumnDef::new(Prices::Time)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Prices::Open).double().not_null())
                    .col(ColumnDef::new(Prices::High).double().not_null())
                    .col(ColumnDef::new(Prices::Low).double().not_null())
                    .col(ColumnDef::new(Prices::Close).double().not_null())
                    .to_owned(),
            )
            .await?;

        // Natural key of a candle, also the upsert conflict target
        manager
            .create_index(
                Index::create()
                    .name("idx_prices_currency_time")
                    .table(Prices::Table)
                    .col(Prices::Currency)
                    .col(Prices::Time)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_celestials(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Celestials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Celestials::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Celestials::CelestialId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Celestials::AddressId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Celestials::ImageUrl)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Celestials::ChangeId)
                            .big_integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_celestials_address")
                            .from(Celestials::Table, Celestials::AddressId)
                            .to(Addresses::Table, Addresses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_celestials_address_id")
                    .table(Celestials::Table)
                    .col(Celestials::AddressId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_sync_state(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncState::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncState::Name)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SyncState::Position)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncState::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Addresses {
    Table,
    Id,
    Height,
    Hash,
    Address,
}

#[derive(DeriveIden)]
enum Prices {
    Table,
    Id,
    Currency,
    Time,
    Open,
    High,
    Low,
    Close,
}

#[derive(DeriveIden)]
enum Celestials {
    Table,
    Id,
    CelestialId,
    AddressId,
    ImageUrl,
    ChangeId,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "sync_state")]
enum SyncState {
    Table,
    Id,
    Name,
    Position,
    UpdatedAt,
}
