use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CacheEntries::Table)
                    .if_not_exists()
                    .col(string(CacheEntries::Key).primary_key())
                    .col(text(CacheEntries::Value))
                    .col(big_integer(CacheEntries::ExpiresAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cache_entries_expires_at")
                    .table(CacheEntries::Table)
                    .col(CacheEntries::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(CacheEntries::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum CacheEntries {
    Table,
    Key,
    Value,
    ExpiresAt,
}
