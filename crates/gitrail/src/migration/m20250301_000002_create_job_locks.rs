//! Table backing the TTL single-flight lock.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobLocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobLocks::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobLocks::Holder).uuid().not_null())
                    .col(
                        ColumnDef::new(JobLocks::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobLocks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "job_locks")]
enum JobLocks {
    Table,
    Key,
    Holder,
    ExpiresAt,
}
