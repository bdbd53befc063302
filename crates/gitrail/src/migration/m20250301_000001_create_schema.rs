//! Initial migration to create the gitrail database schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_users(manager).await?;
        self.create_projects(manager).await?;
        self.create_agreements(manager).await?;
        self.create_branches(manager).await?;
        self.create_commits(manager).await?;
        self.create_branch_commits(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BranchCommits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Branches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Agreements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_users(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::GithubHandle).string().null())
                    .col(ColumnDef::new(Users::FullName).string().not_null())
                    .col(ColumnDef::new(Users::AvatarUrl).text().null())
                    .col(ColumnDef::new(Users::GithubToken).text().null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_projects(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Projects::GithubRepo).string().null())
                    .col(
                        ColumnDef::new(Projects::GithubLastPolledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_owner")
                            .from(Projects::Table, Projects::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The poller scans by watermark
        manager
            .create_index(
                Index::create()
                    .name("idx_projects_last_polled")
                    .table(Projects::Table)
                    .col(Projects::GithubLastPolledAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_agreements(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Agreements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Agreements::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Agreements::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Agreements::CounterpartyId).uuid().not_null())
                    .col(
                        ColumnDef::new(Agreements::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Agreements::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agreements_project")
                            .from(Agreements::Table, Agreements::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agreements_counterparty")
                            .from(Agreements::Table, Agreements::CounterpartyId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agreements_project_status")
                    .table(Agreements::Table)
                    .col(Agreements::ProjectId)
                    .col(Agreements::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_branches(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Branches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Branches::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Branches::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Branches::Name).string().not_null())
                    .col(
                        ColumnDef::new(Branches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_branches_project")
                            .from(Branches::Table, Branches::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint on (project_id, name)
        manager
            .create_index(
                Index::create()
                    .name("idx_branches_project_name")
                    .table(Branches::Table)
                    .col(Branches::ProjectId)
                    .col(Branches::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Poller picks the oldest branches first
        manager
            .create_index(
                Index::create()
                    .name("idx_branches_project_created")
                    .table(Branches::Table)
                    .col(Branches::ProjectId)
                    .col(Branches::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_commits(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Commits::Id).uuid().not_null().primary_key())
                    // Identity
                    .col(ColumnDef::new(Commits::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Commits::Sha).string().not_null())
                    // Authorship
                    .col(ColumnDef::new(Commits::UserId).uuid().null())
                    .col(ColumnDef::new(Commits::UnregisteredAuthor).string().null())
                    .col(ColumnDef::new(Commits::AgreementId).uuid().null())
                    // Content
                    .col(ColumnDef::new(Commits::Message).text().not_null())
                    .col(
                        ColumnDef::new(Commits::CommittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // Diff statistics
                    .col(ColumnDef::new(Commits::LinesAdded).integer().null())
                    .col(ColumnDef::new(Commits::LinesRemoved).integer().null())
                    .col(ColumnDef::new(Commits::ChangedFiles).json().null())
                    // Tracking
                    .col(
                        ColumnDef::new(Commits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Commits::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Exactly one authorship path
                    .check(Expr::cust(
                        "(user_id IS NULL AND unregistered_author IS NOT NULL) \
                         OR (user_id IS NOT NULL AND unregistered_author IS NULL)",
                    ))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_commits_project")
                            .from(Commits::Table, Commits::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_commits_user")
                            .from(Commits::Table, Commits::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint on (project_id, sha)
        manager
            .create_index(
                Index::create()
                    .name("idx_commits_project_sha")
                    .table(Commits::Table)
                    .col(Commits::ProjectId)
                    .col(Commits::Sha)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Recent-commit listing
        manager
            .create_index(
                Index::create()
                    .name("idx_commits_project_committed")
                    .table(Commits::Table)
                    .col(Commits::ProjectId)
                    .col((Commits::CommittedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // Contributor rollups
        manager
            .create_index(
                Index::create()
                    .name("idx_commits_user")
                    .table(Commits::Table)
                    .col(Commits::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_branch_commits(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BranchCommits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BranchCommits::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BranchCommits::BranchId).uuid().not_null())
                    .col(ColumnDef::new(BranchCommits::CommitId).uuid().not_null())
                    .col(
                        ColumnDef::new(BranchCommits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_branch_commits_branch")
                            .from(BranchCommits::Table, BranchCommits::BranchId)
                            .to(Branches::Table, Branches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_branch_commits_commit")
                            .from(BranchCommits::Table, BranchCommits::CommitId)
                            .to(Commits::Table, Commits::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique constraint on (branch_id, commit_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_branch_commits_pair")
                    .table(BranchCommits::Table)
                    .col(BranchCommits::BranchId)
                    .col(BranchCommits::CommitId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_branch_commits_commit")
                    .table(BranchCommits::Table)
                    .col(BranchCommits::CommitId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "users")]
enum Users {
    Table,
    Id,
    Email,
    GithubHandle,
    FullName,
    AvatarUrl,
    GithubToken,
    CreatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "projects")]
enum Projects {
    Table,
    Id,
    Name,
    OwnerId,
    GithubRepo,
    GithubLastPolledAt,
    CreatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "agreements")]
enum Agreements {
    Table,
    Id,
    ProjectId,
    CounterpartyId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "branches")]
enum Branches {
    Table,
    Id,
    ProjectId,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "commits")]
enum Commits {
    Table,
    Id,
    ProjectId,
    Sha,
    UserId,
    UnregisteredAuthor,
    AgreementId,
    Message,
    CommittedAt,
    LinesAdded,
    LinesRemoved,
    ChangedFiles,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "branch_commits")]
enum BranchCommits {
    Table,
    Id,
    BranchId,
    CommitId,
    CreatedAt,
}
