use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========================================
        // CUSTOM_DOMAINS TABLE
        // ========================================
        manager
            .create_table(
                Table::create()
                    .table(CustomDomains::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomDomains::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CustomDomains::OwnerId).integer().not_null())
                    .col(
                        ColumnDef::new(CustomDomains::Domain)
                            .string_len(253)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::VerificationMethod)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::VerificationToken)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::IsVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CustomDomains::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Global uniqueness on the domain string. Registration relies on this
        // index to close the check-then-insert race between two concurrent
        // callers claiming the same hostname.
        manager
            .create_index(
                Index::create()
                    .name("idx_custom_domains_domain")
                    .table(CustomDomains::Table)
                    .col(CustomDomains::Domain)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Quota checks count by owner
        manager
            .create_index(
                Index::create()
                    .name("idx_custom_domains_owner")
                    .table(CustomDomains::Table)
                    .col(CustomDomains::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CustomDomains::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CustomDomains {
    Table,
    Id,
    OwnerId,
    Domain,
    VerificationMethod,
    VerificationToken,
    IsVerified,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
