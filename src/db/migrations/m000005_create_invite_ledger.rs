use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InviteLedger::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InviteLedger::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteLedger::InviteeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteLedger::InviterId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteLedger::InvitedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteLedger::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InviteLedger::ConfirmedAt).timestamp())
                    .col(ColumnDef::new(InviteLedger::RevokedAt).timestamp())
                    .col(ColumnDef::new(InviteLedger::RevokedReason).string_len(32))
                    .col(
                        ColumnDef::new(InviteLedger::PointsAwarded)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(InviteLedger::GuildId)
                            .col(InviteLedger::InviteeId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invite-ledger-status")
                    .table(InviteLedger::Table)
                    .col(InviteLedger::Status)
                    .col(InviteLedger::InvitedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invite-ledger-guild-inviter")
                    .table(InviteLedger::Table)
                    .col(InviteLedger::GuildId)
                    .col(InviteLedger::InviterId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InviteLedger::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum InviteLedger {
    Table,
    GuildId,
    InviteeId,
    InviterId,
    InvitedAt,
    Status,
    ConfirmedAt,
    RevokedAt,
    RevokedReason,
    PointsAwarded,
}
