use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Punishments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Punishments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Punishments::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Punishments::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Punishments::ModeratorId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Punishments::Reason).string())
                    .col(ColumnDef::new(Punishments::ExpiresAt).timestamp())
                    .col(
                        ColumnDef::new(Punishments::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Punishments::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-punishments-guild-user-active")
                    .table(Punishments::Table)
                    .col(Punishments::GuildId)
                    .col(Punishments::UserId)
                    .col(Punishments::Active)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Punishments::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Punishments {
    Table,
    Id,
    GuildId,
    UserId,
    ModeratorId,
    Reason,
    ExpiresAt,
    Active,
    CreatedAt,
}
