use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChatActivities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChatActivities::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChatActivities::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChatActivities::LastMessageAt).timestamp())
                    .col(ColumnDef::new(ChatActivities::LastContentHash).string_len(64))
                    .col(
                        ColumnDef::new(ChatActivities::DailyPoints)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ChatActivities::DailyDate).date().not_null())
                    .primary_key(
                        Index::create()
                            .col(ChatActivities::GuildId)
                            .col(ChatActivities::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChatActivities::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ChatActivities {
    Table,
    GuildId,
    UserId,
    LastMessageAt,
    LastContentHash,
    DailyPoints,
    DailyDate,
}
