use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Balances::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Balances::GuildId).big_integer().not_null())
                    .col(ColumnDef::new(Balances::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Balances::Points)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Balances::FrozenUntil).timestamp())
                    .col(ColumnDef::new(Balances::CreatedAt).timestamp().not_null())
                    .primary_key(
                        Index::create()
                            .col(Balances::GuildId)
                            .col(Balances::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balances-guild-points")
                    .table(Balances::Table)
                    .col(Balances::GuildId)
                    .col((Balances::Points, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Balances {
    Table,
    GuildId,
    UserId,
    Points,
    FrozenUntil,
    CreatedAt,
}
