pub mod m000001_create_balances;
pub mod m000002_create_point_transactions;
pub mod m000003_create_chat_activities;
pub mod m000004_create_voice_sessions;
pub mod m000005_create_invite_ledger;
pub mod m000006_create_punishments;
pub mod m000007_create_economy_configs;

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m000001_create_balances::Migration),
            Box::new(m000002_create_point_transactions::Migration),
            Box::new(m000003_create_chat_activities::Migration),
            Box::new(m000004_create_voice_sessions::Migration),
            Box::new(m000005_create_invite_ledger::Migration),
            Box::new(m000006_create_punishments::Migration),
            Box::new(m000007_create_economy_configs::Migration),
        ]
    }
}
