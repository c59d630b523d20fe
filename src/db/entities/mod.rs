pub mod balances;
pub mod chat_activities;
pub mod economy_configs;
pub mod invite_ledger;
pub mod point_transactions;
pub mod punishments;
pub mod voice_sessions;
