pub mod cache;
pub mod chat;
pub mod config;
pub mod duration_parser;
pub mod eligibility;
pub mod invites;
pub mod leaderboard;
pub mod ledger;
pub mod punishment;
pub mod voice;
