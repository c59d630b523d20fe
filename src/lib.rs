pub mod db;
pub mod engine;
pub mod platform;
pub mod services;

pub use engine::Engine;

pub type Error = anyhow::Error;
