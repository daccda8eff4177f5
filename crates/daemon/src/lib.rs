pub mod config;
pub mod health;
pub mod input;
pub mod tracker;
