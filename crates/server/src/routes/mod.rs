pub mod admin;
pub mod health;
pub mod restaurants;
pub mod rpc;
pub mod sessions;
pub mod webhooks;
