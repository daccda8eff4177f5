pub mod beacon;
pub mod client;

pub use client::ApiClient;
pub use tableside_api;
