pub mod client;
pub mod error;
pub mod models;

pub use client::WeclappClient;
pub use error::WeclappError;
