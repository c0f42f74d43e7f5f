pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod permissions;
pub mod routes;
pub mod services;
pub mod state;
pub mod webhook;
pub mod weclapp;

pub use routes::app;
pub use state::AppState;
