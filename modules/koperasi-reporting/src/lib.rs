pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod repos;
pub mod routes;
pub mod services;

pub use routes::{router, AppState};
