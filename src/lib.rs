pub mod alerts;
pub mod app;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod feed;
pub mod infra;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod tasks;
