pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod evaporation;
pub mod export;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod presentation;
pub mod server;
