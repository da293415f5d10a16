pub mod config;
pub mod core;
pub mod logging;
pub mod models;
pub mod utils;
