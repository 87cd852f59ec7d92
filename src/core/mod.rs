pub mod config;
pub mod error;
pub mod fetcher;
pub mod formatter;
pub mod models;
pub mod parser;
pub mod poller;
pub mod state;
