pub mod browser;
pub mod capture;
pub mod config;
pub mod error;
pub mod harness;
pub mod interaction;
pub mod pipeline;
pub mod report;
pub mod server;
