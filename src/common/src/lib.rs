pub mod config;
pub mod constants;
pub mod environment;
pub mod store;
pub mod types;
