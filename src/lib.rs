pub mod client;
pub mod config;
pub mod error;
pub mod policy;
pub mod resource;
pub mod retry;
