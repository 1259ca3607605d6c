// Domain module - Core domain types
pub mod config;
pub mod error;
