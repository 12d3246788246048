pub mod config;
pub mod pipeline;
pub mod sqlite_persistence;
pub mod warehouse;
