pub mod cache;
pub mod market;
pub mod reader;
pub mod types;
