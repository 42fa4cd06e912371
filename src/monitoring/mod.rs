pub mod logger;
pub mod watcher;
