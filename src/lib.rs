pub mod client;
pub mod config;
pub mod index;
pub mod logging;
pub mod remote;
pub mod server;
pub mod service;
pub mod version;
pub mod watcher;
