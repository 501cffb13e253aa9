pub mod assistant;
pub mod auth;
pub mod completion;
pub mod config;
pub mod console;
pub mod conversation;
pub mod database;
pub mod depth;
pub mod history;
pub mod http_server;
pub mod modes;
pub mod rate_limiter;
pub mod sessions;
pub mod stats;
pub mod training;
