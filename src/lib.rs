pub mod bot;
pub mod config;
pub mod database;
pub mod executor;
pub mod extract;
pub mod fallback;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod resolver;
pub mod schema;
pub mod telegram;
