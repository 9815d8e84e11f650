pub mod api;
pub mod client;
pub mod core;
pub mod error;
pub mod session;
pub mod settings;
