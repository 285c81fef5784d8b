pub mod chat;
pub mod forum;
pub mod server;
