pub mod chat;
pub mod forum;
pub mod index;
pub mod status;
