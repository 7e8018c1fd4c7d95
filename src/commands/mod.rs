// src/commands/mod.rs

pub mod chat;
pub mod session;
pub(crate) mod streaming;

pub use chat::*;
pub use session::*;
