// src/types/mod.rs

pub mod chat;
pub mod events;
pub mod payload;
pub mod session;

pub use chat::*;
pub use events::*;
pub use payload::*;
pub use session::*;
