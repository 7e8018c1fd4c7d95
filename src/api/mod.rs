// src/api/mod.rs

pub mod client;
pub mod stream;

pub use client::BackendClient;
pub use stream::{EventStream, QueryTransport, SseTransport};
