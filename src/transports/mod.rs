//! Concrete transport implementations

pub mod websocket;

pub use websocket::{WebSocketConnector, WebSocketSession};
