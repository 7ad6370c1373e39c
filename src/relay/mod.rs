pub mod connection;
pub mod models;
pub mod registry;
pub mod server;
pub mod webhook;
pub mod websocket;

pub use connection::{Connection, ConnectionId, DeliveryError};
pub use registry::{BroadcastSummary, ConnectionRegistry};
pub use server::{AppState, RelayServer, ServerConfig};
