//! Discord side of the relay: the signed interaction endpoint, acknowledgment of each
//! interaction within its validity window, command dispatch, and the HTTP client that forwards
//! validated input to the backend.

pub mod ack;
pub mod client;
pub mod commands;
pub mod interaction;
pub mod router;
pub mod server;
pub mod transport;
pub mod verify;
