//! WebSocket event streaming.
//!
//! Clients connect to `GET /events` and receive every engine event as it is
//! published. They may also ask for current stats or ping the server.

mod manager;
mod protocol;
mod session;

pub use manager::ConnectionManager;
pub use protocol::*;
pub use session::handle_socket;
