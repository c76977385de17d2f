//! Control protocol between a controller process and the resident runtime.
//!
//! Local sockets only (named pipes / Unix sockets); requests are executed
//! one at a time against the single per-process loader core.

pub mod connections;
pub mod handler;
pub mod protocol;
pub mod server;

pub use connections::{ConnectionConfig, ConnectionGuard, ConnectionPool};
pub use handler::{ControlHandler, HandlerError};
pub use protocol::{
    decode_request, decode_response, encode_request, encode_response, ControlRequest,
    ControlResponse, ErrorKind, ModInfo, ProtocolError,
};
pub use server::{IpcServerConfig, ServerError};
