//! Controller-side control client.

use thiserror::Error;

use interprocess::local_socket::tokio::prelude::*;
use interprocess::local_socket::tokio::Stream;

use crate::ipc::protocol::{
    decode_response, encode_request, ControlRequest, ControlResponse, ProtocolError,
    MAX_MESSAGE_SIZE,
};
use crate::ipc::server::{read_frame, socket_name, write_frame, ServerError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("cannot connect to runtime at {path}: {source}")]
    Connect {
        path: String,
        source: std::io::Error,
    },

    #[error("connection closed before a response arrived")]
    Disconnected,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// One connection to the resident runtime's control socket.
pub struct ControlClient {
    stream: Stream,
}

impl ControlClient {
    /// Connect to the control socket at `path`.
    pub async fn connect(path: &str) -> Result<Self, CliError> {
        let name = socket_name(path)?;
        let stream = Stream::connect(name).await.map_err(|source| CliError::Connect {
            path: path.to_string(),
            source,
        })?;
        Ok(Self { stream })
    }

    /// Send one request and wait for its response.
    pub async fn request(&mut self, request: &ControlRequest) -> Result<ControlResponse, CliError> {
        let bytes = encode_request(request)?;
        write_frame(&mut self.stream, &bytes).await?;
        let frame = read_frame(&mut self.stream, MAX_MESSAGE_SIZE)
            .await?
            .ok_or(CliError::Disconnected)?;
        Ok(decode_response(&frame)?)
    }
}
