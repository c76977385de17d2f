//! Control socket server.
//!
//! Listens on a local socket (named pipe on Windows, Unix socket
//! elsewhere) and speaks length-prefixed JSON frames: a u32 little-endian
//! byte count followed by one encoded request or response. Frames from one
//! connection are processed in order; across connections the handler's
//! dispatch lock keeps operations serialized.

use std::io;
use std::sync::Arc;

use interprocess::local_socket::tokio::prelude::*;
use interprocess::local_socket::ListenerOptions;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::connections::{ConnectionConfig, ConnectionPool};
use super::handler::ControlHandler;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind control socket {path}: {source}")]
    Bind { path: String, source: io::Error },

    #[error("socket name error: {0}")]
    Name(io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration for the control server.
#[derive(Debug, Clone)]
pub struct IpcServerConfig {
    /// Maximum accepted frame size in bytes.
    pub max_frame_size: usize,
}

impl Default for IpcServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: super::protocol::MAX_MESSAGE_SIZE,
        }
    }
}

/// Resolve a socket path string into a local-socket name.
pub fn socket_name(path: &str) -> Result<interprocess::local_socket::Name<'_>, ServerError> {
    #[cfg(windows)]
    {
        use interprocess::local_socket::{GenericNamespaced, ToNsName};
        path.to_ns_name::<GenericNamespaced>().map_err(ServerError::Name)
    }
    #[cfg(not(windows))]
    {
        use interprocess::local_socket::{GenericFilePath, ToFsName};
        path.to_fs_name::<GenericFilePath>().map_err(ServerError::Name)
    }
}

/// Read one length-prefixed frame, rejecting oversized lengths before
/// allocating.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_size: usize,
) -> io::Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit {max_frame_size}"),
        ));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(&(bytes.len() as u32).to_le_bytes()).await?;
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Run the control server until the task is cancelled.
pub async fn run(
    socket_path: &str,
    handler: Arc<ControlHandler>,
    server_config: IpcServerConfig,
    connection_config: ConnectionConfig,
) -> Result<(), ServerError> {
    let name = socket_name(socket_path)?;
    let listener = ListenerOptions::new()
        .name(name)
        .create_tokio()
        .map_err(|source| ServerError::Bind {
            path: socket_path.to_string(),
            source,
        })?;
    let pool = Arc::new(ConnectionPool::new(connection_config));
    tracing::info!(path = socket_path, "control server listening");

    loop {
        let conn = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        let Some(guard) = pool.try_acquire() else {
            tracing::warn!(
                max = pool.max_connections(),
                "connection limit reached, dropping controller"
            );
            continue;
        };

        let handler = Arc::clone(&handler);
        let max_frame = server_config.max_frame_size;
        tokio::spawn(async move {
            // The guard frees the connection slot when the task ends.
            let _slot = guard;
            if let Err(e) = serve_connection(conn, handler, max_frame).await {
                tracing::warn!(error = %e, "connection closed with error");
            }
        });
    }
}

async fn serve_connection(
    mut conn: impl AsyncReadExt + AsyncWriteExt + Unpin,
    handler: Arc<ControlHandler>,
    max_frame_size: usize,
) -> Result<(), ServerError> {
    while let Some(frame) = read_frame(&mut conn, max_frame_size).await? {
        let response = handler
            .process(&frame)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        write_frame(&mut conn, &response).await?;
    }
    Ok(())
}
