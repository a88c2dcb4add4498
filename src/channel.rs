//! Socket setup shared by the vision and command channels.

use std::net::{SocketAddrV4, UdpSocket};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BindError {
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("failed to bind {address}")]
    Io {
        address: SocketAddrV4,
        #[source]
        source: std::io::Error,
    },
}

/// Binds a non-blocking UDP socket.
pub fn bind_nonblocking(address: SocketAddrV4) -> Result<UdpSocket, BindError> {
    let io_error = |source| BindError::Io { address, source };
    let socket = UdpSocket::bind(address).map_err(io_error)?;
    socket.set_nonblocking(true).map_err(io_error)?;
    Ok(socket)
}
