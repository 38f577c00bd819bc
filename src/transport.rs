//! UDP transport towards the blimp
//!
//! One unconnected datagram socket, one fixed target. Sends are
//! fire-and-forget: the control link is open-loop and dropped frames are
//! replaced by the next tick anyway. Only a local network-stack rejection is
//! surfaced, and the caller treats that as fatal since transmitting frames is
//! the entire point of the process.

use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info, warn};

// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind local socket: {0}")]
    BindError(String),

    #[error("Failed to resolve target address: {0}")]
    InvalidTarget(String),

    #[error("Failed to send frame: {0}")]
    SendError(String),
}

/// Fire-and-forget publisher for serialized control frames
#[derive(Debug)]
pub struct BlimpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl BlimpTransport {
    /// Binds a local socket and resolves the target endpoint once
    pub async fn bind(host: &str, port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| TransportError::BindError(e.to_string()))?;

        let target = lookup_host((host, port))
            .await
            .map_err(|e| TransportError::InvalidTarget(e.to_string()))?
            .next()
            .ok_or_else(|| {
                TransportError::InvalidTarget(format!("No address found for {}:{}", host, port))
            })?;

        info!("Publishing control frames to {}", target);
        Ok(Self { socket, target })
    }

    /// Sends one frame to the target; no retry, no delivery guarantee
    pub async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let sent = self
            .socket
            .send_to(frame, self.target)
            .await
            .map_err(|e| TransportError::SendError(e.to_string()))?;

        if sent != frame.len() {
            warn!("Truncated send: {} of {} bytes", sent, frame.len());
        } else {
            debug!("Sent {} byte frame to {}", sent, self.target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_frame_bytes_to_the_target() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let transport = BlimpTransport::bind("127.0.0.1", port).await.unwrap();
        transport.send(b"JJBA-test-frame").await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"JJBA-test-frame");
    }

    #[tokio::test]
    async fn unresolvable_target_is_a_construction_error() {
        let result = BlimpTransport::bind("definitely-not-a-host.invalid", 2222).await;
        assert!(matches!(result, Err(TransportError::InvalidTarget(_))));
    }
}
