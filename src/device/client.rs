use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::device::protocol::{
    self, CMD_ACK_OK, CMD_ATTLOG_RRQ, CMD_CLEAR_ATTLOG, CMD_CONNECT, CMD_DATA, CMD_EXIT,
    CMD_FREE_DATA, CMD_PREPARE_DATA, Packet, ProtocolError, PunchRecord,
};

const MAX_DATAGRAM: usize = 4096;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("device did not answer within {0:?}")]
    Timeout(Duration),
    #[error("device rejected command, reply {0}")]
    Rejected(u16),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("not connected")]
    NotConnected,
}

/// Seam for the vendor terminal so attendance sync can be exercised without
/// hardware.
#[async_trait]
pub trait AttendanceDevice {
    async fn connect(&mut self) -> Result<(), DeviceError>;
    async fn get_attendance(&mut self) -> Result<Vec<PunchRecord>, DeviceError>;
    async fn clear_attendance(&mut self) -> Result<(), DeviceError>;
    async fn disconnect(&mut self) -> Result<(), DeviceError>;
}

/// UDP client for the terminal. One client per sync run; the protocol is
/// strictly request/reply with a per-command reply counter.
pub struct UdpDeviceClient {
    addr: String,
    timeout: Duration,
    socket: Option<UdpSocket>,
    session_id: u16,
    reply_id: u16,
}

impl UdpDeviceClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            socket: None,
            session_id: 0,
            reply_id: 0,
        }
    }

    async fn exchange(&mut self, command: u16, payload: &[u8]) -> Result<Packet, DeviceError> {
        self.reply_id = self.reply_id.wrapping_add(1);
        let datagram = protocol::encode(command, self.session_id, self.reply_id, payload);

        let socket = self.socket.as_ref().ok_or(DeviceError::NotConnected)?;
        socket.send(&datagram).await?;

        self.receive().await
    }

    async fn receive(&self) -> Result<Packet, DeviceError> {
        let socket = self.socket.as_ref().ok_or(DeviceError::NotConnected)?;

        let mut buf = [0u8; MAX_DATAGRAM];
        let len = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| DeviceError::Timeout(self.timeout))??;

        Ok(protocol::decode(&buf[..len])?)
    }
}

#[async_trait]
impl AttendanceDevice for UdpDeviceClient {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&self.addr).await?;
        self.socket = Some(socket);
        self.session_id = 0;
        self.reply_id = 0;

        let reply = self.exchange(CMD_CONNECT, &[]).await?;
        if reply.command != CMD_ACK_OK {
            return Err(DeviceError::Rejected(reply.command));
        }

        // the handshake reply carries the session id for the rest of the run
        self.session_id = reply.session_id;
        debug!(addr = %self.addr, session = self.session_id, "device session opened");
        Ok(())
    }

    async fn get_attendance(&mut self) -> Result<Vec<PunchRecord>, DeviceError> {
        let reply = self.exchange(CMD_ATTLOG_RRQ, &[]).await?;

        let data = match reply.command {
            // no logs on the terminal
            CMD_ACK_OK if reply.payload.is_empty() => return Ok(Vec::new()),
            // small logs arrive inline
            CMD_DATA => reply.payload,
            // large logs are announced first, then streamed in CMD_DATA chunks
            CMD_PREPARE_DATA => {
                if reply.payload.len() < 4 {
                    return Err(ProtocolError::Truncated(reply.payload.len()).into());
                }
                let total = u32::from_le_bytes([
                    reply.payload[0],
                    reply.payload[1],
                    reply.payload[2],
                    reply.payload[3],
                ]) as usize;

                let mut data = Vec::with_capacity(total);
                while data.len() < total {
                    let chunk = self.receive().await?;
                    match chunk.command {
                        CMD_DATA => data.extend_from_slice(&chunk.payload),
                        CMD_ACK_OK => break,
                        other => return Err(DeviceError::Rejected(other)),
                    }
                }

                // release the device-side read buffer; reply is best-effort
                let _ = self.exchange(CMD_FREE_DATA, &[]).await;
                data
            }
            other => return Err(DeviceError::Rejected(other)),
        };

        let records = protocol::parse_attlog(&data)?;
        info!(count = records.len(), "attendance records fetched");
        Ok(records)
    }

    async fn clear_attendance(&mut self) -> Result<(), DeviceError> {
        let reply = self.exchange(CMD_CLEAR_ATTLOG, &[]).await?;
        if reply.command != CMD_ACK_OK {
            return Err(DeviceError::Rejected(reply.command));
        }
        info!("device attendance log cleared");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        if self.socket.is_some() {
            // device may drop the session without acking; ignore the reply
            let _ = self.exchange(CMD_EXIT, &[]).await;
        }
        self.socket = None;
        self.session_id = 0;
        Ok(())
    }
}
