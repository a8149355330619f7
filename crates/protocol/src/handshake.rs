//! Control-channel handshake record.
//!
//! The client opens the control connection by sending one JSON line that
//! tells the server where to deliver datagrams and how large they may be.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProtocolError, Result};

/// Largest payload a single UDP datagram over IPv4 can carry.
pub const MAX_CHUNK_SIZE: usize = 65_507;

/// Chunk size used by clients that do not pick one.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Connection parameters announced by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Unique token for this session.
    pub id: Uuid,
    /// Address the client receives datagrams on.
    pub client_address: IpAddr,
    /// Local port of the client's control connection.
    pub client_tcp_port: u16,
    /// Port of the client's datagram socket.
    pub client_udp_port: u16,
    /// Maximum payload per datagram.
    pub chunk_size: usize,
}

impl SessionInfo {
    /// Create a handshake record with a fresh session id.
    pub fn new(
        client_address: IpAddr,
        client_tcp_port: u16,
        client_udp_port: u16,
        chunk_size: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_address,
            client_tcp_port,
            client_udp_port,
            chunk_size,
        }
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a handshake line.
    pub fn from_json(line: &str) -> Result<Self> {
        let info: SessionInfo = serde_json::from_str(line.trim())
            .map_err(|e| ProtocolError::InvalidHandshake(e.to_string()))?;
        info.validate()?;
        Ok(info)
    }

    /// Check that the announced parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ProtocolError::InvalidHandshake(format!(
                "chunk size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        if self.client_udp_port == 0 {
            return Err(ProtocolError::InvalidHandshake(
                "client udp port must not be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Where datagrams for this session go.
    ///
    /// An unspecified client address is replaced by `fallback`, normally the
    /// peer address of the control connection.
    pub fn datagram_endpoint(&self, fallback: IpAddr) -> SocketAddr {
        let ip = if self.client_address.is_unspecified() {
            fallback
        } else {
            self.client_address
        };
        SocketAddr::new(ip, self.client_udp_port)
    }

    /// Acknowledgement line echoed back by the server.
    pub fn acknowledgement(&self) -> String {
        format!(
            "Session establishing: address {}, tcp port {}, udp port {}, uuid {}",
            self.client_address, self.client_tcp_port, self.client_udp_port, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample() -> SessionInfo {
        SessionInfo::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50123, 50124, 32768)
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"clientAddress\":\"127.0.0.1\""));
        assert!(json.contains("\"clientTcpPort\":50123"));
        assert!(json.contains("\"clientUdpPort\":50124"));
        assert!(json.contains("\"chunkSize\":32768"));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_parse_handwritten_line() {
        let line = r#"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","clientAddress":"10.0.0.7","clientTcpPort":4000,"clientUdpPort":4001,"chunkSize":1024}"#;
        let info = SessionInfo::from_json(line).unwrap();
        assert_eq!(info.client_address, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(info.client_udp_port, 4001);
        assert_eq!(info.chunk_size, 1024);
        assert_eq!(
            info.id.to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let line = format!("  {}\r\n", sample().to_json().unwrap());
        assert_eq!(SessionInfo::from_json(&line).unwrap(), sample());
    }

    #[test]
    fn test_rejects_garbage() {
        let result = SessionInfo::from_json("hello");
        assert!(matches!(result, Err(ProtocolError::InvalidHandshake(_))));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let mut info = sample();
        info.chunk_size = 0;
        let result = SessionInfo::from_json(&info.to_json().unwrap());
        assert!(matches!(result, Err(ProtocolError::InvalidHandshake(_))));
    }

    #[test]
    fn test_rejects_oversized_chunk() {
        let mut info = sample();
        info.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(info.validate().is_err());

        info.chunk_size = MAX_CHUNK_SIZE;
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_datagram_endpoint_uses_announced_address() {
        let fallback = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9));
        assert_eq!(
            sample().datagram_endpoint(fallback),
            "127.0.0.1:50124".parse().unwrap()
        );
    }

    #[test]
    fn test_datagram_endpoint_falls_back_for_unspecified() {
        let mut info = sample();
        info.client_address = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let fallback = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9));
        assert_eq!(
            info.datagram_endpoint(fallback),
            "192.168.1.9:50124".parse().unwrap()
        );
    }

    #[test]
    fn test_acknowledgement() {
        let info = sample();
        assert_eq!(
            info.acknowledgement(),
            format!(
                "Session establishing: address 127.0.0.1, tcp port 50123, udp port 50124, uuid {}",
                info.id
            )
        );
    }
}
