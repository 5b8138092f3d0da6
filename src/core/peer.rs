//! UDP protocol spoken between market nodes.
//!
//! Every datagram is a single space-separated ASCII line and gets exactly one
//! reply datagram back:
//!
//! ```text
//! LIST_AVAILABILITY <type>
//! CHECK_SWAP_AVAILABILITY <shareId> <type> <count>
//! EXECUTE_SWAP <buyerId> <oldShareId> <oldType> <newShareId> <newType> <count>
//! ```

use crate::core::ledger::{Ledger, SwapCheck};
use crate::domain::model::{ShareKey, ShareType};
use crate::utils::error::{MarketError, Result};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

pub const MAX_DATAGRAM: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRequest {
    ListAvailability {
        share_type: String,
    },
    CheckSwapAvailability {
        share_id: String,
        share_type: String,
        count: u32,
    },
    ExecuteSwap {
        buyer_id: String,
        old_share_id: String,
        old_share_type: String,
        new_share_id: String,
        new_share_type: String,
        count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerReply {
    Listing(String),
    Available(String),
    NotAvailable(String),
    Success(String),
    Failed(String),
    InvalidFormat,
    InvalidRequest,
}

impl PeerRequest {
    pub fn encode(&self) -> String {
        match self {
            PeerRequest::ListAvailability { share_type } => {
                format!("LIST_AVAILABILITY {}", share_type)
            }
            PeerRequest::CheckSwapAvailability {
                share_id,
                share_type,
                count,
            } => format!("CHECK_SWAP_AVAILABILITY {} {} {}", share_id, share_type, count),
            PeerRequest::ExecuteSwap {
                buyer_id,
                old_share_id,
                old_share_type,
                new_share_id,
                new_share_type,
                count,
            } => format!(
                "EXECUTE_SWAP {} {} {} {} {} {}",
                buyer_id, old_share_id, old_share_type, new_share_id, new_share_type, count
            ),
        }
    }

    /// On failure the error is the reply to send back.
    pub fn parse(message: &str) -> std::result::Result<Self, PeerReply> {
        let parts: Vec<&str> = message.split_whitespace().collect();
        let count = |raw: &str| match raw.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(PeerReply::InvalidFormat),
        };

        match parts.first().copied() {
            Some("LIST_AVAILABILITY") => match parts.as_slice() {
                [_, share_type, ..] => Ok(PeerRequest::ListAvailability {
                    share_type: share_type.to_string(),
                }),
                _ => Err(PeerReply::InvalidFormat),
            },
            Some("CHECK_SWAP_AVAILABILITY") => match parts.as_slice() {
                [_, share_id, share_type, n, ..] => Ok(PeerRequest::CheckSwapAvailability {
                    share_id: share_id.to_string(),
                    share_type: share_type.to_string(),
                    count: count(*n)?,
                }),
                _ => Err(PeerReply::InvalidFormat),
            },
            Some("EXECUTE_SWAP") => match parts.as_slice() {
                [_, buyer_id, old_id, old_type, new_id, new_type, n, ..] => {
                    Ok(PeerRequest::ExecuteSwap {
                        buyer_id: buyer_id.to_string(),
                        old_share_id: old_id.to_string(),
                        old_share_type: old_type.to_string(),
                        new_share_id: new_id.to_string(),
                        new_share_type: new_type.to_string(),
                        count: count(*n)?,
                    })
                }
                _ => Err(PeerReply::InvalidFormat),
            },
            _ => Err(PeerReply::InvalidRequest),
        }
    }
}

impl PeerReply {
    pub fn encode(&self) -> String {
        match self {
            PeerReply::Listing(text) => text.clone(),
            PeerReply::Available(detail) => format!("AVAILABLE:{}", detail),
            PeerReply::NotAvailable(reason) => format!("NOT_AVAILABLE:{}", reason),
            PeerReply::Success(detail) => format!("SUCCESS:{}", detail),
            PeerReply::Failed(reason) => format!("FAILED:{}", reason),
            PeerReply::InvalidFormat => "INVALID_REQUEST_FORMAT".to_string(),
            PeerReply::InvalidRequest => "INVALID_REQUEST".to_string(),
        }
    }

    pub fn decode(message: &str) -> Self {
        let message = message.trim();
        if let Some(rest) = message.strip_prefix("NOT_AVAILABLE:") {
            PeerReply::NotAvailable(rest.to_string())
        } else if let Some(rest) = message.strip_prefix("AVAILABLE:") {
            PeerReply::Available(rest.to_string())
        } else if let Some(rest) = message.strip_prefix("SUCCESS:") {
            PeerReply::Success(rest.to_string())
        } else if let Some(rest) = message.strip_prefix("FAILED:") {
            PeerReply::Failed(rest.to_string())
        } else if message == "INVALID_REQUEST_FORMAT" {
            PeerReply::InvalidFormat
        } else if message == "INVALID_REQUEST" {
            PeerReply::InvalidRequest
        } else {
            PeerReply::Listing(message.to_string())
        }
    }
}

/// Answers a peer request against the local ledger.
pub fn handle_request(ledger: &mut Ledger, request: &PeerRequest) -> PeerReply {
    match request {
        PeerRequest::ListAvailability { share_type } => {
            let lines: Vec<String> = share_type
                .parse::<ShareType>()
                .map(|t| {
                    ledger
                        .listings(t)
                        .map(|s| {
                            format!(
                                "Share: {}, Type: {}, Available: {}",
                                s.share_id, s.share_type, s.available
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            PeerReply::Listing(lines.join("\n"))
        }
        PeerRequest::CheckSwapAvailability {
            share_id,
            share_type,
            count,
        } => {
            let Ok(share_type) = share_type.parse::<ShareType>() else {
                return PeerReply::NotAvailable("Share not found".to_string());
            };
            match ledger.check_swap(&ShareKey::new(share_type, share_id.as_str()), *count) {
                SwapCheck::Available => {
                    PeerReply::Available("Share available for swap".to_string())
                }
                SwapCheck::NotFound => PeerReply::NotAvailable("Share not found".to_string()),
                SwapCheck::Short {
                    required,
                    available,
                } => PeerReply::NotAvailable(format!(
                    "Not enough shares available. Required: {}, Available: {}",
                    required, available
                )),
            }
        }
        PeerRequest::ExecuteSwap {
            buyer_id,
            new_share_id,
            new_share_type,
            count,
            ..
        } => {
            let Ok(share_type) = new_share_type.parse::<ShareType>() else {
                return PeerReply::Failed("New share not found".to_string());
            };
            let key = ShareKey::new(share_type, new_share_id.as_str());
            match ledger.accept_swap(buyer_id, &key, *count) {
                SwapCheck::Available => {
                    tracing::info!(
                        "Swap executed: buyer {} acquired {} shares of {}",
                        buyer_id,
                        count,
                        key
                    );
                    PeerReply::Success(format!("Swapped {} shares of {}", count, key))
                }
                SwapCheck::NotFound => PeerReply::Failed("New share not found".to_string()),
                SwapCheck::Short { .. } => {
                    PeerReply::Failed("Not enough new shares available".to_string())
                }
            }
        }
    }
}

pub struct PeerListener {
    socket: UdpSocket,
    ledger: Arc<Mutex<Ledger>>,
}

impl PeerListener {
    pub async fn bind(addr: SocketAddr, ledger: Arc<Mutex<Ledger>>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, ledger))
    }

    pub fn from_socket(socket: UdpSocket, ledger: Arc<Mutex<Ledger>>) -> Self {
        Self { socket, ledger }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn serve(self) -> Result<()> {
        let mut buffer = vec![0u8; MAX_DATAGRAM];
        tracing::info!("UDP peer listener running on {}", self.local_addr()?);

        loop {
            let (len, from) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    // ICMP port-unreachable from a stale peer surfaces here on some platforms.
                    tracing::warn!("UDP receive failed: {}", e);
                    continue;
                }
            };

            let message = String::from_utf8_lossy(&buffer[..len]).into_owned();
            tracing::debug!("Peer request from {}: {}", from, message);

            let reply = match PeerRequest::parse(&message) {
                Ok(request) => {
                    let mut ledger = self.ledger.lock().await;
                    handle_request(&mut ledger, &request)
                }
                Err(reply) => reply,
            };

            if let Err(e) = self.socket.send_to(reply.encode().as_bytes(), from).await {
                tracing::warn!("Failed to answer peer {}: {}", from, e);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub name: String,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct PeerClient {
    timeout: Duration,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn request(&self, peer: &Peer, request: &PeerRequest) -> Result<PeerReply> {
        let local: SocketAddr = if peer.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        let message = request.encode();
        if message.len() > MAX_DATAGRAM {
            return Err(MarketError::protocol(format!(
                "request of {} bytes exceeds the datagram limit",
                message.len()
            )));
        }

        socket.send_to(message.as_bytes(), peer.addr).await?;

        let mut buffer = vec![0u8; MAX_DATAGRAM];
        let deadline = tokio::time::Instant::now() + self.timeout;
        let len = loop {
            let (len, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buffer))
                .await
                .map_err(|_| MarketError::PeerTimeout {
                    peer: peer.name.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })??;
            if from == peer.addr {
                break len;
            }
            tracing::warn!("Ignoring datagram from {} while waiting for {}", from, peer.name);
        };

        let reply = String::from_utf8_lossy(&buffer[..len]);
        tracing::debug!("Peer {} replied: {}", peer.name, reply);
        Ok(PeerReply::decode(&reply))
    }
}
