//! Datagram collector.
//!
//! Receives relayed submissions, decodes them and appends them to the
//! persisted log. Each datagram is handled to completion before the next one
//! is received.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::{self, DecodeError};
use crate::shutdown::Shutdown;
use crate::store::{LogEntry, LogStore};

/// Largest datagram read in one receive; longer payloads are truncated.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// What happened to one datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The record was appended; the log now holds `entries` entries.
    Stored {
        /// Number of entries in the log after the append.
        entries: usize,
    },
    /// The payload could not be decoded and was dropped.
    Rejected(DecodeError),
}

/// Receives submissions on a UDP socket and persists them.
#[derive(Debug)]
pub struct Collector {
    socket: UdpSocket,
    store: LogStore,
    echo: bool,
}

impl Collector {
    /// Bind the collector socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, store: LogStore, echo: bool) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| Error::Bind {
            component: "collector",
            addr,
            source,
        })?;
        Ok(Self {
            socket,
            store,
            echo,
        })
    }

    /// Bind the collector using the relay address and storage settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay address is invalid or cannot be bound.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = LogStore::new(&config.storage.dir, &config.storage.file);
        Self::bind(config.relay_addr()?, store, config.collector.echo).await
    }

    /// Get the address the collector is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Get the store submissions are written to.
    #[must_use]
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Receive and process datagrams until `shutdown` is triggered.
    ///
    /// Per-datagram failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that make further appends unsafe,
    /// such as a corrupted persisted log.
    pub async fn run(self, shutdown: Shutdown) -> Result<()> {
        info!(
            "Collector listening on {}, persisting to {}",
            self.local_addr()?,
            self.store.path().display()
        );

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            let received = tokio::select! {
                () = shutdown.wait() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, from) = match received {
                Ok(received) => received,
                Err(source) => {
                    error!("{}", Error::Receive(source));
                    continue;
                }
            };

            match self.handle(&buf[..len], from).await {
                Ok(Outcome::Stored { entries }) => {
                    info!("Stored submission from {from} ({entries} entries)");
                }
                Ok(Outcome::Rejected(err)) => {
                    error!("Dropped submission from {from}: {err}");
                }
                Err(err) if err.is_fatal() => {
                    error!("Collector stopping: {err}");
                    return Err(err);
                }
                Err(err) => error!("Failed to store submission from {from}: {err}"),
            }
        }

        info!("Collector interrupted, shutting down");
        Ok(())
    }

    /// Process one datagram: echo, decode, append.
    ///
    /// # Errors
    ///
    /// Returns an error if the decoded record could not be persisted.
    pub async fn handle(&self, payload: &[u8], from: SocketAddr) -> Result<Outcome> {
        debug!(
            "Received data: {} from: {from}",
            String::from_utf8_lossy(payload)
        );

        if self.echo {
            match self.socket.send_to(payload, from).await {
                Ok(_) => debug!("Echoed {} bytes to {from}", payload.len()),
                Err(err) => warn!("Failed to echo datagram to {from}: {err}"),
            }
        }

        let record = match record::decode(payload) {
            Ok(record) => record,
            Err(err) => return Ok(Outcome::Rejected(err)),
        };

        let store = self.store.clone();
        let entry = LogEntry::now(record);
        let entries = tokio::task::spawn_blocking(move || store.append(entry))
            .await
            .map_err(|err| Error::internal(format!("storage task failed: {err}")))??;

        Ok(Outcome::Stored { entries })
    }
}
