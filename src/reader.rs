//! Port Reader: reads bytes from a serial endpoint, timestamps them,
//! optionally forwards to a peer endpoint, and hands them to its
//! aggregator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::time::Instant;

use crate::aggregator::DataRead;
use crate::io::SerialEndpoint;

const READ_CHUNK: usize = 16;

pub struct PortReader {
    endpoint: Arc<dyn SerialEndpoint>,
    /// The peer endpoint to forward onto in MITM mode, if forwarding is
    /// enabled. `None` in single-port mode or with `--no-forwarding`.
    peer: Option<Arc<dyn SerialEndpoint>>,
    tx: SyncSender<DataRead>,
    shutdown: Arc<AtomicBool>,
}

impl PortReader {
    pub fn new(
        endpoint: Arc<dyn SerialEndpoint>,
        peer: Option<Arc<dyn SerialEndpoint>>,
        tx: SyncSender<DataRead>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            endpoint,
            peer,
            tx,
            shutdown,
        }
    }

    /// Runs until shutdown is observed or a fatal I/O error occurs, in
    /// which case it sets shutdown itself before returning so the rest
    /// of the pipeline tears down. Dropping `self.tx` on return is what
    /// lets this reader's Aggregator notice the channel close and flush.
    pub fn run(self) {
        while !self.shutdown.load(Ordering::Acquire) {
            let chunk = match self.endpoint.read(READ_CHUNK) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::error!(port = self.endpoint.name(), error = %e, "read failed, shutting down");
                    self.shutdown.store(true, Ordering::Release);
                    break;
                }
            };
            if chunk.is_empty() {
                continue;
            }
            let t = Instant::now();

            if let Some(peer) = &self.peer {
                if let Err(e) = peer.write(&chunk) {
                    tracing::error!(
                        port = peer.name(),
                        error = %e,
                        "forward write failed, shutting down"
                    );
                    self.shutdown.store(true, Ordering::Release);
                    // The bytes were already read off the wire: still
                    // hand them to the aggregator so the audit trail
                    // covers what was physically received, even though
                    // the forward to the peer failed.
                    let _ = self.tx.send(DataRead::new(t, chunk));
                    break;
                }
            }

            if self.tx.send(DataRead::new(t, chunk)).is_err() {
                // Aggregator side gone; nothing left to do.
                break;
            }
        }
    }
}
