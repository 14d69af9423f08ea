//! Typed client — one connection, one order, one answer.
//!
//! Connects to the master's Unix socket, writes a wire order, reads the
//! answer, then signals handoff completion before closing, per the gate
//! discipline. Each method is a full transaction; the master serializes
//! concurrent callers.

use std::path::PathBuf;

use tokio::net::UnixStream;
use tracing::debug;

use bramble_proto::{self as proto, Answer, Order, ProtoError};

use crate::gate::{self, GateError};

/// Errors from the client side of a transaction.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("master is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("failed to connect to master socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("wire protocol error: {0}")]
    Proto(#[from] ProtoError),

    #[error("handoff error: {0}")]
    Gate(#[from] GateError),

    #[error("answer {0:?} does not match the order sent")]
    UnexpectedAnswer(Answer),
}

/// Client for one-shot transactions against a running master.
pub struct MasterClient {
    socket_path: PathBuf,
}

impl MasterClient {
    /// Create a client targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Check if the master socket exists (master is likely running).
    pub fn master_available(&self) -> bool {
        self.socket_path.exists()
    }

    /// Run one full order/answer transaction.
    async fn transact(&self, order: &Order) -> Result<Answer, ClientError> {
        if !self.master_available() {
            return Err(ClientError::NotRunning(self.socket_path.clone()));
        }

        let stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| ClientError::Connect {
                    path: self.socket_path.clone(),
                    source: e,
                })?;
        let (mut reader, mut writer) = stream.into_split();

        debug!(?order, "sending order");
        proto::write_order(&mut writer, order).await?;
        let answer = proto::read_answer(&mut reader).await?;
        debug!(?answer, "answer received");

        // Only after the answer is fully consumed may the master close its
        // end; both our halves close on drop after this.
        gate::signal_handoff(&mut writer).await?;
        Ok(answer)
    }

    // ── Typed orders ───────────────────────────────────────────────────

    /// Stop the master and tear down the whole tree.
    pub async fn stop(&self) -> Result<(), ClientError> {
        match self.transact(&Order::Stop).await? {
            Answer::StopOk => Ok(()),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Total and distinct cardinality of the multiset.
    pub async fn how_many(&self) -> Result<(u32, u32), ClientError> {
        match self.transact(&Order::HowMany).await? {
            Answer::HowMany { total, distinct } => Ok((total, distinct)),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Smallest value, or `None` on an empty set.
    pub async fn min(&self) -> Result<Option<f32>, ClientError> {
        match self.transact(&Order::Min).await? {
            Answer::Min { element } => Ok(Some(element)),
            Answer::MinEmpty => Ok(None),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Largest value, or `None` on an empty set.
    pub async fn max(&self) -> Result<Option<f32>, ClientError> {
        match self.transact(&Order::Max).await? {
            Answer::Max { element } => Ok(Some(element)),
            Answer::MaxEmpty => Ok(None),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Copy count of `element` if present.
    pub async fn exist(&self, element: f32) -> Result<Option<u32>, ClientError> {
        match self.transact(&Order::Exist { element }).await? {
            Answer::ExistYes { count } => Ok(Some(count)),
            Answer::ExistNo => Ok(None),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Sum of all values, duplicates counted.
    pub async fn sum(&self) -> Result<f32, ClientError> {
        match self.transact(&Order::Sum).await? {
            Answer::Sum { total } => Ok(total),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Insert one element.
    pub async fn insert(&self, element: f32) -> Result<(), ClientError> {
        match self.transact(&Order::Insert { element }).await? {
            Answer::InsertOk => Ok(()),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Insert a batch of elements in one transaction.
    pub async fn insert_many(&self, elements: Vec<f32>) -> Result<(), ClientError> {
        match self.transact(&Order::InsertMany { elements }).await? {
            Answer::InsertManyOk => Ok(()),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }

    /// Ask the master to log the whole tree post-order.
    pub async fn print(&self) -> Result<(), ClientError> {
        match self.transact(&Order::Print).await? {
            Answer::PrintOk => Ok(()),
            other => Err(ClientError::UnexpectedAnswer(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = MasterClient::new("/tmp/nonexistent-bramble.sock");
        assert!(!client.master_available());
    }

    #[tokio::test]
    async fn test_client_not_running_error() {
        let client = MasterClient::new("/tmp/nonexistent-bramble.sock");
        let result = client.how_many().await;
        assert!(matches!(result, Err(ClientError::NotRunning(_))));
    }
}
