//! Transaction gate — serializes clients and orders connection teardown.
//!
//! Two mechanisms, mirroring the two semaphores of the turnstile/handoff
//! pattern:
//!
//! - The **turnstile** is a single-permit semaphore held for the whole of
//!   one client transaction, so exactly one client transacts at a time no
//!   matter how eagerly connections are accepted.
//! - The **handoff** is an explicit completion byte the client writes after
//!   it has fully consumed the answer. The master blocks on that byte before
//!   closing its end, and the client closes its ends only after writing it,
//!   so neither side ever closes a channel the other is still reading.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use bramble_proto::HANDOFF_DONE;

/// Errors from the handoff exchange.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("IO error during handoff: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad handoff byte {0:#04x}")]
    BadHandoff(u8),
}

/// Single-permit turnstile admitting one client transaction at a time.
#[derive(Debug, Clone)]
pub struct TransactionGate {
    turnstile: Arc<Semaphore>,
}

impl TransactionGate {
    pub fn new() -> Self {
        Self {
            turnstile: Arc::new(Semaphore::new(1)),
        }
    }

    /// Block until the turnstile is free, returning a permit that readmits
    /// the next client when dropped.
    pub async fn admit(&self) -> TransactionPermit {
        // The semaphore is never closed, so acquisition cannot fail.
        let permit = Arc::clone(&self.turnstile)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("turnstile semaphore closed"));
        TransactionPermit { _permit: permit }
    }
}

impl Default for TransactionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to run one transaction; dropping it reopens the turnstile.
#[derive(Debug)]
pub struct TransactionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Master side: block until the client confirms it has consumed the answer.
pub async fn await_handoff<R>(reader: &mut R) -> Result<(), GateError>
where
    R: AsyncRead + Unpin,
{
    let byte = reader.read_u8().await?;
    if byte != HANDOFF_DONE {
        return Err(GateError::BadHandoff(byte));
    }
    Ok(())
}

/// Client side: confirm the answer has been fully consumed.
pub async fn signal_handoff<W>(writer: &mut W) -> Result<(), GateError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u8(HANDOFF_DONE).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handoff_roundtrip() {
        let (mut client, mut master) = tokio::io::duplex(8);
        signal_handoff(&mut client).await.unwrap();
        await_handoff(&mut master).await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_byte_rejected() {
        let (mut client, mut master) = tokio::io::duplex(8);
        client.write_u8(0xFF).await.unwrap();
        let err = await_handoff(&mut master).await.unwrap_err();
        assert!(matches!(err, GateError::BadHandoff(0xFF)));
    }

    #[tokio::test]
    async fn test_peer_closure_is_io_error() {
        let (client, mut master) = tokio::io::duplex(8);
        drop(client);
        let err = await_handoff(&mut master).await.unwrap_err();
        assert!(matches!(err, GateError::Io(_)));
    }

    #[tokio::test]
    async fn test_turnstile_admits_one_at_a_time() {
        let gate = TransactionGate::new();
        let first = gate.admit().await;

        // A second admission must not complete while the first permit lives.
        let second = tokio::time::timeout(std::time::Duration::from_millis(50), gate.admit()).await;
        assert!(second.is_err());

        drop(first);
        let _third = gate.admit().await;
    }
}
