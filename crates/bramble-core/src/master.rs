//! Master daemon — socket lifecycle and the serialized transaction loop.
//!
//! The master is the single entry point to the tree. It binds the Unix
//! socket at startup (failing if the path is already taken), then loops:
//! admit one client through the gate, read one order, dispatch to the tree,
//! write the answer, await the handoff byte, close the connection. A Stop
//! order tears the tree down, answers the client, removes the socket, and
//! ends the loop.

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use bramble_config::AppConfig;
use bramble_proto::{self as proto, Answer, Order, ProtoError};

use crate::gate::{self, GateError, TransactionGate};
use crate::node::{NodeAnswer, NodeError};
use crate::tree::Tree;

/// Errors from the master runtime.
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("socket path {0} already exists; is another master running?")]
    SocketInUse(PathBuf),

    #[error("failed to bind socket: {0}")]
    Bind(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire protocol error: {0}")]
    Proto(#[from] ProtoError),

    #[error("handoff error: {0}")]
    Gate(#[from] GateError),

    #[error("tree link error: {0}")]
    Tree(#[from] NodeError),
}

/// Mapping from the worker answer space to the client answer space.
///
/// The two spaces are deliberately separate; this table is the only place
/// they meet. Every worker answer has exactly one client counterpart, so a
/// reordering of either space breaks here, visibly, instead of corrupting
/// payloads downstream.
fn translate(answer: NodeAnswer) -> Answer {
    match answer {
        NodeAnswer::HowMany { total, distinct } => Answer::HowMany { total, distinct },
        NodeAnswer::Min { element } => Answer::Min { element },
        NodeAnswer::Max { element } => Answer::Max { element },
        NodeAnswer::ExistYes { count } => Answer::ExistYes { count },
        NodeAnswer::ExistNo => Answer::ExistNo,
        NodeAnswer::Sum { total } => Answer::Sum { total },
        NodeAnswer::Inserted => Answer::InsertOk,
        NodeAnswer::Printed => Answer::PrintOk,
    }
}

/// The long-lived master daemon.
pub struct Master {
    config: AppConfig,
    tree: Tree,
    gate: TransactionGate,
}

impl Master {
    /// Create a master with an empty tree.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            tree: Tree::new(),
            gate: TransactionGate::new(),
        }
    }

    /// Run until a Stop order is served. Creates the socket on entry and
    /// removes it on exit.
    pub async fn run(mut self) -> Result<(), MasterError> {
        let socket_path = PathBuf::from(&self.config.daemon.socket_path);
        let listener = bind_socket(&socket_path)?;
        info!(path = %socket_path.display(), "master listening");

        let result = self.serve(&listener).await;

        // Best-effort removal even when the loop errored out.
        std::fs::remove_file(&socket_path).ok();
        info!(path = %socket_path.display(), "master terminated, socket removed");
        result
    }

    async fn serve(&mut self, listener: &UnixListener) -> Result<(), MasterError> {
        loop {
            let permit = self.gate.admit().await;
            let (stream, _) = listener.accept().await?;
            let stop = self.transact(stream).await?;
            drop(permit);
            if stop {
                return Ok(());
            }
        }
    }

    /// Serve exactly one client transaction. Returns true when the order was
    /// Stop and the loop must end.
    async fn transact(&mut self, stream: UnixStream) -> Result<bool, MasterError> {
        let (mut reader, mut writer) = stream.into_split();

        let order = proto::read_order(&mut reader).await?;
        debug!(?order, "order received");

        let stop = matches!(order, Order::Stop);
        let answer = self.dispatch(order).await?;

        proto::write_answer(&mut writer, &answer).await?;
        gate::await_handoff(&mut reader).await?;
        debug!(?answer, "transaction complete");

        Ok(stop)
    }

    /// Dispatch one order against the tree, answering empty-set orders
    /// locally; otherwise forward to the root and translate the worker
    /// answer into the client space.
    async fn dispatch(&mut self, order: Order) -> Result<Answer, MasterError> {
        let answer = match order {
            Order::Stop => {
                self.tree.stop().await?;
                Answer::StopOk
            }
            Order::HowMany => {
                if self.tree.is_empty() {
                    Answer::HowMany {
                        total: 0,
                        distinct: 0,
                    }
                } else {
                    translate(self.tree.how_many().await?)
                }
            }
            Order::Min => {
                if self.tree.is_empty() {
                    Answer::MinEmpty
                } else {
                    translate(self.tree.min().await?)
                }
            }
            Order::Max => {
                if self.tree.is_empty() {
                    Answer::MaxEmpty
                } else {
                    translate(self.tree.max().await?)
                }
            }
            Order::Exist { element } => {
                if self.tree.is_empty() {
                    Answer::ExistNo
                } else {
                    translate(self.tree.exist(element).await?)
                }
            }
            Order::Sum => {
                if self.tree.is_empty() {
                    Answer::Sum { total: 0.0 }
                } else {
                    translate(self.tree.sum().await?)
                }
            }
            Order::Insert { element } => translate(self.tree.insert_one(element).await?),
            Order::InsertMany { elements } => {
                for element in elements {
                    // The per-element acknowledgement is consumed here; the
                    // client gets a single batch acknowledgement below.
                    self.tree.insert_one(element).await?;
                }
                Answer::InsertManyOk
            }
            Order::Print => {
                if self.tree.is_empty() {
                    Answer::PrintOk
                } else {
                    translate(self.tree.print().await?)
                }
            }
        };
        Ok(answer)
    }
}

/// Bind the master socket, refusing to reuse an existing path.
///
/// An existing file at the path means another master is (or was) running;
/// taking it over silently would let two masters race on one rendezvous.
fn bind_socket(socket_path: &Path) -> Result<UnixListener, MasterError> {
    if socket_path.exists() {
        return Err(MasterError::SocketInUse(socket_path.to_path_buf()));
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    UnixListener::bind(socket_path).map_err(MasterError::Bind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_covers_every_worker_answer() {
        let table = [
            (
                NodeAnswer::HowMany {
                    total: 3,
                    distinct: 2,
                },
                Answer::HowMany {
                    total: 3,
                    distinct: 2,
                },
            ),
            (
                NodeAnswer::Min { element: 1.0 },
                Answer::Min { element: 1.0 },
            ),
            (
                NodeAnswer::Max { element: 2.0 },
                Answer::Max { element: 2.0 },
            ),
            (
                NodeAnswer::ExistYes { count: 5 },
                Answer::ExistYes { count: 5 },
            ),
            (NodeAnswer::ExistNo, Answer::ExistNo),
            (NodeAnswer::Sum { total: 6.5 }, Answer::Sum { total: 6.5 }),
            (NodeAnswer::Inserted, Answer::InsertOk),
            (NodeAnswer::Printed, Answer::PrintOk),
        ];
        for (worker, client) in table {
            assert_eq!(translate(worker), client);
        }
    }

    #[tokio::test]
    async fn test_bind_refuses_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.sock");
        std::fs::write(&path, b"").unwrap();

        let err = bind_socket(&path).unwrap_err();
        assert!(matches!(err, MasterError::SocketInUse(_)));
    }

    #[tokio::test]
    async fn test_bind_creates_and_listens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.sock");
        let _listener = bind_socket(&path).unwrap();
        assert!(path.exists());
    }
}
