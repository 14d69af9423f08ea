//! Node worker task — one task per distinct value in the tree.
//!
//! A node owns one value, its duplicate count, and channel links: an order
//! receiver from its parent, an answer sender back to that parent, a direct
//! answer sender to the master, and up to two child links. It runs a
//! blocking loop reading one order at a time until it is told to stop.
//!
//! Answers travel on two deliberately distinct paths. Exist, Insert, Min and
//! Max resolve at exactly one node, which answers the master directly on the
//! master link — intermediate ancestors forward the order and go back to
//! their loop without relaying anything. HowMany, Sum and Print aggregate at
//! every level and answer up the parent chain. Collapsing the two paths onto
//! one channel would let an aggregation reply race a direct reply.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Orders a node accepts from its parent (or the master, for the root).
///
/// This is the master↔worker code space. It is smaller than the wire code
/// space in `bramble-proto` and must stay separate from it; the master
/// translates between the two.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOrder {
    /// Terminate the subtree rooted here, children first.
    Stop,
    /// Report (total, distinct) cardinality of the subtree, up the parent chain.
    HowMany,
    /// Report the subtree minimum, directly to the master.
    Min,
    /// Report the subtree maximum, directly to the master.
    Max,
    /// Resolve membership of `element`, directly to the master.
    Exist { element: f32 },
    /// Report the subtree sum (duplicates counted), up the parent chain.
    Sum,
    /// Insert `element` into the subtree; the resolving node answers the master.
    Insert { element: f32 },
    /// Log the subtree post-order, acknowledging up the parent chain.
    Print,
}

/// Answers a node emits, on the master link or the parent chain.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAnswer {
    /// Subtree cardinalities (parent chain).
    HowMany { total: u32, distinct: u32 },
    /// Subtree minimum (master link).
    Min { element: f32 },
    /// Subtree maximum (master link).
    Max { element: f32 },
    /// Element present with this copy count (master link).
    ExistYes { count: u32 },
    /// Element absent from the subtree (master link).
    ExistNo,
    /// Subtree sum (parent chain).
    Sum { total: f32 },
    /// Insertion landed — emitted by the node that resolved it, or by a
    /// freshly spawned node whose creation *is* the insertion (master link).
    Inserted,
    /// Subtree fully logged (parent chain).
    Printed,
}

/// Errors that terminate a node task.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("channel link closed by peer")]
    LinkClosed,

    #[error("node task terminated abnormally: {0}")]
    TaskFailed(String),

    #[error("unexpected answer on link: {0:?}")]
    Unexpected(NodeAnswer),
}

/// Per-link channel depth. The protocol is strict request/response, so a
/// single slot per direction is enough; the extra slack only covers the
/// Stop fan-out, which sends to both children before awaiting either.
const LINK_DEPTH: usize = 4;

/// A parent's handle on one child node: order sender, answer receiver, and
/// the child's task handle for joining at stop.
#[derive(Debug)]
pub struct ChildLink {
    orders: mpsc::Sender<NodeOrder>,
    answers: mpsc::Receiver<NodeAnswer>,
    task: JoinHandle<()>,
}

impl ChildLink {
    /// Forward one order to the child.
    pub async fn send(&self, order: NodeOrder) -> Result<(), NodeError> {
        self.orders
            .send(order)
            .await
            .map_err(|_| NodeError::LinkClosed)
    }

    /// Await the child's next parent-chain answer.
    pub async fn recv(&mut self) -> Result<NodeAnswer, NodeError> {
        self.answers.recv().await.ok_or(NodeError::LinkClosed)
    }

    /// Await the child task's termination after a Stop was sent.
    pub async fn join(self) -> Result<(), NodeError> {
        self.task
            .await
            .map_err(|e| NodeError::TaskFailed(e.to_string()))
    }
}

/// Spawn a node task for `element` and return the parent's link to it.
///
/// The master-link sender is cloned into the new node and inherited by every
/// node it spawns in turn, so any descendant can answer the master directly.
/// The new node emits [`NodeAnswer::Inserted`] on that link before reading
/// its first order: its own creation is the insertion being acknowledged.
pub fn spawn(element: f32, master: mpsc::Sender<NodeAnswer>) -> ChildLink {
    let (order_tx, order_rx) = mpsc::channel(LINK_DEPTH);
    let (answer_tx, answer_rx) = mpsc::channel(LINK_DEPTH);

    let task = tokio::spawn(async move {
        let node = Node {
            element,
            count: 1,
            orders: order_rx,
            parent: answer_tx,
            master,
            left: None,
            right: None,
        };
        if let Err(e) = node.run().await {
            // No recovery path: a broken link strands the whole transaction,
            // so surface it loudly and let the task die.
            error!(element, error = %e, "node task aborted");
        }
    });

    ChildLink {
        orders: order_tx,
        answers: answer_rx,
        task,
    }
}

struct Node {
    element: f32,
    count: u32,
    orders: mpsc::Receiver<NodeOrder>,
    parent: mpsc::Sender<NodeAnswer>,
    master: mpsc::Sender<NodeAnswer>,
    left: Option<ChildLink>,
    right: Option<ChildLink>,
}

impl Node {
    async fn run(mut self) -> Result<(), NodeError> {
        self.answer_master(NodeAnswer::Inserted).await?;
        debug!(element = self.element, "node started");

        loop {
            let order = self.orders.recv().await.ok_or(NodeError::LinkClosed)?;
            match order {
                NodeOrder::Stop => {
                    self.stop_children().await?;
                    debug!(element = self.element, "node stopped");
                    return Ok(());
                }
                NodeOrder::HowMany => self.how_many().await?,
                NodeOrder::Min => self.min().await?,
                NodeOrder::Max => self.max().await?,
                NodeOrder::Exist { element } => self.exist(element).await?,
                NodeOrder::Sum => self.sum().await?,
                NodeOrder::Insert { element } => self.insert(element).await?,
                NodeOrder::Print => self.print().await?,
            }
        }
    }

    async fn answer_master(&self, answer: NodeAnswer) -> Result<(), NodeError> {
        self.master
            .send(answer)
            .await
            .map_err(|_| NodeError::LinkClosed)
    }

    async fn answer_parent(&self, answer: NodeAnswer) -> Result<(), NodeError> {
        self.parent
            .send(answer)
            .await
            .map_err(|_| NodeError::LinkClosed)
    }

    /// Membership test. Only the resolving node talks to the master; every
    /// ancestor on the search path just forwards and returns to its loop.
    async fn exist(&mut self, element: f32) -> Result<(), NodeError> {
        if element == self.element {
            self.answer_master(NodeAnswer::ExistYes { count: self.count })
                .await
        } else if element < self.element {
            match &self.left {
                None => self.answer_master(NodeAnswer::ExistNo).await,
                Some(left) => left.send(NodeOrder::Exist { element }).await,
            }
        } else {
            match &self.right {
                None => self.answer_master(NodeAnswer::ExistNo).await,
                Some(right) => right.send(NodeOrder::Exist { element }).await,
            }
        }
    }

    /// Insertion. An equal value bumps the local count; a missing side spawns
    /// a new child (which acknowledges the master itself, on startup);
    /// otherwise the order is forwarded and this node does not answer.
    async fn insert(&mut self, element: f32) -> Result<(), NodeError> {
        if element == self.element {
            self.count += 1;
            self.answer_master(NodeAnswer::Inserted).await
        } else if element < self.element {
            match &self.left {
                None => {
                    self.left = Some(spawn(element, self.master.clone()));
                    Ok(())
                }
                Some(left) => left.send(NodeOrder::Insert { element }).await,
            }
        } else {
            match &self.right {
                None => {
                    self.right = Some(spawn(element, self.master.clone()));
                    Ok(())
                }
                Some(right) => right.send(NodeOrder::Insert { element }).await,
            }
        }
    }

    /// The leftmost node answers the master with its own value; everyone
    /// else forwards left without waiting.
    async fn min(&mut self) -> Result<(), NodeError> {
        match &self.left {
            None => {
                self.answer_master(NodeAnswer::Min {
                    element: self.element,
                })
                .await
            }
            Some(left) => left.send(NodeOrder::Min).await,
        }
    }

    async fn max(&mut self) -> Result<(), NodeError> {
        match &self.right {
            None => {
                self.answer_master(NodeAnswer::Max {
                    element: self.element,
                })
                .await
            }
            Some(right) => right.send(NodeOrder::Max).await,
        }
    }

    /// Cardinality aggregation up the parent chain: ask each existing child
    /// in turn, combine with the local count, answer the immediate caller.
    async fn how_many(&mut self) -> Result<(), NodeError> {
        let mut total = self.count;
        let mut distinct = 1u32;

        if let Some(left) = &mut self.left {
            left.send(NodeOrder::HowMany).await?;
            match left.recv().await? {
                NodeAnswer::HowMany {
                    total: t,
                    distinct: d,
                } => {
                    total += t;
                    distinct += d;
                }
                other => return Err(NodeError::Unexpected(other)),
            }
        }
        if let Some(right) = &mut self.right {
            right.send(NodeOrder::HowMany).await?;
            match right.recv().await? {
                NodeAnswer::HowMany {
                    total: t,
                    distinct: d,
                } => {
                    total += t;
                    distinct += d;
                }
                other => return Err(NodeError::Unexpected(other)),
            }
        }

        self.answer_parent(NodeAnswer::HowMany { total, distinct })
            .await
    }

    /// Sum aggregation up the parent chain, duplicates counted.
    async fn sum(&mut self) -> Result<(), NodeError> {
        let mut total = self.element * self.count as f32;

        if let Some(left) = &mut self.left {
            left.send(NodeOrder::Sum).await?;
            match left.recv().await? {
                NodeAnswer::Sum { total: t } => total += t,
                other => return Err(NodeError::Unexpected(other)),
            }
        }
        if let Some(right) = &mut self.right {
            right.send(NodeOrder::Sum).await?;
            match right.recv().await? {
                NodeAnswer::Sum { total: t } => total += t,
                other => return Err(NodeError::Unexpected(other)),
            }
        }

        self.answer_parent(NodeAnswer::Sum { total }).await
    }

    /// Post-order traversal: left subtree, then right subtree, each awaited
    /// before moving on, then this node's own value.
    async fn print(&mut self) -> Result<(), NodeError> {
        if let Some(left) = &mut self.left {
            left.send(NodeOrder::Print).await?;
            match left.recv().await? {
                NodeAnswer::Printed => {}
                other => return Err(NodeError::Unexpected(other)),
            }
        }
        if let Some(right) = &mut self.right {
            right.send(NodeOrder::Print).await?;
            match right.recv().await? {
                NodeAnswer::Printed => {}
                other => return Err(NodeError::Unexpected(other)),
            }
        }

        info!(element = self.element, count = self.count, "value");

        self.answer_parent(NodeAnswer::Printed).await
    }

    /// Fan Stop out to whichever children exist, then join each child task
    /// before this node exits. A leaf returns immediately.
    async fn stop_children(&mut self) -> Result<(), NodeError> {
        if let Some(left) = &self.left {
            left.send(NodeOrder::Stop).await?;
        }
        if let Some(right) = &self.right {
            right.send(NodeOrder::Stop).await?;
        }
        if let Some(left) = self.left.take() {
            left.join().await?;
        }
        if let Some(right) = self.right.take() {
            right.join().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive a single spawned node directly through its parent link.
    async fn spawn_root(element: f32) -> (ChildLink, mpsc::Receiver<NodeAnswer>) {
        let (master_tx, mut master_rx) = mpsc::channel(16);
        let link = spawn(element, master_tx);
        // Consume the implicit startup acknowledgement.
        assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));
        (link, master_rx)
    }

    #[tokio::test]
    async fn test_fresh_node_acknowledges_its_own_creation() {
        let (master_tx, mut master_rx) = mpsc::channel(16);
        let _link = spawn(7.5, master_tx);
        assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));
    }

    #[tokio::test]
    async fn test_duplicate_insert_increments_count() {
        let (link, mut master_rx) = spawn_root(2.0).await;
        link.send(NodeOrder::Insert { element: 2.0 }).await.unwrap();
        assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));

        link.send(NodeOrder::Exist { element: 2.0 }).await.unwrap();
        assert_eq!(
            master_rx.recv().await,
            Some(NodeAnswer::ExistYes { count: 2 })
        );
    }

    #[tokio::test]
    async fn test_exist_misses_answer_master_directly() {
        let (link, mut master_rx) = spawn_root(2.0).await;
        link.send(NodeOrder::Exist { element: 1.0 }).await.unwrap();
        assert_eq!(master_rx.recv().await, Some(NodeAnswer::ExistNo));
        link.send(NodeOrder::Exist { element: 3.0 }).await.unwrap();
        assert_eq!(master_rx.recv().await, Some(NodeAnswer::ExistNo));
    }

    #[tokio::test]
    async fn test_leaf_answers_min_and_max_with_own_value() {
        let (link, mut master_rx) = spawn_root(4.25).await;
        link.send(NodeOrder::Min).await.unwrap();
        assert_eq!(
            master_rx.recv().await,
            Some(NodeAnswer::Min { element: 4.25 })
        );
        link.send(NodeOrder::Max).await.unwrap();
        assert_eq!(
            master_rx.recv().await,
            Some(NodeAnswer::Max { element: 4.25 })
        );
    }

    #[tokio::test]
    async fn test_subtree_aggregates_up_parent_chain() {
        let (mut link, mut master_rx) = spawn_root(3.0).await;
        for element in [1.0, 5.0, 1.0] {
            link.send(NodeOrder::Insert { element }).await.unwrap();
            assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));
        }

        link.send(NodeOrder::HowMany).await.unwrap();
        assert_eq!(
            link.recv().await.unwrap(),
            NodeAnswer::HowMany {
                total: 4,
                distinct: 3
            }
        );

        link.send(NodeOrder::Sum).await.unwrap();
        assert_eq!(link.recv().await.unwrap(), NodeAnswer::Sum { total: 10.0 });
    }

    #[tokio::test]
    async fn test_min_max_resolve_through_descendants() {
        let (link, mut master_rx) = spawn_root(3.0).await;
        for element in [1.0, 5.0, 0.5, 9.0] {
            link.send(NodeOrder::Insert { element }).await.unwrap();
            assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));
        }

        link.send(NodeOrder::Min).await.unwrap();
        assert_eq!(
            master_rx.recv().await,
            Some(NodeAnswer::Min { element: 0.5 })
        );

        link.send(NodeOrder::Max).await.unwrap();
        assert_eq!(
            master_rx.recv().await,
            Some(NodeAnswer::Max { element: 9.0 })
        );
    }

    #[tokio::test]
    async fn test_print_acknowledges_after_subtree() {
        let (mut link, mut master_rx) = spawn_root(3.0).await;
        for element in [1.0, 5.0] {
            link.send(NodeOrder::Insert { element }).await.unwrap();
            assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));
        }
        link.send(NodeOrder::Print).await.unwrap();
        assert_eq!(link.recv().await.unwrap(), NodeAnswer::Printed);
    }

    #[tokio::test]
    async fn test_stop_joins_entire_subtree() {
        let (link, mut master_rx) = spawn_root(3.0).await;
        for element in [1.0, 5.0, 0.5, 2.0, 4.0, 9.0] {
            link.send(NodeOrder::Insert { element }).await.unwrap();
            assert_eq!(master_rx.recv().await, Some(NodeAnswer::Inserted));
        }
        link.send(NodeOrder::Stop).await.unwrap();
        link.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_single_node() {
        let (link, _master_rx) = spawn_root(1.0).await;
        link.send(NodeOrder::Stop).await.unwrap();
        link.join().await.unwrap();
    }
}
