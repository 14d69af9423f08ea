//! The master's handle on the live node topology.
//!
//! The tree itself is implicit in the spawned node tasks and their links;
//! this type owns only the root link and the master-link receiver. It speaks
//! the node code space — the master translates to wire answers at its own
//! boundary.
//!
//! Two response channels, kept distinct on purpose: Exist/Insert/Min/Max
//! answers arrive on the master link from whichever node resolved the order,
//! while HowMany/Sum/Print answers arrive on the root's parent-chain link
//! after full aggregation.

use tokio::sync::mpsc;
use tracing::debug;

use crate::node::{self, ChildLink, NodeAnswer, NodeError, NodeOrder};

/// Depth of the shared master link. One transaction is in flight at a time,
/// so a single pending answer is the steady state.
const MASTER_LINK_DEPTH: usize = 16;

/// Root link plus the master-link channel shared by every node.
pub struct Tree {
    root: Option<ChildLink>,
    master_tx: mpsc::Sender<NodeAnswer>,
    master_rx: mpsc::Receiver<NodeAnswer>,
}

impl Tree {
    /// Create an empty tree with a fresh master link.
    pub fn new() -> Self {
        let (master_tx, master_rx) = mpsc::channel(MASTER_LINK_DEPTH);
        Self {
            root: None,
            master_tx,
            master_rx,
        }
    }

    /// Whether any node exists yet. The master answers empty-set orders
    /// itself without touching the tree.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    async fn recv_master(&mut self) -> Result<NodeAnswer, NodeError> {
        self.master_rx.recv().await.ok_or(NodeError::LinkClosed)
    }

    fn root(&self) -> Result<&ChildLink, NodeError> {
        // Callers check is_empty() first; a missing root past that point
        // means the link was torn down mid-transaction.
        self.root.as_ref().ok_or(NodeError::LinkClosed)
    }

    fn root_mut(&mut self) -> Result<&mut ChildLink, NodeError> {
        self.root.as_mut().ok_or(NodeError::LinkClosed)
    }

    /// Insert one element and await the single acknowledgement on the master
    /// link.
    ///
    /// This is the private primitive behind both the single-insert order and
    /// the batch path: it takes the element as a plain argument and consumes
    /// exactly one answer, so the batch loop cannot interleave with a
    /// client-facing handshake.
    pub async fn insert_one(&mut self, element: f32) -> Result<NodeAnswer, NodeError> {
        match &self.root {
            None => {
                debug!(element, "spawning root node");
                self.root = Some(node::spawn(element, self.master_tx.clone()));
            }
            Some(root) => {
                root.send(NodeOrder::Insert { element }).await?;
            }
        }
        self.recv_master().await
    }

    /// Membership test; answer arrives on the master link from the resolving
    /// node. Caller must have checked [`Tree::is_empty`].
    pub async fn exist(&mut self, element: f32) -> Result<NodeAnswer, NodeError> {
        self.root()?.send(NodeOrder::Exist { element }).await?;
        self.recv_master().await
    }

    /// Minimum of the set; answered on the master link by the leftmost node.
    pub async fn min(&mut self) -> Result<NodeAnswer, NodeError> {
        self.root()?.send(NodeOrder::Min).await?;
        self.recv_master().await
    }

    /// Maximum of the set; answered on the master link by the rightmost node.
    pub async fn max(&mut self) -> Result<NodeAnswer, NodeError> {
        self.root()?.send(NodeOrder::Max).await?;
        self.recv_master().await
    }

    /// Total and distinct cardinality, aggregated up the parent chain.
    pub async fn how_many(&mut self) -> Result<NodeAnswer, NodeError> {
        self.root()?.send(NodeOrder::HowMany).await?;
        self.root_mut()?.recv().await
    }

    /// Sum of all values, aggregated up the parent chain.
    pub async fn sum(&mut self) -> Result<NodeAnswer, NodeError> {
        self.root()?.send(NodeOrder::Sum).await?;
        self.root_mut()?.recv().await
    }

    /// Post-order debug log of the whole tree; acknowledged up the parent
    /// chain.
    pub async fn print(&mut self) -> Result<NodeAnswer, NodeError> {
        self.root()?.send(NodeOrder::Print).await?;
        self.root_mut()?.recv().await
    }

    /// Tear down every node, leaves first, and join the root task. Idempotent
    /// on an empty tree.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        if let Some(root) = self.root.take() {
            root.send(NodeOrder::Stop).await?;
            root.join().await?;
        }
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn tree_of(elements: &[f32]) -> Tree {
        let mut tree = Tree::new();
        for &element in elements {
            let answer = tree.insert_one(element).await.unwrap();
            assert_eq!(answer, NodeAnswer::Inserted);
        }
        tree
    }

    #[tokio::test]
    async fn test_fresh_tree_is_empty() {
        let tree = Tree::new();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_insert_then_query_scenario() {
        // insert 3.0 → insert 1.0 → insert 5.0, then the full query battery.
        let mut tree = tree_of(&[3.0, 1.0, 5.0]).await;

        assert_eq!(tree.min().await.unwrap(), NodeAnswer::Min { element: 1.0 });
        assert_eq!(tree.max().await.unwrap(), NodeAnswer::Max { element: 5.0 });
        assert_eq!(
            tree.exist(3.0).await.unwrap(),
            NodeAnswer::ExistYes { count: 1 }
        );
        assert_eq!(tree.exist(9.0).await.unwrap(), NodeAnswer::ExistNo);
        assert_eq!(tree.sum().await.unwrap(), NodeAnswer::Sum { total: 9.0 });
        assert_eq!(
            tree.how_many().await.unwrap(),
            NodeAnswer::HowMany {
                total: 3,
                distinct: 3
            }
        );

        tree.stop().await.unwrap();
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_counting() {
        // k1 copies of a, k2 copies of b.
        let mut tree = tree_of(&[2.0, 2.0, 2.0, 8.0, 8.0]).await;

        assert_eq!(
            tree.exist(2.0).await.unwrap(),
            NodeAnswer::ExistYes { count: 3 }
        );
        assert_eq!(
            tree.how_many().await.unwrap(),
            NodeAnswer::HowMany {
                total: 5,
                distinct: 2
            }
        );
        assert_eq!(tree.sum().await.unwrap(), NodeAnswer::Sum { total: 22.0 });

        tree.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_values_ordered_by_search_path_not_arrival() {
        let mut tree = tree_of(&[5.0, 9.0, 1.0, 7.0, 3.0, 11.0]).await;
        assert_eq!(tree.min().await.unwrap(), NodeAnswer::Min { element: 1.0 });
        assert_eq!(tree.max().await.unwrap(), NodeAnswer::Max { element: 11.0 });
        tree.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_left_chain() {
        // Descending inserts degrade to a left-only list; Stop must still
        // reach every node.
        let mut tree = tree_of(&[5.0, 4.0, 3.0, 2.0, 1.0]).await;
        tree.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_right_chain() {
        let mut tree = tree_of(&[1.0, 2.0, 3.0, 4.0, 5.0]).await;
        tree.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_empty_tree_is_noop() {
        let mut tree = Tree::new();
        tree.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_print_full_shape() {
        let mut tree = tree_of(&[4.0, 2.0, 6.0, 1.0, 3.0, 5.0, 7.0]).await;
        assert_eq!(tree.print().await.unwrap(), NodeAnswer::Printed);
        tree.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_sum_accounts_for_duplicates() {
        let mut tree = tree_of(&[1.5, 1.5, 2.5]).await;
        assert_eq!(tree.sum().await.unwrap(), NodeAnswer::Sum { total: 5.5 });
        tree.stop().await.unwrap();
    }
}
