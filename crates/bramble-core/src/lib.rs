#![deny(unsafe_code)]

//! bramble core runtime.
//!
//! A multiset of `f32` values stored as a binary search tree whose nodes are
//! independently scheduled tokio tasks. Tree edges are mpsc channel pairs;
//! every node additionally holds a direct sender to the master so answers
//! that resolve at a single node skip the ancestor chain. A long-lived
//! master daemon owns the root link and serializes client transactions over
//! a Unix socket; short-lived clients speak the `bramble-proto` wire
//! protocol through the typed [`MasterClient`].

/// Typed client for one-shot transactions against the master.
pub mod client;
/// Transaction gate: turnstile plus handoff-done teardown discipline.
pub mod gate;
/// Master daemon: socket lifecycle and the serialized transaction loop.
pub mod master;
/// Node worker task and the master↔worker message space.
pub mod node;
/// Uniform random payload generation for batch inserts.
pub mod rng;
/// The master's handle on the live node topology.
pub mod tree;

pub use client::{ClientError, MasterClient};
pub use master::{Master, MasterError};
pub use node::{NodeAnswer, NodeError, NodeOrder};
pub use tree::Tree;
