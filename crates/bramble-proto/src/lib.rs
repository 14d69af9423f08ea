#![deny(unsafe_code)]

//! Wire protocol for the bramble client↔master channel.
//!
//! Every message on the socket is a sequence of fixed-width little-endian
//! fields with no delimiters: a `u32` opcode, then the payload fields that
//! opcode requires. An array payload is a `u32` element count followed by
//! that many `f32` elements.
//!
//! This is the *client* code space only. The master↔worker messages use a
//! separate, smaller code space (`NodeOrder`/`NodeAnswer` in `bramble-core`);
//! the master translates between the two at its boundary. Keep the spaces
//! separate — unifying them would couple the client surface to the internal
//! tree protocol.

pub mod codec;

pub use codec::{read_answer, read_order, write_answer, write_order};

/// Upper bound on array payload length accepted by the decoder.
pub const MAX_ARRAY_LEN: u32 = 1 << 20;

/// Completion byte the client sends after it has fully consumed an answer.
///
/// The master blocks on this byte before closing its end of the connection,
/// so neither side ever closes a channel the other is still reading. See
/// `bramble-core::gate`.
pub const HANDOFF_DONE: u8 = 0x2B;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("IO error on wire: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown order opcode {0:#x}")]
    UnknownOrder(u32),

    #[error("unknown answer opcode {0:#x}")]
    UnknownAnswer(u32),

    #[error("array length {0} exceeds maximum {MAX_ARRAY_LEN}")]
    ArrayTooLong(u32),
}

/// An order sent by a client to the master.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    /// Tear the whole tree down and terminate the master.
    Stop,
    /// Total and distinct cardinality of the multiset.
    HowMany,
    /// Smallest value in the set.
    Min,
    /// Largest value in the set.
    Max,
    /// Is `element` present, and in how many copies?
    Exist { element: f32 },
    /// Sum of all values, duplicates counted.
    Sum,
    /// Insert one element.
    Insert { element: f32 },
    /// Insert a batch of elements.
    InsertMany { elements: Vec<f32> },
    /// Ask every node to log its value in sorted order.
    Print,
}

impl Order {
    /// Wire opcode for this order.
    pub fn opcode(&self) -> u32 {
        match self {
            Order::Stop => opcodes::ORDER_STOP,
            Order::HowMany => opcodes::ORDER_HOW_MANY,
            Order::Min => opcodes::ORDER_MIN,
            Order::Max => opcodes::ORDER_MAX,
            Order::Exist { .. } => opcodes::ORDER_EXIST,
            Order::Sum => opcodes::ORDER_SUM,
            Order::Insert { .. } => opcodes::ORDER_INSERT,
            Order::InsertMany { .. } => opcodes::ORDER_INSERT_MANY,
            Order::Print => opcodes::ORDER_PRINT,
        }
    }
}

/// An answer sent by the master back to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Master acknowledged the stop and is terminating.
    StopOk,
    /// Total and distinct cardinalities.
    HowMany { total: u32, distinct: u32 },
    /// No minimum: the set is empty.
    MinEmpty,
    /// Smallest value.
    Min { element: f32 },
    /// No maximum: the set is empty.
    MaxEmpty,
    /// Largest value.
    Max { element: f32 },
    /// Element present, with its copy count.
    ExistYes { count: u32 },
    /// Element absent.
    ExistNo,
    /// Sum of all values.
    Sum { total: f32 },
    /// Single insertion acknowledged.
    InsertOk,
    /// Batch insertion acknowledged.
    InsertManyOk,
    /// Every node logged its value.
    PrintOk,
}

impl Answer {
    /// Wire opcode for this answer.
    pub fn opcode(&self) -> u32 {
        match self {
            Answer::StopOk => opcodes::ANSWER_STOP_OK,
            Answer::HowMany { .. } => opcodes::ANSWER_HOW_MANY_OK,
            Answer::MinEmpty => opcodes::ANSWER_MIN_EMPTY,
            Answer::Min { .. } => opcodes::ANSWER_MIN_OK,
            Answer::MaxEmpty => opcodes::ANSWER_MAX_EMPTY,
            Answer::Max { .. } => opcodes::ANSWER_MAX_OK,
            Answer::ExistYes { .. } => opcodes::ANSWER_EXIST_YES,
            Answer::ExistNo => opcodes::ANSWER_EXIST_NO,
            Answer::Sum { .. } => opcodes::ANSWER_SUM_OK,
            Answer::InsertOk => opcodes::ANSWER_INSERT_OK,
            Answer::InsertManyOk => opcodes::ANSWER_INSERT_MANY_OK,
            Answer::PrintOk => opcodes::ANSWER_PRINT_OK,
        }
    }
}

/// Raw wire opcodes.
///
/// Orders and answers occupy disjoint ranges so a stream desync shows up as
/// an unknown-opcode error instead of a misparsed payload.
pub mod opcodes {
    pub const ORDER_STOP: u32 = 0x01;
    pub const ORDER_HOW_MANY: u32 = 0x02;
    pub const ORDER_MIN: u32 = 0x03;
    pub const ORDER_MAX: u32 = 0x04;
    pub const ORDER_EXIST: u32 = 0x05;
    pub const ORDER_SUM: u32 = 0x06;
    pub const ORDER_INSERT: u32 = 0x07;
    pub const ORDER_INSERT_MANY: u32 = 0x08;
    pub const ORDER_PRINT: u32 = 0x09;

    pub const ANSWER_STOP_OK: u32 = 0x20;
    pub const ANSWER_HOW_MANY_OK: u32 = 0x21;
    pub const ANSWER_MIN_EMPTY: u32 = 0x22;
    pub const ANSWER_MIN_OK: u32 = 0x23;
    pub const ANSWER_MAX_EMPTY: u32 = 0x24;
    pub const ANSWER_MAX_OK: u32 = 0x25;
    pub const ANSWER_EXIST_YES: u32 = 0x26;
    pub const ANSWER_EXIST_NO: u32 = 0x27;
    pub const ANSWER_SUM_OK: u32 = 0x28;
    pub const ANSWER_INSERT_OK: u32 = 0x29;
    pub const ANSWER_INSERT_MANY_OK: u32 = 0x2A;
    pub const ANSWER_PRINT_OK: u32 = 0x2B;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_opcodes_distinct() {
        let orders = [
            Order::Stop,
            Order::HowMany,
            Order::Min,
            Order::Max,
            Order::Exist { element: 1.0 },
            Order::Sum,
            Order::Insert { element: 1.0 },
            Order::InsertMany { elements: vec![] },
            Order::Print,
        ];
        let mut seen: Vec<u32> = orders.iter().map(|o| o.opcode()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), orders.len());
    }

    #[test]
    fn test_code_spaces_disjoint() {
        // Every answer opcode must be outside the order range.
        let answers = [
            Answer::StopOk,
            Answer::HowMany {
                total: 0,
                distinct: 0,
            },
            Answer::MinEmpty,
            Answer::Min { element: 0.0 },
            Answer::MaxEmpty,
            Answer::Max { element: 0.0 },
            Answer::ExistYes { count: 1 },
            Answer::ExistNo,
            Answer::Sum { total: 0.0 },
            Answer::InsertOk,
            Answer::InsertManyOk,
            Answer::PrintOk,
        ];
        for answer in &answers {
            assert!(answer.opcode() >= 0x20, "{answer:?}");
        }
    }
}
