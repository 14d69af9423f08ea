//! Fuzz target for the wire protocol decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_wire_decode
//!
//! Feeds arbitrary byte sequences to both decode paths to find panics,
//! unbounded allocations, or hangs. Truncated input must surface as an IO
//! error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime");

    runtime.block_on(async {
        let mut order_input = data;
        let _ = bramble_proto::read_order(&mut order_input).await;

        let mut answer_input = data;
        let _ = bramble_proto::read_answer(&mut answer_input).await;
    });
});
