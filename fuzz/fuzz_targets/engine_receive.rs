//! Fuzz target for the full receive path.
//!
//! Drives hostile bytes through parse, filter, dispatch, and forwarding.
//! The engine must never panic on network input, whatever the frame
//! claims about its type, ttl, addressing, or payload.

#![no_main]

use hopframe_core::{Host, Node, NodeConfig, Task};
use hopframe_proto::Ts;
use libfuzzer_sys::fuzz_target;

/// Host that swallows everything: broadcasts vanish, tasks are dropped.
struct NullHost;

impl Host for NullHost {
    fn broadcast(&self, _frame: &[u8]) {}

    fn now_ms(&self) -> Ts {
        0x1000
    }

    fn schedule_after(&self, _delay_ms: u32, _task: Task) {}
}

fuzz_target!(|data: &[u8]| {
    let node = Node::new(NullHost, 1, NodeConfig::default());
    node.init();
    node.add_static_route(9, 2);
    // Feed the input twice: the second pass exercises the dedup path for
    // frames that survived parsing.
    node.receive(data, 0);
    node.receive(data, -7);
});
