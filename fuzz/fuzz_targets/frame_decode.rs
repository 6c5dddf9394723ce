//! Fuzz target for Message::deserialize
//!
//! Feeds arbitrary byte sequences to the frame parser to find:
//! - Parser crashes or panics
//! - Out-of-bounds slicing on truncated frames
//! - Malformed headers that bypass validation
//!
//! The parser should NEVER panic. All invalid inputs must return an error.

#![no_main]

use hopframe_proto::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must either parse into a message or fail cleanly.
    if let Ok(msg) = Message::deserialize(data) {
        // Anything that parsed must re-serialize to the same bytes.
        let bytes = msg.serialize().expect("parsed message must re-serialize");
        assert_eq!(bytes, data);
    }
});
