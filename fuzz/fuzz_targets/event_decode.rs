//! Fuzz target for ServerEvent::decode
//!
//! This fuzzer tests event decoding with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Payload shapes that bypass the event-name dispatch
//! - Id representations that break normalized comparison
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use threadcast_proto::ServerEvent;

fuzz_target!(|data: &[u8]| {
    // Attempt to parse arbitrary bytes as a JSON frame and decode it.
    // This should never panic, only return Err for invalid data.
    if let Ok(raw) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = ServerEvent::decode(&raw);
    }
});
