//! Fuzz the labeled-field document parser: must never panic, and block
//! splitting must partition the matching fields.

#![no_main]

use gatehouse_core::fields::FieldDoc;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let doc = FieldDoc::parse(input);
    let targets = doc.all("Target").len();
    let blocks = doc.blocks("Target");
    assert_eq!(blocks.len(), targets);
});
