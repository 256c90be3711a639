//! Fuzz the TSJSON ledger line parser: must never panic, and accepted
//! lines must re-serialize to bytes that parse to the same event.

#![no_main]

use gatehouse_core::event::parser::{ParsedLine, parse_line};
use gatehouse_core::event::writer::to_tsjson_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(ParsedLine::Event(event)) = parse_line(input) {
        let line = to_tsjson_line(&event).expect("accepted event must serialize");
        match parse_line(&line) {
            Ok(ParsedLine::Event(reparsed)) => assert_eq!(event, reparsed),
            other => panic!("serialized event failed to reparse: {other:?}"),
        }
    }
});
