//! Fuzz the signature token grammar: must never panic, and accepted
//! tokens must round-trip through their string form.

#![no_main]

use gatehouse_core::token::SignatureToken;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(token) = SignatureToken::parse(input) {
        assert_eq!(token.as_str(), input);
        let reparsed = SignatureToken::parse(token.as_str()).expect("round-trip");
        assert_eq!(reparsed.actor(), token.actor());
    }
});
