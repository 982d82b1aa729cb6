// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz response normalization with arbitrary JSON bodies.
#![no_main]
use libfuzzer_sys::fuzz_target;
use rv_dialect::ApiStyle;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    for &style in ApiStyle::all() {
        let canonical = rv_normalize::normalize(style, &body);
        // --- hash always tracks the extracted content ---
        assert_eq!(canonical.content_hash, rv_normalize::content_hash(&canonical.content));
        assert_eq!(canonical.style, style);
        let _ = canonical.missing_fields();
    }
});
