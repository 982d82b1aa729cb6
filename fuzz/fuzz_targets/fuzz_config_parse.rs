// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz configuration parsing and validation.
//!
//! Feeds arbitrary byte strings through `parse_json` and `validate_config`,
//! verifying:
//! 1. `parse_json` never panics on arbitrary input.
//! 2. Every parsed config can be validated and resolved without panics.
//! 3. Warnings and errors are displayable.
#![no_main]
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let config = match rv_config::parse_json(s) {
        Ok(c) => c,
        Err(e) => {
            let _ = format!("{e}");
            return;
        }
    };

    match rv_config::validate_config(&config) {
        Ok(warnings) => {
            for w in &warnings {
                let _ = format!("{w}");
            }
        }
        Err(e) => {
            let _ = format!("{e}");
        }
    }

    // --- every usable rule resolves to a backend ---
    let resolver = rv_config::ConfigResolver::new(Arc::new(config));
    for rule in resolver.usable_rules() {
        assert!(resolver.resolve_backend(rule).is_ok());
    }
    let _ = resolver.resolve_rule(None);
});
