// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz the field validator and shape detector with arbitrary JSON bodies.
#![no_main]
use libfuzzer_sys::fuzz_target;
use rv_dialect::{ApiStyle, ShapeDetector};
use rv_validate::ValidationReport;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    if let Some(m) = ShapeDetector::new().detect(&body) {
        assert!((0.0..=1.0).contains(&m.confidence));
    }

    for &style in ApiStyle::all() {
        let report = ValidationReport::check(style, &body);
        // --- passed() means no error-severity issue ---
        assert_eq!(report.passed(), report.errors().next().is_none());
        for issue in &report.issues {
            assert!(!issue.field_path.is_empty());
            let _ = format!("{issue}");
        }
        let _ = report.summary();
    }
});
