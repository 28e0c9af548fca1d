#![no_main]

use covdelta_adapters_lcov::parse_lcov;
use covdelta_domain::compute_diff;
use covdelta_render::{render_markdown, render_text};
use covdelta_types::DiffOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Errors are expected; panics are not
        let Ok(report) = parse_lcov(text) else {
            return;
        };

        // A report compared with itself never moves
        let result = compute_diff(&report, Some(&report), &DiffOptions::default());
        assert!(result.removed.is_empty());
        assert!(result.files.iter().all(|row| row.delta == Some(0.0)));

        let _ = render_markdown(&result);
        let _ = render_text(&result);
    }
});
