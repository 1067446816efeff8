#![no_main]

use libfuzzer_sys::fuzz_target;
use std::panic::AssertUnwindSafe;
use stencil_prep::MarkupBackend;
use stencil_prep::VariablePath;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let backend = MarkupBackend::new();

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| backend.scan(content)));
        assert!(result.is_ok(), "scan must not panic");

        if let Ok(Ok(paths)) = result {
            for path in &paths {
                assert!(!path.is_empty(), "recorded paths must not be empty");
                assert!(
                    !VariablePath::new(path.as_str()).segments().is_empty(),
                    "recorded paths must have at least one segment"
                );
            }
        }
    }
});
