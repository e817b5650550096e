#![no_main]

use fancylock_core::media::ipc::parse_reply;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary player output must never panic
    if let Some(path) = parse_reply(data) {
        assert!(!path.is_empty());

        // A reply rebuilt from the parsed path parses to the same path
        let rebuilt = serde_json::json!({ "data": path, "error": "success" }).to_string();
        assert_eq!(parse_reply(rebuilt.as_bytes()).as_deref(), Some(path.as_str()));
    }
});
