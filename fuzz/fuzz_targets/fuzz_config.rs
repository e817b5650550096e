#![no_main]

use fancylock_core::LockConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<LockConfig>(data) else {
        return;
    };

    // Validation must not panic on any parsed file
    if config.validate().is_ok() {
        assert!(!config.supported_extensions.is_empty());
        assert!(config.lockout.threshold > 0);
        assert!(config.lockout.base_secs <= config.lockout.max_secs);

        // A valid config survives a save/load cycle
        let text = serde_json::to_string(&config).unwrap();
        let reparsed: LockConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, config);
    }
});
