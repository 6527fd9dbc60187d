//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary UTF-8 to `AppConfig::parse()`; parsing and validation
//! must return an error rather than panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = podhost_config::AppConfig::parse(s) {
            let _ = podhost_core::runtime::RuntimeOptions::from_config(&config);
        }
    }
});
