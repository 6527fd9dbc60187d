//! Fuzz target for hostname resolution and platform formatting.
//!
//! Run with: cargo +nightly fuzz run fuzz_hostname_resolve
//!
//! The first byte selects network mode and platform; the rest is split into
//! a requested hostname and a host hostname.

#![no_main]

use libfuzzer_sys::fuzz_target;
use podhost_core::hostname::{NetworkMode, resolve};
use podhost_core::platform::Platform;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(s) = std::str::from_utf8(rest) else {
        return;
    };
    let (requested, host) = s.split_once('\0').unwrap_or((s, "node-01"));

    let mode = if selector & 1 == 0 {
        NetworkMode::Namespaced
    } else {
        NetworkMode::HostNetwork
    };
    let platform = if selector & 2 == 0 {
        Platform::Posix
    } else {
        Platform::Windows
    };
    let requested = (selector & 4 == 0).then_some(requested);

    let result = resolve(requested, mode, host, "fallback");
    let explicit = requested.filter(|r| !r.is_empty());

    match (mode, explicit) {
        (NetworkMode::HostNetwork, Some(_)) => assert!(result.is_err()),
        (NetworkMode::HostNetwork, None) => {
            assert_eq!(result.as_ref().map(|h| h.as_str()), Ok(host));
        }
        (NetworkMode::Namespaced, Some(r)) => {
            assert_eq!(result.as_ref().map(|h| h.as_str()), Ok(r));
        }
        (NetworkMode::Namespaced, None) => {
            assert_eq!(result.as_ref().map(|h| h.as_str()), Ok("fallback"));
        }
    }

    if let Ok(hostname) = result {
        assert_eq!(resolve(requested, mode, host, "fallback"), Ok(hostname.clone()));
        let entry = platform.format(&hostname);
        assert_eq!(entry.key, platform.hostname_env_key());
    }
});
