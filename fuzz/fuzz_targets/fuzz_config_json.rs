//! Fuzz target: JSON config import
//!
//! Feeds arbitrary text to `SystemConfig::from_json` and verifies:
//! - No panics on malformed or hostile input
//! - Anything accepted also passes `validate` and builds a compressor
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use autocompressor::config::SystemConfig;
use autocompressor::control::AutoCompressor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Ok(cfg) = SystemConfig::from_json(text) else {
        return;
    };

    assert!(cfg.validate().is_ok(), "from_json accepted an invalid config");
    assert!(cfg.control.error_margin > 0.0);

    let compressor = AutoCompressor::new(&cfg.control);
    assert!(compressor.temperature_k() > 0.0);
    assert!(compressor.pressure_within_margin(cfg.default_target, cfg.default_target));
});
