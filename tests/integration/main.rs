//! Integration test harness for the AutoCompressor firmware.
//!
//! Run on the host with: `cargo test --no-default-features`
//!
//! All hardware is replaced by scripted mocks from [`mock_hw`], so whole
//! inflate/deflate sessions run in zero wall time.

mod compressor_tests;
mod hardware_tests;
mod mock_hw;
mod service_tests;
