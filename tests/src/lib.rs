//! # Signed Handlers Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── end_to_end.rs   # sign → validate → replay, byte for byte
//! │   ├── concurrency.rs  # atomic check-and-record under load
//! │   ├── lifecycle.rs    # cleanup task start/stop/restart
//! │   └── http_flow.rs    # full router with the signature layer
//! └── benches/            # criterion benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p signing-tests
//!
//! # By suite
//! cargo test -p signing-tests integration::lifecycle::
//!
//! # Benchmarks
//! cargo bench -p signing-tests
//! ```

#![allow(dead_code)]

pub mod integration;
