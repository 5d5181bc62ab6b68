//! Cross-crate integration suites.

pub mod concurrency;
pub mod http_flow;
pub mod lifecycle;

/// Secret used across the suites. Deliberately lacks uppercase letters.
pub const TEST_SECRET: &str = "s3cr3t-s3cr3t-s3cr3t-s3cr3t-0000";
