//! Per-target up-to-date / incremental-build checking, grounded in the
//! pack's ninja-rs rebuilder: a mtime cache fronting the filesystem, and a
//! pure decision function over cached timestamps.

mod checker;
mod timestamp_cache;

pub use checker::{BuildOutcome, UpToDateChecker};
pub use timestamp_cache::TimestampCache;
