//! Consolidated test modules.
//!
//! End-to-end tests that drive the full HTTP application against the
//! in-memory directory.
