//! Deterministic, pure logic shared by the coder core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod filter;
pub mod history;
pub mod path;
pub mod tools;
pub mod types;
