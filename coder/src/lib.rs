//! Interactive coding agent loop over a single project directory.
//!
//! A human converses with a language model that may ask for two local tools:
//! reading the whole project tree and writing a batch of files back into it.
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (ignore rules, path containment,
//!   tool registry and decoding, conversation history). No I/O.
//! - **[`io`]**: Side-effecting adapters (tree reader, sandboxed writer, model
//!   backend, console, config). Behind traits where tests need doubles.
//!
//! Orchestration modules ([`dispatch`], [`session`], [`repl`], [`start`])
//! wire core logic to I/O for the CLI.

pub mod core;
pub mod dispatch;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod repl;
pub mod session;
pub mod start;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
