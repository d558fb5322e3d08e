//! I/O adapters: filesystem, model backend, terminal, configuration.

pub mod config;
pub mod console;
pub mod model;
pub mod openai;
pub mod prompt;
pub mod tree_reader;
pub mod workspace;
pub mod writer;
