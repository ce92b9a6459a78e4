//! Query compilation and pruned top-k execution

mod bm25;
mod collector;
mod compiler;
mod completion;
mod context;
mod contributor;
mod document;
mod engine;
#[cfg(test)]
mod engine_tests;
mod exhaustive;
mod sentinel;
mod stats;
mod term;
mod window;

pub use bm25::*;
pub use collector::*;
pub use compiler::*;
pub use context::*;
pub use contributor::*;
pub use document::*;
pub use engine::*;
pub use exhaustive::*;
pub use sentinel::*;
pub use stats::*;
pub use term::*;
pub use window::*;
