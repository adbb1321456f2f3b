//! Runtime support a generated parsegen parser links against: the input
//! cursor, the 6 matching primitives, and the packrat memo table with
//! its left-recursion seed-growing driver. See spec.md §4.6.
//!
//! Deliberately carries no dependency of its own (matching the
//! teacher's `radlr-rust-runtime`, which is likewise dependency-free
//! apart from an optional `wasm-bindgen` feature) and no dependency on
//! `parsegen-core` — a generated parser should be able to link this
//! crate in isolation, without pulling in the grammar compiler.

pub mod input;
pub mod interp;
pub mod memo;
pub mod primitives;

pub use input::Input;
pub use memo::{Lookup, MemoTable};
pub use primitives::{expect_char, expect_string, lookahead, loop_, maybe, ranges, rep};
