//! Public facade crate for `cardex`.
//!
//! This crate intentionally contains no IO or provider-specific logic.
//! It re-exports the backend-agnostic types/traits from `cardex-core`.

pub use cardex_core::*;
