//! Implementation modules for `authority`.
//!
//! `src/authority.rs` is the stable facade.

pub(crate) mod guards;
pub(crate) mod info;
pub(crate) mod issue;
pub(crate) mod panel;
pub(crate) mod run;
