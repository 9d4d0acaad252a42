//! Session diagnostics

pub mod store;
