//! Core types and trait definitions for the Troth contract service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod collab;
pub mod comment;
pub mod contract;
pub mod error;
pub mod referral;
pub mod share;
pub mod store;
pub mod template;
pub mod user;

pub use error::{Error, Result};
