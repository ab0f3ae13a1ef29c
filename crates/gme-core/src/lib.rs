//! Core domain + pipeline for extracting group membership lists.
//!
//! This crate is framework-agnostic. The messaging account (chat fetch, contact
//! lookup, group listing) lives behind ports implemented in adapter crates.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod extraction;
pub mod formatting;
pub mod logging;
pub mod participants;
pub mod ports;
pub mod resolver;
pub mod session;
pub mod snapshot;

pub use errors::{Error, Result};
