//! Transit departure viewer core.
//!
//! Live departure boards for Munich public transport, favorites keyed by
//! normalized station identity with optional filters, short previews per
//! favorite, and a favorites sync with a paired device.

pub mod board;
pub mod config;
pub mod display;
pub mod domain;
pub mod filter;
pub mod ordering;
pub mod preview;
pub mod provider;
pub mod store;
pub mod sync;
pub mod web;
