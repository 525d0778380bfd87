//! Node-management core for a distributed time-series database server.
//!
//! This crate implements the three tightly coupled subsystems that make up
//! a node's management plane:
//!
//! - [`core::role`] and [`core::dispatcher`] — the role wrapper and the
//!   message/lifecycle dispatcher that owns it.
//! - [`core::show`] — the expiring, refcounted show-query session cache.
//! - [`core::logstore`] — the replicated log store backing the consensus log.
//!
//! The storage engine, SQL planner, consensus peer protocol, and network
//! transport are external collaborators, represented here as the traits in
//! [`core::adapters`].

pub mod config;
pub mod core;
pub mod errors;

pub use errors::{NodeError, NodeResult};
