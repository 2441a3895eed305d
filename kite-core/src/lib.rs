//! Kite Core
//!
//! Core types and abstractions for the Kite build agent.
//!
//! This crate contains:
//! - Domain types: the agent's mirror of coordinator entities (Job, CommandStep, Plugins)
//! - DTOs: request/response bodies exchanged with the coordinator
//! - Signing: canonical field values used to compute and verify step signatures
//!
//! Nothing in here performs I/O; the HTTP side lives in `kite-client`.

pub mod domain;
pub mod dto;
pub mod error;
pub mod signing;

pub use error::CanonicalError;
pub use signing::{FieldCanonicalizer, SigningField};
