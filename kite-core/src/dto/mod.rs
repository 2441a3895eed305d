//! Data Transfer Objects for coordinator communication
//!
//! Request and response bodies for the lifecycle endpoints. These are kept
//! deliberately narrow: start and finish only carry the fields the coordinator
//! needs, never the full job.

pub mod job;
pub mod oidc;
