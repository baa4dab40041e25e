//! # memberhub-entity
//!
//! Domain entity models for MemberHub. Every struct in this crate represents
//! a database table row or a domain value object. Row types derive
//! `sqlx::FromRow`; domain types derive `Serialize` and `Deserialize` so they
//! can travel through task arguments and CLI output.

pub mod node;
pub mod task;
pub mod tenant;
pub mod theme;
