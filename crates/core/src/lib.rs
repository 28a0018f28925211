//! Storegate Core - Shared types library.
//!
//! This crate provides the types shared by the Storegate components:
//! - `server` - HTTP entry point (ingress pipeline, API collaborators, SPA hosting)
//! - `cli` - Command-line tools for migrations
//!
//! # Architecture
//!
//! The core crate contains only types and pure values - no I/O, no database
//! access, no HTTP stack. Policy values are built once at startup and handed
//! to the server's pipeline stages by reference.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and emails
//! - [`policy`] - Immutable ingress policy values (CSP, origins, hidden paths)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod policy;
pub mod types;

pub use policy::{ContentSecurityPolicy, HiddenPathPattern, OriginAllowList, PolicyError};
pub use types::*;
