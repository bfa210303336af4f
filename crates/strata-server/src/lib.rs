//! # Strata Server
//!
//! Hosts a [`strata_world::World`] for connected clients.
//!
//! This crate handles:
//! - Server configuration
//! - Client tracking and area loading on movement
//! - The operator console

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod console;
pub mod players;
