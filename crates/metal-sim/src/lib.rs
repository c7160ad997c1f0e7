//! Bare metal provisioning API simulator for CTO Platform tests.
//!
//! This crate keeps an in-memory model of servers, ports and their
//! provisioning state, and answers the provisioning API the same way a real
//! backend would, including actions that stay "in progress" for a while
//! before settling.
//!
//! # Example
//!
//! ```rust,ignore
//! use metal_sim::{Engine, Seed};
//! use metal_sim::models::OsInstallParameter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(Seed::sample())?;
//!
//!     let params = OsInstallParameter { os_image_id: "ubuntu-24.04".into() };
//!     engine.os_install("100000000001", &params).await?;
//!
//!     // Locked until the background install finishes
//!     assert!(engine.read_server("100000000001").await?.lock_status.is_some());
//!     engine.wait_for_actions().await;
//!
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod error;
pub mod http;
pub mod models;
pub mod seed;

pub use engine::Engine;
pub use error::{EngineError, ResourceKind, SeedError};
pub use http::build_router;
pub use seed::{Seed, ServerRecord};
