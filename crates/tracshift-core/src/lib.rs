//! tracshift-core library.
//!
//! Replays a legacy Trac ticket's full field-change history as an ordered
//! sequence of GitHub issue mutations: one issue per ticket, one mutation
//! per change event, in timestamp order.
//!
//! # Conventions
//!
//! - **Errors**: module-local `thiserror` enums at component seams,
//!   `anyhow::Result` at orchestration level.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).
//!   Every mutation attempted and every skip decision is logged so a run
//!   can be audited and resumed from a ticket id.

pub mod cancel;
pub mod config;
pub mod driver;
pub mod error;
pub mod github;
pub mod labels;
pub mod markup;
pub mod model;
pub mod replay;
pub mod resolve;
pub mod store;
