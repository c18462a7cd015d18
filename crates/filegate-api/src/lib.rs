//! Filegate API Library
//!
//! HTTP handlers, request parameter parsing and application setup for the
//! file gateway.

mod handlers;
mod telemetry;
mod utils;

pub mod error;
pub mod params;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
