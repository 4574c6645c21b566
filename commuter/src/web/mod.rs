//! Web layer for the departure viewer.
//!
//! A JSON API over the favorites store, the departure provider, the preview
//! cache and the sync bridge.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
