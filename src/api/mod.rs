//! HTTP API module for the salary grading service.
//!
//! This module provides the REST endpoints for calculating grade tables and
//! managing scenarios across grading systems.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{
    ACTOR_HEADER, ANONYMOUS_ACTOR, Actor, CalculateRequest, ListParams, SaveDraftRequest,
};
pub use response::{ApiError, ApiErrorResponse, CalculateFailure, CalculateResponse};
pub use state::AppState;
