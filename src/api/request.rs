//! Request types for the salary grading API.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{RawIntervals, RawRateMap, ScenarioStatus};
use crate::repository::ScenarioQuery;

/// Header carrying the caller's identity.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Actor recorded when no identity header is sent.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// Request body for `calculate`.
///
/// Rate values are kept raw so the validator can tell an absent value from an
/// invalid one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculateRequest {
    /// Base level lower decile; a number or numeric string.
    #[serde(default)]
    pub base_value: Value,
    /// Per-level rates keyed by level name.
    #[serde(default, alias = "rate_map")]
    pub rates: RawRateMap,
    /// Horizontal intervals shared by every level.
    #[serde(default)]
    pub global_horizontal_intervals: Option<RawIntervals>,
}

/// Request body for creating a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDraftRequest {
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Base level lower decile.
    #[serde(default)]
    pub base_value: Value,
    /// Level order as the client saw it; replaced by the hierarchy order on save.
    #[serde(default)]
    pub level_order: Vec<String>,
    /// Per-level rates keyed by level name.
    #[serde(default, alias = "rate_map")]
    pub rates: RawRateMap,
    /// Grades the client calculated; compared against the server result only.
    #[serde(default)]
    pub calculated_outputs: Option<Value>,
    /// Horizontal intervals shared by every level.
    #[serde(default)]
    pub global_horizontal_intervals: Option<RawIntervals>,
}

/// Query string of the scenario listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    /// Substring matched against name and description.
    pub search: Option<String>,
    /// `DRAFT`, `CURRENT` or `ARCHIVED` (any case).
    pub status: Option<String>,
    /// `name`, `created_at`, `calculated_at` or `applied_at`, `-` prefixed for descending.
    pub ordering: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
    /// Items per page, capped by the service configuration.
    pub page_size: Option<usize>,
}

impl ListParams {
    /// Converts the parameters into a repository query.
    pub fn into_query(self, service: &ServiceConfig) -> EngineResult<ScenarioQuery> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_status(raw)?),
        };
        let ordering = match self.ordering.as_deref().map(str::trim) {
            None | Some("") => Default::default(),
            Some(raw) => raw.parse()?,
        };
        let page_size = self
            .page_size
            .unwrap_or(service.page_size)
            .clamp(1, service.max_page_size);

        Ok(ScenarioQuery {
            search: self.search,
            status,
            ordering,
            page: self.page.unwrap_or(1).max(1),
            page_size,
        })
    }
}

fn parse_status(raw: &str) -> EngineResult<ScenarioStatus> {
    match raw.to_ascii_uppercase().as_str() {
        "DRAFT" => Ok(ScenarioStatus::Draft),
        "CURRENT" => Ok(ScenarioStatus::Current),
        "ARCHIVED" => Ok(ScenarioStatus::Archived),
        _ => Err(EngineError::InvalidInput {
            field: "status".to_string(),
            message: format!("unknown status '{}'", raw),
        }),
    }
}

/// The caller's identity, taken from the `X-Actor-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(ANONYMOUS_ACTOR);
        Ok(Actor(actor.to_string()))
    }
}
