//! Listing, filtering, and pagination of scenarios.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{Scenario, ScenarioStatus};

/// Field a scenario listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    /// Scenario name.
    Name,
    /// Creation timestamp.
    CreatedAt,
    /// Last calculation timestamp.
    CalculatedAt,
    /// Application timestamp.
    AppliedAt,
}

/// An ordering such as `name` or `-created_at` (leading `-` for descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioOrdering {
    /// The field to order by.
    pub field: OrderField,
    /// Whether to order from largest to smallest.
    pub descending: bool,
}

impl Default for ScenarioOrdering {
    fn default() -> Self {
        Self {
            field: OrderField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for ScenarioOrdering {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "name" => OrderField::Name,
            "created_at" => OrderField::CreatedAt,
            "calculated_at" => OrderField::CalculatedAt,
            "applied_at" => OrderField::AppliedAt,
            other => {
                return Err(EngineError::InvalidInput {
                    field: "ordering".to_string(),
                    message: format!(
                        "unknown field '{}' (expected name, created_at, calculated_at or applied_at)",
                        other
                    ),
                });
            }
        };
        Ok(Self { field, descending })
    }
}

impl ScenarioOrdering {
    fn compare(&self, a: &Scenario, b: &Scenario) -> Ordering {
        let primary = match self.field {
            OrderField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            OrderField::CreatedAt => a.created_at.cmp(&b.created_at),
            OrderField::CalculatedAt => a.calculated_at.cmp(&b.calculated_at),
            OrderField::AppliedAt => a.applied_at.cmp(&b.applied_at),
        };
        let primary = if self.descending {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Filters and paging for a scenario listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioQuery {
    /// Case-insensitive substring matched against name and description.
    pub search: Option<String>,
    /// Only scenarios with this status.
    pub status: Option<ScenarioStatus>,
    /// Sort order.
    pub ordering: ScenarioOrdering,
    /// 1-based page number.
    pub page: usize,
    /// Items per page.
    pub page_size: usize,
}

impl Default for ScenarioQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            ordering: ScenarioOrdering::default(),
            page: 1,
            page_size: 20,
        }
    }
}

impl ScenarioQuery {
    fn matches(&self, scenario: &Scenario) -> bool {
        if self.status.is_some_and(|status| status != scenario.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                scenario.name.to_lowercase().contains(&term)
                    || scenario.description.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items across all pages.
    pub total: usize,
    /// 1-based page number.
    pub page: usize,
    /// Requested page size.
    pub page_size: usize,
    /// Number of pages.
    pub total_pages: usize,
}

/// Filters, orders, and pages a set of scenarios.
pub fn run_query(scenarios: Vec<Scenario>, query: &ScenarioQuery) -> Page<Scenario> {
    let mut matching: Vec<Scenario> = scenarios.into_iter().filter(|s| query.matches(s)).collect();
    matching.sort_by(|a, b| query.ordering.compare(a, b));

    let page_size = query.page_size.max(1);
    let page = query.page.max(1);
    let total = matching.len();
    let items = matching
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        total,
        page,
        page_size,
        total_pages: total.div_ceil(page_size),
    }
}
