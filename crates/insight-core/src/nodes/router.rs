//! Router
//!
//! Maps the routing label and retry history to the next step. Termination
//! holds by construction: a `Generate` route is only returned while
//! `retry_count < max_retries`, and every such route increments the count.

use crate::state::{StateUpdate, StepKind};
use crate::types::RoutingLabel;

/// Next step chosen by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Regenerate; carries the incremented retry count
    Generate { retry_count: u32 },
    /// Format the accumulated insights
    Format {
        /// Regeneration budget exhausted while quality was still low
        forced: bool,
    },
}

/// Transition table
#[must_use]
pub fn route(label: RoutingLabel, retry_count: u32, max_retries: u32) -> Route {
    match label {
        RoutingLabel::Continue | RoutingLabel::End => Route::Format { forced: false },
        RoutingLabel::Regenerate if retry_count < max_retries => Route::Generate {
            retry_count: retry_count + 1,
        },
        RoutingLabel::Regenerate => Route::Format { forced: true },
    }
}

/// Router step: the route plus the `retry_count` update it implies
pub fn run(label: RoutingLabel, retry_count: u32, max_retries: u32) -> (Route, Option<StateUpdate>) {
    let next = route(label, retry_count, max_retries);
    tracing::debug!(%label, retry_count, max_retries, route = ?next, "routing");
    let update = match next {
        Route::Generate { retry_count } => {
            Some(StateUpdate::new(StepKind::Router).replace_retry_count(retry_count))
        }
        Route::Format { .. } => None,
    };
    (next, update)
}
