//! Mode selection.

use std::collections::HashMap;

use tracing::debug;

use super::{RouteEstimate, TravelMode};
use crate::config::ModePreferences;

/// Pick the route the user should take, or `None` when no enabled mode
/// fits inside its budget.
///
/// Candidates are the enabled modes (budget > 0) that produced an
/// estimate, sorted ascending by budget. The first candidate whose
/// budget covers its travel time (inclusive) wins: among acceptable
/// modes the engine prefers the one with the tightest budget, because a
/// tighter budget means a later, more useful departure alarm. Ties keep
/// the canonical mode order.
pub fn select_mode(
    prefs: &ModePreferences,
    estimates: &HashMap<TravelMode, RouteEstimate>,
) -> Option<RouteEstimate> {
    let mut candidates: Vec<(i64, &RouteEstimate)> = TravelMode::ALL
        .iter()
        .filter(|mode| prefs.budget(**mode) > 0)
        .filter_map(|mode| estimates.get(mode).map(|e| (prefs.budget(*mode), e)))
        .collect();
    candidates.sort_by_key(|(budget, _)| *budget);

    debug!(
        "Mode candidates: {:?}",
        candidates
            .iter()
            .map(|(budget, e)| (e.mode, *budget, e.total_duration_secs))
            .collect::<Vec<_>>()
    );

    candidates
        .into_iter()
        .find(|(budget, estimate)| *budget >= estimate.total_duration_secs)
        .map(|(_, estimate)| estimate.clone())
}
