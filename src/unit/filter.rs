// src/unit/filter.rs

//! Selection of the units that take part in a run.
//!
//! Order of operations matters and is fixed: units that do not support the
//! current platform are dropped first, and only then is focus considered. A
//! focused unit on an unsupported platform therefore does not narrow the run.

use tracing::debug;

use super::UnitRef;

/// Units selected for one run, plus what was left out and why.
#[derive(Debug, Clone, Default)]
pub struct RunSet {
    units: Vec<UnitRef>,
    skipped_unsupported: usize,
    skipped_unfocused: usize,
    focus_applied: bool,
}

impl RunSet {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name().to_string()).collect()
    }

    /// Units dropped because they do not support the current platform.
    pub fn skipped_unsupported(&self) -> usize {
        self.skipped_unsupported
    }

    /// Supported units dropped because other units were focused.
    pub fn skipped_unfocused(&self) -> usize {
        self.skipped_unfocused
    }

    /// Whether at least one supported unit was focused.
    pub fn focus_applied(&self) -> bool {
        self.focus_applied
    }

    pub(crate) fn into_units(self) -> Vec<UnitRef> {
        self.units
    }
}

/// Filter candidates down to the run set.
///
/// 1. keep units where `supports_current_platform()` is true;
/// 2. if any of those is focused, keep only the focused ones.
pub fn select_run_set<I>(candidates: I) -> RunSet
where
    I: IntoIterator<Item = UnitRef>,
{
    let mut supported = Vec::new();
    let mut skipped_unsupported = 0;

    for unit in candidates {
        if unit.supports_current_platform() {
            supported.push(unit);
        } else {
            debug!(unit = unit.name(), "skipping unit: unsupported on this platform");
            skipped_unsupported += 1;
        }
    }

    let focus_applied = supported.iter().any(|u| u.is_focused());
    let mut skipped_unfocused = 0;

    if focus_applied {
        let before = supported.len();
        supported.retain(|u| u.is_focused());
        skipped_unfocused = before - supported.len();
        debug!(
            focused = supported.len(),
            skipped = skipped_unfocused,
            "focused units present; running only those"
        );
    }

    RunSet {
        units: supported,
        skipped_unsupported,
        skipped_unfocused,
        focus_applied,
    }
}
