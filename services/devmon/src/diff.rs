//! Field-wise comparison of device state snapshots

use std::collections::BTreeMap;

/// Field name to raw text value, as observed in one poll
pub type StateSnapshot = BTreeMap<String, String>;

/// Changed fields mapped to their new value
pub type ChangeSet = BTreeMap<String, String>;

/// Fields present in both snapshots whose text differs, with the current value.
///
/// Values are compared as raw strings, so `"1.0"` and `"1"` count as a change.
/// Fields that appear or disappear between polls are not reported.
pub fn diff(previous: &StateSnapshot, current: &StateSnapshot) -> ChangeSet {
    current
        .iter()
        .filter(|(field, value)| {
            previous
                .get(*field)
                .is_some_and(|old| old != *value)
        })
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}
