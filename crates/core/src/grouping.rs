//! Temporal grouping of time-stamped records.
//!
//! Records are sorted by start time and scanned once. A running group keeps
//! the latest end time seen so far; the next record joins the group when it
//! starts at or before that end (overlapping or touching), otherwise the
//! group is closed and a new one begins.

use crate::interval::TimeInterval;

/// Group records into maximal runs of chain-adjacent intervals.
///
/// The returned groups are non-empty, in ascending start order, and
/// partition the input exactly. The sort is stable, so records that tie on
/// start time keep their input order.
pub fn group_adjacent<T, F>(records: Vec<T>, interval_of: F) -> Vec<Vec<T>>
where
    F: Fn(&T) -> TimeInterval,
{
    let mut keyed: Vec<(TimeInterval, T)> =
        records.into_iter().map(|r| (interval_of(&r), r)).collect();
    keyed.sort_by_key(|(interval, _)| interval.start());

    let mut groups: Vec<Vec<T>> = Vec::new();
    let mut running: Option<(Vec<T>, TimeInterval)> = None;

    for (interval, record) in keyed {
        running = Some(match running.take() {
            Some((mut members, reach)) if reach.is_adjacent_to(&interval) => {
                members.push(record);
                let reach = if interval.end() > reach.end() {
                    interval
                } else {
                    reach
                };
                (members, reach)
            }
            Some((members, _)) => {
                groups.push(members);
                (vec![record], interval)
            }
            None => (vec![record], interval),
        });
    }

    if let Some((members, _)) = running {
        groups.push(members);
    }
    groups
}
