//! Batching and quiet-hours filter.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{NotificationBatch, NotificationCandidate, QuietPolicy, QuietWindow};

/// Turn candidates into delivery batches.
///
/// - Escalations become single-candidate batches delivered at
///   `max(generated_at, now)`, ignoring quiet windows.
/// - Other candidates start from `max(generated_at, now)`. If that time falls
///   in a suppressing quiet window they are dropped; in a deferring one they
///   move to the window's end.
/// - The remaining candidates are grouped by batch key and by the
///   epoch-aligned `batch_window` bucket of their delivery time. A batch is
///   delivered at its latest member's time. A non-positive `batch_window`
///   gives every candidate its own batch.
///
/// Output is ordered by delivery time, then key, then the input position of
/// each batch's first candidate.
pub fn filter(
    candidates: &[NotificationCandidate],
    quiet_windows: &[QuietWindow],
    now: DateTime<Utc>,
    batch_window: Duration,
) -> Vec<NotificationBatch> {
    let bucket_secs = batch_window.num_seconds();
    let mut batches: Vec<(usize, NotificationBatch)> = Vec::new();
    let mut groups: BTreeMap<(String, i64), Vec<(usize, DateTime<Utc>, &NotificationCandidate)>> =
        BTreeMap::new();
    let mut suppressed = 0usize;
    let mut deferred = 0usize;

    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.action.is_escalation() {
            batches.push((
                index,
                NotificationBatch {
                    id: Uuid::new_v4(),
                    key: candidate.batch_key(),
                    deliver_at: candidate.generated_at.max(now),
                    escalated: true,
                    candidates: vec![candidate.clone()],
                },
            ));
            continue;
        }

        let earliest = candidate.generated_at.max(now);
        let Some(deliver_at) = delivery_time(earliest, quiet_windows) else {
            tracing::debug!(
                rule = %candidate.rule_id,
                subject = %candidate.subject,
                "notification suppressed by quiet window"
            );
            suppressed += 1;
            continue;
        };
        if deliver_at != earliest {
            tracing::debug!(
                rule = %candidate.rule_id,
                subject = %candidate.subject,
                %deliver_at,
                "notification deferred past quiet window"
            );
            deferred += 1;
        }

        let bucket = if bucket_secs > 0 {
            deliver_at.timestamp().div_euclid(bucket_secs)
        } else {
            index as i64
        };
        groups
            .entry((candidate.batch_key(), bucket))
            .or_default()
            .push((index, deliver_at, candidate));
    }

    for ((key, _), members) in groups {
        // Members arrive in input order
        let first = members.first().map_or(0, |(i, _, _)| *i);
        let deliver_at = members
            .iter()
            .map(|(_, at, _)| *at)
            .max()
            .unwrap_or(now);
        batches.push((
            first,
            NotificationBatch {
                id: Uuid::new_v4(),
                key,
                deliver_at,
                escalated: false,
                candidates: members.into_iter().map(|(_, _, c)| c.clone()).collect(),
            },
        ));
    }

    batches.sort_by(|(ia, a), (ib, b)| {
        a.deliver_at
            .cmp(&b.deliver_at)
            .then_with(|| a.key.cmp(&b.key))
            .then_with(|| ia.cmp(ib))
    });
    let batches: Vec<NotificationBatch> = batches.into_iter().map(|(_, b)| b).collect();

    tracing::info!(
        candidates = candidates.len(),
        batches = batches.len(),
        suppressed,
        deferred,
        "filtered notifications"
    );
    batches
}

/// Delivery time after applying quiet windows, or `None` if suppressed.
///
/// A deferred time that lands in another window is checked again, a bounded
/// number of times.
fn delivery_time(earliest: DateTime<Utc>, windows: &[QuietWindow]) -> Option<DateTime<Utc>> {
    let mut at = earliest;
    for _ in 0..=windows.len() {
        match windows.iter().find(|w| w.contains(at)) {
            None => return Some(at),
            Some(w) if w.policy == QuietPolicy::Suppress => return None,
            Some(w) => at = w.occurrence_end(at),
        }
    }
    Some(at)
}
