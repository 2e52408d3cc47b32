//! Structural diff between candidate-event sets
//!
//! Matches candidates by identity key and reports what an admin would see
//! change if one set replaced the other.

use std::collections::BTreeMap;

use chrono::DateTime;
use contendo_domain::{
    BatchComparison, CalendarEvent, CandidateDiff, CandidateEvent, CandidateOrigin, DiffKind,
    Provenance,
};

/// Identity key a candidate is matched on across sets.
pub fn candidate_key(candidate: &CandidateEvent) -> String {
    let who = candidate
        .employee_name
        .as_deref()
        .unwrap_or(&candidate.title)
        .to_lowercase();
    format!("{}|{}|{}", candidate.kind.as_str(), candidate.start, who)
}

/// Diff `before` against `after`: entries present only in `after` are
/// `Added`, only in `before` are `Removed`, in both but different are
/// `Changed`.
pub fn diff_candidates(before: &[CandidateEvent], after: &[CandidateEvent]) -> BatchComparison {
    let mut before_by_key: BTreeMap<String, &CandidateEvent> = BTreeMap::new();
    for candidate in before {
        before_by_key.insert(candidate_key(candidate), candidate);
    }

    let mut comparison = BatchComparison::default();
    let mut seen: Vec<String> = Vec::new();

    for candidate in after {
        let key = candidate_key(candidate);
        match before_by_key.get(&key) {
            None => {
                comparison.added += 1;
                comparison.entries.push(CandidateDiff {
                    kind: DiffKind::Added,
                    key,
                    before: None,
                    after: Some(candidate.clone()),
                    changed_fields: vec![],
                });
            }
            Some(previous) => {
                seen.push(key.clone());
                let fields = changed_fields(previous, candidate);
                if !fields.is_empty() {
                    comparison.changed += 1;
                    comparison.entries.push(CandidateDiff {
                        kind: DiffKind::Changed,
                        key,
                        before: Some((*previous).clone()),
                        after: Some(candidate.clone()),
                        changed_fields: fields,
                    });
                }
            }
        }
    }

    for (key, candidate) in before_by_key {
        if !seen.contains(&key) {
            comparison.removed += 1;
            comparison.entries.push(CandidateDiff {
                kind: DiffKind::Removed,
                key,
                before: Some(candidate.clone()),
                after: None,
                changed_fields: vec![],
            });
        }
    }

    comparison
}

fn changed_fields(before: &CandidateEvent, after: &CandidateEvent) -> Vec<String> {
    let mut fields = Vec::new();
    if before.title != after.title {
        fields.push("title".to_string());
    }
    if before.end != after.end {
        fields.push("end".to_string());
    }
    if before.all_day != after.all_day {
        fields.push("all_day".to_string());
    }
    if before.status != after.status {
        fields.push("status".to_string());
    }
    fields
}

/// Project a stored event into candidate shape so batches can be diffed
/// against the current Event Store.
pub fn event_to_candidate(event: &CalendarEvent) -> CandidateEvent {
    CandidateEvent {
        kind: event.kind,
        title: event.title.clone(),
        start: format_ts(event.start_ts, event.all_day),
        end: event.end_ts.map(|ts| format_ts(ts, event.all_day)),
        all_day: event.all_day,
        employee_name: None,
        status: event.status,
        confidence: 1.0,
        origin: CandidateOrigin::Manual,
        source: Provenance::default(),
    }
}

fn format_ts(ts: i64, all_day: bool) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) if all_day => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}
