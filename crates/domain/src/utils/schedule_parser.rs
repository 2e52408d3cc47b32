//! Schedule text parser.
//!
//! Turns raw OCR output into candidate calendar events. The extractor
//! annotates the text with file and page markers; everything else is parsed
//! line by line with date/time/keyword heuristics and a per-pattern
//! confidence score.
//!
//! Parsing is deterministic: the same input text always yields the same
//! candidate list, which is what makes the reparse endpoint safe to call
//! repeatedly while an admin edits the text.

use chrono::{NaiveDate, NaiveTime};

use crate::types::{CandidateEvent, CandidateOrigin, EventKind, Provenance};

/// Marker emitted by the extractor before each file's text.
const FILE_MARKER_PREFIXES: [&str; 2] = ["=== archivo ", "=== file "];
/// Marker emitted by the extractor between pages.
const PAGE_MARKER_PREFIXES: [&str; 2] = ["--- página ", "--- page "];

/// Tokens that connect the two ends of a date range.
const RANGE_CONNECTORS: [&str; 4] = ["a", "al", "hasta", "-"];

/// Result of parsing a schedule text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSchedule {
    pub candidates: Vec<CandidateEvent>,
    /// Non-empty lines that produced no candidate (no recognizable date).
    pub skipped_lines: usize,
}

/// Parse raw schedule text into candidate events.
pub fn parse_schedule_text(text: &str) -> ParsedSchedule {
    let mut candidates = Vec::new();
    let mut skipped = 0usize;

    let mut file_index = 0usize;
    let mut page = 1u32;

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(index) = parse_file_marker(line) {
            file_index = index;
            page = 1;
            continue;
        }
        if let Some(page_no) = parse_page_marker(line) {
            page = page_no;
            continue;
        }

        let source = Provenance {
            file_index,
            page,
            line: line_no + 1,
            excerpt: line.to_string(),
        };

        match parse_line(line, source) {
            Some(candidate) => candidates.push(candidate),
            None => skipped += 1,
        }
    }

    ParsedSchedule { candidates, skipped_lines: skipped }
}

/// Parse a `=== archivo N: name ===` marker into a zero-based file index.
fn parse_file_marker(line: &str) -> Option<usize> {
    let lower = line.to_lowercase();
    for prefix in FILE_MARKER_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let number: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(n) = number.parse::<usize>() {
                return Some(n.saturating_sub(1));
            }
        }
    }
    None
}

/// Parse a `--- página N ---` marker.
fn parse_page_marker(line: &str) -> Option<u32> {
    let lower = line.to_lowercase();
    for prefix in PAGE_MARKER_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let number: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(n) = number.parse::<u32>() {
                return Some(n);
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenValue {
    Date,
    Time,
    Connector,
    Word,
}

/// Parse one schedule line into a candidate event, or `None` when the line
/// carries no recognizable date.
fn parse_line(line: &str, source: Provenance) -> Option<CandidateEvent> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut times: Vec<NaiveTime> = Vec::new();
    let mut words: Vec<&str> = Vec::new();
    let mut range_connected = false;
    let mut previous = TokenValue::Word;

    for token in &tokens {
        let trimmed = token.trim_matches(|c: char| ",;.()".contains(c));

        if let Some(date) = parse_date_token(trimmed) {
            if matches!(previous, TokenValue::Connector) && dates.len() == 1 {
                range_connected = true;
            }
            dates.push(date);
            previous = TokenValue::Date;
            continue;
        }
        if let Some((start, end)) = parse_time_pair_token(trimmed) {
            times.push(start);
            times.push(end);
            previous = TokenValue::Time;
            continue;
        }
        if let Some(time) = parse_time_token(trimmed) {
            times.push(time);
            previous = TokenValue::Time;
            continue;
        }
        if RANGE_CONNECTORS.contains(&trimmed.to_lowercase().as_str()) {
            previous = TokenValue::Connector;
            continue;
        }

        if !trimmed.is_empty() {
            words.push(trimmed);
        }
        previous = TokenValue::Word;
    }

    let first_date = *dates.first()?;

    let lower = line.to_lowercase();
    let (kind, keyword) = detect_kind(&lower);

    // Drop the keyword itself from the residual words before building the
    // title / employee name.
    let residual: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| {
            let lw = w.to_lowercase();
            keyword.map_or(true, |k| !k.split_whitespace().any(|part| part == lw))
        })
        .filter(|w| !matches!(w.to_lowercase().as_str(), "de" | "del" | "el" | "la" | "los"))
        .collect();
    let residual_text = residual.join(" ");

    let has_time_pair = times.len() >= 2;
    let has_date_range = range_connected && dates.len() >= 2;

    let (start, end, all_day) = if has_time_pair {
        (
            format_datetime(first_date, times[0]),
            Some(format_datetime(first_date, times[1])),
            false,
        )
    } else if has_date_range {
        (format_date(first_date), Some(format_date(dates[1])), true)
    } else {
        (format_date(first_date), None, true)
    };

    let employee_name = match kind {
        EventKind::Absence | EventKind::PlannedShift | EventKind::ActualShift => {
            extract_person_name(&residual)
        }
        _ => None,
    };

    let title = build_title(kind, keyword, &residual_text, employee_name.as_deref());

    let pattern = match (keyword.is_some(), has_time_pair, has_date_range) {
        (true, true, _) => "date_time_kind",
        (true, _, true) => "range_kind",
        (true, false, false) => "date_kind",
        (false, _, _) => "date_only",
    };

    Some(CandidateEvent {
        kind,
        title,
        start,
        end,
        all_day,
        employee_name,
        status: None,
        confidence: pattern_confidence(pattern),
        origin: CandidateOrigin::Ocr,
        source,
    })
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(token, format) {
            return Some(date);
        }
    }
    None
}

fn parse_time_token(token: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(token, "%H:%M").ok()
}

/// Parse a compact `HH:MM-HH:MM` pair.
fn parse_time_pair_token(token: &str) -> Option<(NaiveTime, NaiveTime)> {
    let (left, right) = token.split_once('-')?;
    Some((parse_time_token(left)?, parse_time_token(right)?))
}

/// Map schedule vocabulary to an event kind.
fn detect_kind(lower_line: &str) -> (EventKind, Option<&'static str>) {
    const ABSENCE: [&str; 4] = ["vacaciones", "ausencia", "baja", "permiso"];
    const NON_WORKING: [&str; 3] = ["festivo", "feriado", "no laborable"];
    const PLANNED_SHIFT: [&str; 2] = ["turno", "jornada"];
    const ACTUAL_SHIFT: [&str; 1] = ["fichaje"];

    for keyword in ABSENCE {
        if lower_line.contains(keyword) {
            return (EventKind::Absence, Some(keyword));
        }
    }
    for keyword in NON_WORKING {
        if lower_line.contains(keyword) {
            return (EventKind::NonWorkingDay, Some(keyword));
        }
    }
    for keyword in ACTUAL_SHIFT {
        if lower_line.contains(keyword) {
            return (EventKind::ActualShift, Some(keyword));
        }
    }
    for keyword in PLANNED_SHIFT {
        if lower_line.contains(keyword) {
            return (EventKind::PlannedShift, Some(keyword));
        }
    }
    (EventKind::CompanyCalendar, None)
}

/// Pick the longest run of capitalized words as the employee name.
fn extract_person_name(words: &[&str]) -> Option<String> {
    let mut best: Vec<&str> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in words {
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        if capitalized {
            current.push(word);
        } else {
            if current.len() > best.len() {
                best = current.clone();
            }
            current.clear();
        }
    }
    if current.len() > best.len() {
        best = current;
    }

    if best.is_empty() {
        None
    } else {
        Some(best.join(" "))
    }
}

fn build_title(
    kind: EventKind,
    keyword: Option<&str>,
    residual: &str,
    employee_name: Option<&str>,
) -> String {
    match kind {
        EventKind::CompanyCalendar => {
            if residual.is_empty() {
                "Evento de calendario".to_string()
            } else {
                residual.to_string()
            }
        }
        EventKind::NonWorkingDay => {
            if residual.is_empty() {
                capitalize(keyword.unwrap_or("festivo"))
            } else {
                residual.to_string()
            }
        }
        _ => {
            let label = capitalize(keyword.unwrap_or("turno"));
            match employee_name {
                Some(name) => format!("{label} - {name}"),
                None => label,
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => {
            let mut result = first.to_uppercase().collect::<String>();
            result.push_str(chars.as_str());
            result
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_datetime(date: NaiveDate, time: NaiveTime) -> String {
    format!("{}T{}", date.format("%Y-%m-%d"), time.format("%H:%M:%S"))
}

/// Confidence score for recognised parsing patterns.
fn pattern_confidence(pattern: &str) -> f32 {
    match pattern {
        "date_time_kind" => 0.90,
        "range_kind" => 0.85,
        "date_kind" => 0.80,
        "date_only" => 0.60,
        _ => 0.50,
    }
}
