//! Calendar event types
//!
//! A `CalendarEvent` is the durable record the Event Store manages: company
//! calendar entries, non-working days, absences, and shifts. Timestamps are
//! Unix epoch seconds, matching the storage layer convention.

use serde::{Deserialize, Serialize};

use crate::errors::{ContendoError, Result};

/// Discriminates what an event represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    CompanyCalendar,
    NonWorkingDay,
    Absence,
    ActualShift,
    PlannedShift,
}

impl EventKind {
    /// Text stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyCalendar => "company-calendar",
            Self::NonWorkingDay => "non-working-day",
            Self::Absence => "absence",
            Self::ActualShift => "actual-shift",
            Self::PlannedShift => "planned-shift",
        }
    }

    /// Parse the stored text form back into the enum.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "company-calendar" => Ok(Self::CompanyCalendar),
            "non-working-day" => Ok(Self::NonWorkingDay),
            "absence" => Ok(Self::Absence),
            "actual-shift" => Ok(Self::ActualShift),
            "planned-shift" => Ok(Self::PlannedShift),
            other => Err(ContendoError::Validation(format!("unknown event kind: {other}"))),
        }
    }
}

/// Status, meaningful for absences and actual shifts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Approved,
    Rejected,
    Open,
    Closed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(ContendoError::Validation(format!("unknown event status: {other}"))),
        }
    }
}

/// Durable calendar event row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub tenant_id: String,
    pub kind: EventKind,
    pub title: String,
    pub start_ts: i64,
    pub end_ts: Option<i64>,
    pub all_day: bool,
    pub status: Option<EventStatus>,
    pub employee_id: Option<String>,
    /// Provider-side event id once synced to the external calendar.
    pub external_id: Option<String>,
    pub metadata: serde_json::Value,
    /// Optimistic stamp, incremented on every mutation. Captured at import
    /// confirm time and checked again during undo.
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Parameters for inserting a new calendar event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventParams {
    pub kind: EventKind,
    pub title: String,
    pub start_ts: i64,
    pub end_ts: Option<i64>,
    pub all_day: bool,
    pub status: Option<EventStatus>,
    pub employee_id: Option<String>,
    pub external_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CalendarEventParams {
    /// Check the interval invariant: `end_ts` is absent or >= `start_ts`.
    pub fn validate(&self) -> Result<()> {
        if let Some(end) = self.end_ts {
            if end < self.start_ts {
                return Err(ContendoError::Validation(format!(
                    "event '{}' ends before it starts",
                    self.title
                )));
            }
        }
        Ok(())
    }
}
