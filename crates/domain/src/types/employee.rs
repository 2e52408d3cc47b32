//! Employee directory entry
//!
//! Read-only view used to resolve names found in imported schedules to
//! employee records. Employee management itself lives elsewhere.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub tenant_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub active: bool,
}
