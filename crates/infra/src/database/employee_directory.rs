//! SQLite-backed implementation of the EmployeeDirectory port.

use std::sync::Arc;

use async_trait::async_trait;
use contendo_core::EmployeeDirectory;
use contendo_domain::{Employee, Result};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::manager::DbManager;
use crate::errors::InfraError;

/// SQLite implementation of the EmployeeDirectory port
pub struct SqliteEmployeeDirectory {
    db: Arc<DbManager>,
}

impl SqliteEmployeeDirectory {
    /// Create a new employee directory
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert an employee record. Employee management proper lives in another
    /// module; this exists for seeding and tests.
    pub fn insert_employee(
        &self,
        tenant_id: &str,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<Employee> {
        let employee = Employee {
            id: Uuid::now_v7().to_string(),
            tenant_id: tenant_id.to_string(),
            display_name: display_name.to_string(),
            email: email.map(str::to_string),
            active: true,
        };

        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO employees (id, tenant_id, display_name, email, active)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![employee.id, employee.tenant_id, employee.display_name, employee.email],
        )
        .map_err(InfraError::from)?;
        Ok(employee)
    }
}

fn map_employee_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        active: row.get(4)?,
    })
}

#[async_trait]
impl EmployeeDirectory for SqliteEmployeeDirectory {
    async fn resolve_name(&self, tenant_id: &str, name: &str) -> Result<Option<Employee>> {
        let conn = self.db.get()?;
        conn.query_row(
            "SELECT id, tenant_id, display_name, email, active
             FROM employees
             WHERE tenant_id = ?1 AND active = 1 AND LOWER(display_name) = LOWER(?2)
             LIMIT 1",
            params![tenant_id, name],
            map_employee_row,
        )
        .optional()
        .map_err(|e| InfraError::from(e).into())
    }
}
