use chrono::{DateTime, Utc};
use log::info;
use sqlx::{Connection, FromRow, PgConnection};

use crate::custody;
use crate::error::{ServiceError, ServiceResult};
use crate::models;

use super::ledger::fetch_open_issue_of_employee;
use super::DatabaseConnection;

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: i64,
    full_name: String,
    position: Option<String>,
    employee_number: String,
    created_at: DateTime<Utc>,
    photo_filename: Option<String>,
    photo_mime_type: Option<String>,
}

impl From<EmployeeRow> for models::Employee {
    fn from(row: EmployeeRow) -> Self {
        let photo = match (row.photo_filename, row.photo_mime_type) {
            (Some(filename), Some(mime_type)) => Some(models::Photo {
                filename,
                mime_type,
            }),
            _ => None,
        };

        Self {
            id: row.id as u64,
            full_name: row.full_name,
            position: row.position,
            employee_number: row.employee_number,
            created_at: row.created_at,
            photo,
        }
    }
}

const SELECT_EMPLOYEE: &str = r#"
    SELECT e.id, e.full_name, e.position, e.employee_number, e.created_at,
           p.filename AS photo_filename, p.mime_type AS photo_mime_type
    FROM employees e
    LEFT JOIN employee_photos p ON p.employee_id = e.id
"#;

/// Load an employee, optionally locking its row until the surrounding transaction ends.
pub(super) async fn fetch_employee(
    conn: &mut PgConnection,
    id: u64,
    for_update: bool,
) -> ServiceResult<Option<models::Employee>> {
    let sql = if for_update {
        format!("{SELECT_EMPLOYEE} WHERE e.id = $1 FOR UPDATE OF e")
    } else {
        format!("{SELECT_EMPLOYEE} WHERE e.id = $1")
    };

    let row = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(id as i64)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|r| r.into()))
}

impl DatabaseConnection {
    pub async fn get_all_employees(&mut self) -> ServiceResult<Vec<models::Employee>> {
        let rows = sqlx::query_as::<_, EmployeeRow>(&format!("{SELECT_EMPLOYEE} ORDER BY e.id"))
            .fetch_all(&mut *self.connection)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn get_employee_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Employee>> {
        fetch_employee(&mut self.connection, id, false).await
    }

    /// Insert (`id == 0`) or update an employee. The photo is managed by `set_employee_photo`.
    pub async fn store_employee(
        &mut self,
        employee: models::Employee,
    ) -> ServiceResult<models::Employee> {
        let duplicate: Option<i64> =
            sqlx::query_scalar("SELECT id FROM employees WHERE employee_number = $1 AND id <> $2")
                .bind(&employee.employee_number)
                .bind(employee.id as i64)
                .fetch_optional(&mut *self.connection)
                .await?;

        if duplicate.is_some() {
            return Err(ServiceError::Conflict(
                "An employee with this employee number already exists",
            ));
        }

        let id = if employee.id == 0 {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO employees (full_name, position, employee_number)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(&employee.full_name)
            .bind(&employee.position)
            .bind(&employee.employee_number)
            .fetch_one(&mut *self.connection)
            .await?;

            info!("Created employee '{}' with id {}", employee.full_name, id);
            id as u64
        } else {
            let result = sqlx::query(
                r#"
                UPDATE employees SET full_name = $2, position = $3, employee_number = $4
                WHERE id = $1
                "#,
            )
            .bind(employee.id as i64)
            .bind(&employee.full_name)
            .bind(&employee.position)
            .bind(&employee.employee_number)
            .execute(&mut *self.connection)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound("Employee not found"));
            }
            employee.id
        };

        self.get_employee_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Employee not found"))
    }

    /// Attach or replace the photo record of an employee, returns the replaced record.
    pub async fn set_employee_photo(
        &mut self,
        id: u64,
        photo: models::Photo,
    ) -> ServiceResult<Option<models::Photo>> {
        let mut tx = self.connection.begin().await?;

        let employee = fetch_employee(&mut tx, id, true)
            .await?
            .ok_or(ServiceError::NotFound("Employee not found"))?;

        sqlx::query(
            r#"
            INSERT INTO employee_photos (filename, mime_type, employee_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (employee_id)
            DO UPDATE SET filename = EXCLUDED.filename, mime_type = EXCLUDED.mime_type
            "#,
        )
        .bind(&photo.filename)
        .bind(&photo.mime_type)
        .bind(id as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(employee.photo)
    }

    /// Delete an employee together with the photo record, returns the removed photo record.
    ///
    /// Refused while the employee holds a device. Ledger rows keep existing with their
    /// employee reference cleared.
    pub async fn delete_employee(&mut self, id: u64) -> ServiceResult<Option<models::Photo>> {
        let mut tx = self.connection.begin().await?;

        let employee = fetch_employee(&mut tx, id, true)
            .await?
            .ok_or(ServiceError::NotFound("Employee not found"))?;

        let open_issue = fetch_open_issue_of_employee(&mut tx, id).await?;
        custody::check_employee_deletable(open_issue.as_ref())?;

        let issues =
            sqlx::query("UPDATE device_issues SET employee_id = NULL WHERE employee_id = $1")
                .bind(id as i64)
                .execute(&mut *tx)
                .await?;
        let returns =
            sqlx::query("UPDATE device_returns SET employee_id = NULL WHERE employee_id = $1")
                .bind(id as i64)
                .execute(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM employee_photos WHERE employee_id = $1")
            .bind(id as i64)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Deleted employee '{}', detached {} issues and {} returns",
            employee.full_name,
            issues.rows_affected(),
            returns.rows_affected()
        );
        Ok(employee.photo)
    }
}
