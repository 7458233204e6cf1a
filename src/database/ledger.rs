use chrono::{DateTime, Utc};
use log::info;
use sqlx::{Connection, FromRow, PgConnection};

use crate::custody;
use crate::error::{ServiceError, ServiceResult};
use crate::models;

use super::devices::fetch_device;
use super::employees::fetch_employee;
use super::{corrupt_value, DatabaseConnection};

#[derive(Debug, FromRow)]
struct IssueRow {
    id: i64,
    device_id: Option<i64>,
    device_number: Option<String>,
    employee_id: Option<i64>,
    employee_name: Option<String>,
    issued_by_user_id: i64,
    issued_by_user_name: Option<String>,
    issue_date: DateTime<Utc>,
    status: String,
}

impl TryFrom<IssueRow> for models::Issue {
    type Error = ServiceError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        let status = models::IssueStatus::parse(&row.status)
            .ok_or_else(|| corrupt_value("device_issues.status", &row.status))?;

        Ok(Self {
            id: row.id as u64,
            device_id: row.device_id.map(|id| id as u64),
            device_number: row.device_number,
            employee_id: row.employee_id.map(|id| id as u64),
            employee_name: row.employee_name,
            issued_by_user_id: row.issued_by_user_id as u64,
            issued_by_user_name: row.issued_by_user_name,
            issue_date: row.issue_date,
            status,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReturnRow {
    id: i64,
    device_id: Option<i64>,
    device_number: Option<String>,
    employee_id: Option<i64>,
    employee_name: Option<String>,
    returned_by_user_id: i64,
    returned_by_user_name: Option<String>,
    return_date: DateTime<Utc>,
}

impl From<ReturnRow> for models::Return {
    fn from(row: ReturnRow) -> Self {
        Self {
            id: row.id as u64,
            device_id: row.device_id.map(|id| id as u64),
            device_number: row.device_number,
            employee_id: row.employee_id.map(|id| id as u64),
            employee_name: row.employee_name,
            returned_by_user_id: row.returned_by_user_id as u64,
            returned_by_user_name: row.returned_by_user_name,
            return_date: row.return_date,
        }
    }
}

const SELECT_ISSUE: &str = r#"
    SELECT i.id, i.device_id, d.number AS device_number,
           i.employee_id, e.full_name AS employee_name,
           i.issued_by_user_id, u.first_name || ' ' || u.last_name AS issued_by_user_name,
           i.issue_date, i.status
    FROM device_issues i
    LEFT JOIN devices d ON d.id = i.device_id
    LEFT JOIN employees e ON e.id = i.employee_id
    LEFT JOIN users u ON u.id = i.issued_by_user_id
"#;

const SELECT_RETURN: &str = r#"
    SELECT r.id, r.device_id, d.number AS device_number,
           r.employee_id, e.full_name AS employee_name,
           r.returned_by_user_id, u.first_name || ' ' || u.last_name AS returned_by_user_name,
           r.return_date
    FROM device_returns r
    LEFT JOIN devices d ON d.id = r.device_id
    LEFT JOIN employees e ON e.id = r.employee_id
    LEFT JOIN users u ON u.id = r.returned_by_user_id
"#;

async fn fetch_issue(conn: &mut PgConnection, id: i64) -> ServiceResult<Option<models::Issue>> {
    let row = sqlx::query_as::<_, IssueRow>(&format!("{SELECT_ISSUE} WHERE i.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;

    row.map(|r| r.try_into()).transpose()
}

/// The open issue an employee currently holds.
pub(super) async fn fetch_open_issue_of_employee(
    conn: &mut PgConnection,
    employee_id: u64,
) -> ServiceResult<Option<models::Issue>> {
    let row = sqlx::query_as::<_, IssueRow>(&format!(
        "{SELECT_ISSUE} WHERE i.employee_id = $1 AND i.status = 'issued'"
    ))
    .bind(employee_id as i64)
    .fetch_optional(conn)
    .await?;

    row.map(|r| r.try_into()).transpose()
}

async fn fetch_open_issue_of_pair(
    conn: &mut PgConnection,
    device_id: u64,
    employee_id: u64,
) -> ServiceResult<Option<models::Issue>> {
    let row = sqlx::query_as::<_, IssueRow>(&format!(
        "{SELECT_ISSUE} WHERE i.device_id = $1 AND i.employee_id = $2 AND i.status = 'issued'"
    ))
    .bind(device_id as i64)
    .bind(employee_id as i64)
    .fetch_optional(conn)
    .await?;

    row.map(|r| r.try_into()).transpose()
}

impl DatabaseConnection {
    /// Check out an available device to an employee.
    ///
    /// Device and employee rows stay locked from the precondition check until commit, so two
    /// concurrent checkouts of the same device or to the same employee cannot both succeed.
    pub async fn issue_device(
        &mut self,
        transfer: models::CustodyTransfer,
    ) -> ServiceResult<models::Issue> {
        let mut tx = self.connection.begin().await?;

        let device = fetch_device(&mut tx, transfer.device_id, true).await?;
        let employee = fetch_employee(&mut tx, transfer.employee_id, true).await?;
        let open_issue = fetch_open_issue_of_employee(&mut tx, transfer.employee_id).await?;

        custody::check_issue(device.as_ref(), employee.as_ref(), open_issue.as_ref())?;

        let issue_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO device_issues (device_id, employee_id, issued_by_user_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(transfer.device_id as i64)
        .bind(transfer.employee_id as i64)
        .bind(transfer.actor_user_id as i64)
        .bind(models::IssueStatus::Issued.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE devices SET status = $2 WHERE id = $1")
            .bind(transfer.device_id as i64)
            .bind(models::DeviceStatus::Issued.as_str())
            .execute(&mut *tx)
            .await?;

        let issue = fetch_issue(&mut tx, issue_id)
            .await?
            .ok_or(ServiceError::NotFound("Issue not found"))?;

        tx.commit().await?;

        info!(
            "Issued video recorder {} to employee {} by user {} (issue {})",
            transfer.device_id, transfer.employee_id, transfer.actor_user_id, issue.id
        );
        Ok(issue)
    }

    /// Check in a device from the employee it was issued to, closing the open issue.
    pub async fn return_device(
        &mut self,
        transfer: models::CustodyTransfer,
    ) -> ServiceResult<models::Return> {
        let mut tx = self.connection.begin().await?;

        let device = fetch_device(&mut tx, transfer.device_id, true).await?;
        let employee = fetch_employee(&mut tx, transfer.employee_id, true).await?;
        let open_issue =
            fetch_open_issue_of_pair(&mut tx, transfer.device_id, transfer.employee_id).await?;

        let closed_issue =
            custody::check_return(device.as_ref(), employee.as_ref(), open_issue.as_ref())?;

        let return_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO device_returns (device_id, employee_id, returned_by_user_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(transfer.device_id as i64)
        .bind(transfer.employee_id as i64)
        .bind(transfer.actor_user_id as i64)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE device_issues SET status = $2 WHERE id = $1")
            .bind(closed_issue.id as i64)
            .bind(models::IssueStatus::Returned.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE devices SET status = $2 WHERE id = $1")
            .bind(transfer.device_id as i64)
            .bind(models::DeviceStatus::Available.as_str())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ReturnRow>(&format!("{SELECT_RETURN} WHERE r.id = $1"))
            .bind(return_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Returned video recorder {} from employee {} by user {} (issue {}, return {})",
            transfer.device_id,
            transfer.employee_id,
            transfer.actor_user_id,
            closed_issue.id,
            return_id
        );
        Ok(row.into())
    }

    /// All issues and returns matching the filter, newest first.
    ///
    /// A `None` filter does not restrict, `Some(0)` matches id 0 like any other id.
    pub async fn get_history(
        &mut self,
        filter: models::HistoryFilter,
    ) -> ServiceResult<models::History> {
        let device_id = filter.device_id.map(|id| id as i64);
        let employee_id = filter.employee_id.map(|id| id as i64);

        let issues = sqlx::query_as::<_, IssueRow>(&format!(
            r#"{SELECT_ISSUE}
            WHERE ($1::BIGINT IS NULL OR i.device_id = $1)
              AND ($2::BIGINT IS NULL OR i.employee_id = $2)
            ORDER BY i.issue_date DESC, i.id DESC"#
        ))
        .bind(device_id)
        .bind(employee_id)
        .fetch_all(&mut *self.connection)
        .await?;

        let returns = sqlx::query_as::<_, ReturnRow>(&format!(
            r#"{SELECT_RETURN}
            WHERE ($1::BIGINT IS NULL OR r.device_id = $1)
              AND ($2::BIGINT IS NULL OR r.employee_id = $2)
            ORDER BY r.return_date DESC, r.id DESC"#
        ))
        .bind(device_id)
        .bind(employee_id)
        .fetch_all(&mut *self.connection)
        .await?;

        Ok(models::History {
            issues: issues
                .into_iter()
                .map(|r| r.try_into())
                .collect::<ServiceResult<_>>()?,
            returns: returns.into_iter().map(|r| r.into()).collect(),
        })
    }

    /// All issues that were not returned yet, newest first.
    pub async fn get_active_issues(&mut self) -> ServiceResult<Vec<models::Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            "{SELECT_ISSUE} WHERE i.status = 'issued' ORDER BY i.issue_date DESC, i.id DESC"
        ))
        .fetch_all(&mut *self.connection)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}
