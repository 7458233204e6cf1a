use chrono::{DateTime, Utc};
use log::info;
use sqlx::{Connection, FromRow, PgConnection};

use crate::custody;
use crate::error::{ServiceError, ServiceResult};
use crate::models;

use super::{corrupt_value, DatabaseConnection};

#[derive(Debug, FromRow)]
struct DeviceRow {
    id: i64,
    number: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for models::Device {
    type Error = ServiceError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let status = models::DeviceStatus::parse(&row.status)
            .ok_or_else(|| corrupt_value("devices.status", &row.status))?;

        Ok(Self {
            id: row.id as u64,
            number: row.number,
            status,
            created_at: row.created_at,
        })
    }
}

/// Load a device, optionally locking its row until the surrounding transaction ends.
pub(super) async fn fetch_device(
    conn: &mut PgConnection,
    id: u64,
    for_update: bool,
) -> ServiceResult<Option<models::Device>> {
    let sql = if for_update {
        "SELECT id, number, status, created_at FROM devices WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, number, status, created_at FROM devices WHERE id = $1"
    };

    let row = sqlx::query_as::<_, DeviceRow>(sql)
        .bind(id as i64)
        .fetch_optional(conn)
        .await?;

    row.map(|r| r.try_into()).transpose()
}

impl DatabaseConnection {
    pub async fn get_all_devices(&mut self) -> ServiceResult<Vec<models::Device>> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, number, status, created_at FROM devices ORDER BY id",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn get_device_by_id(&mut self, id: u64) -> ServiceResult<Option<models::Device>> {
        fetch_device(&mut self.connection, id, false).await
    }

    /// Insert (`id == 0`) or update a device.
    ///
    /// Only the number is written. The status column belongs to the custody ledger.
    pub async fn store_device(&mut self, device: models::Device) -> ServiceResult<models::Device> {
        let duplicate: Option<i64> =
            sqlx::query_scalar("SELECT id FROM devices WHERE number = $1 AND id <> $2")
                .bind(&device.number)
                .bind(device.id as i64)
                .fetch_optional(&mut *self.connection)
                .await?;

        if duplicate.is_some() {
            return Err(ServiceError::Conflict(
                "A video recorder with this number already exists",
            ));
        }

        let id = if device.id == 0 {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO devices (number, status) VALUES ($1, $2) RETURNING id",
            )
            .bind(&device.number)
            .bind(models::DeviceStatus::Available.as_str())
            .fetch_one(&mut *self.connection)
            .await?;

            info!("Created video recorder '{}' with id {}", device.number, id);
            id as u64
        } else {
            let result = sqlx::query("UPDATE devices SET number = $2 WHERE id = $1")
                .bind(device.id as i64)
                .bind(&device.number)
                .execute(&mut *self.connection)
                .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound("Video recorder not found"));
            }
            device.id
        };

        self.get_device_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Video recorder not found"))
    }

    /// Delete an available device. Ledger rows keep existing with their device reference cleared.
    pub async fn delete_device(&mut self, id: u64) -> ServiceResult<()> {
        let mut tx = self.connection.begin().await?;

        let device = fetch_device(&mut tx, id, true)
            .await?
            .ok_or(ServiceError::NotFound("Video recorder not found"))?;
        custody::check_device_deletable(&device)?;

        let issues = sqlx::query("UPDATE device_issues SET device_id = NULL WHERE device_id = $1")
            .bind(id as i64)
            .execute(&mut *tx)
            .await?;
        let returns = sqlx::query("UPDATE device_returns SET device_id = NULL WHERE device_id = $1")
            .bind(id as i64)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "Deleted video recorder '{}', detached {} issues and {} returns",
            device.number,
            issues.rows_affected(),
            returns.rows_affected()
        );
        Ok(())
    }
}
