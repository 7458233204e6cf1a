use log::info;
use sqlx::FromRow;

use crate::error::{ServiceError, ServiceResult};
use crate::models;

use super::DatabaseConnection;

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: Option<String>,
}

impl From<RoleRow> for models::RoleEntry {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id as u64,
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: Vec<u8>,
    last_name: String,
    first_name: String,
    middle_name: Option<String>,
    role_id: i64,
    role_name: String,
}

impl From<UserRow> for models::User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id as u64,
            username: row.username,
            password_hash: row.password_hash,
            last_name: row.last_name,
            first_name: row.first_name,
            middle_name: row.middle_name,
            role_id: row.role_id as u64,
            role_name: row.role_name,
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.username, u.password_hash, u.last_name, u.first_name, u.middle_name,
           u.role_id, r.name AS role_name
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

impl DatabaseConnection {
    /// Create the `admin` and `operator` roles if they are missing. Safe to call on every start.
    pub async fn ensure_seed_roles(&mut self) -> ServiceResult<()> {
        for role in models::Role::SEED {
            let result = sqlx::query(
                "INSERT INTO roles (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(role.name())
            .bind(role.description())
            .execute(&mut *self.connection)
            .await?;

            if result.rows_affected() > 0 {
                info!("Created role '{}'", role.name());
            }
        }

        Ok(())
    }

    pub async fn get_role_by_id(&mut self, id: u64) -> ServiceResult<Option<models::RoleEntry>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description FROM roles WHERE id = $1",
        )
        .bind(id as i64)
        .fetch_optional(&mut *self.connection)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn get_role_by_name(
        &mut self,
        role: models::Role,
    ) -> ServiceResult<Option<models::RoleEntry>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description FROM roles WHERE name = $1",
        )
        .bind(role.name())
        .fetch_optional(&mut *self.connection)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn get_user_by_id(&mut self, id: u64) -> ServiceResult<Option<models::User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(id as i64)
            .fetch_optional(&mut *self.connection)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn get_user_by_username(
        &mut self,
        username: &str,
    ) -> ServiceResult<Option<models::User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE u.username = $1"))
            .bind(username)
            .fetch_optional(&mut *self.connection)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn create_user(&mut self, user: models::NewUser) -> ServiceResult<models::User> {
        if self.get_user_by_username(&user.username).await?.is_some() {
            return Err(ServiceError::Conflict(
                "A user with this username already exists",
            ));
        }

        if self.get_role_by_id(user.role_id).await?.is_none() {
            return Err(ServiceError::NotFound("Role not found"));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password_hash, last_name, first_name, middle_name, role_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.last_name)
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(user.role_id as i64)
        .fetch_one(&mut *self.connection)
        .await?;

        info!("Created user '{}' with id {}", user.username, id);

        self.get_user_by_id(id as u64)
            .await?
            .ok_or(ServiceError::NotFound("User not found"))
    }

    pub async fn update_user_password(
        &mut self,
        id: u64,
        password_hash: Vec<u8>,
    ) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id as i64)
            .bind(password_hash)
            .execute(&mut *self.connection)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("User not found"));
        }

        Ok(())
    }
}
