use log::info;
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::auth::TokenKeys;
use crate::error::{ServiceError, ServiceResult};
use crate::photo_store::PhotoStore;

mod devices;
mod employees;
mod ledger;
mod migration;
mod users;


#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub tokens: TokenKeys,
    pub photos: PhotoStore,
}

impl AppState {
    pub async fn connect(
        url: &str,
        tokens: TokenKeys,
        photos: PhotoStore,
    ) -> ServiceResult<AppState> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        AppState::from_pool(pool, tokens, photos).await
    }

    pub async fn from_pool(
        pool: Pool<Postgres>,
        tokens: TokenKeys,
        photos: PhotoStore,
    ) -> ServiceResult<AppState> {
        run_migrations(&pool).await?;

        Ok(AppState {
            pool,
            tokens,
            photos,
        })
    }

    pub async fn connection(&self) -> ServiceResult<DatabaseConnection> {
        let connection = self.pool.acquire().await?;
        Ok(DatabaseConnection { connection })
    }
}

pub async fn run_migrations(pool: &Pool<Postgres>) -> ServiceResult<()> {
    let migrator = Migrator::new(migration::postgresql_migrations()).await?;
    migrator.run(pool).await?;
    info!("Database migrations are up to date");
    Ok(())
}

pub struct DatabaseConnection {
    pub connection: PoolConnection<Postgres>,
}

fn corrupt_value(column: &str, value: &str) -> ServiceError {
    ServiceError::InternalServerError(format!("Unexpected value '{value}' in column '{column}'"))
}
