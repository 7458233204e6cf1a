use std::io::Write;
use std::sync::Arc;

use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::openapi::OpenApi;
use axum::{Extension, Json};
use chrono::Duration;
use clap::{Parser, Subcommand};
use log::info;
use schemars::JsonSchema;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::auth::{password_hash_create, TokenKeys};
use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::photo_store::PhotoStore;

mod api;
mod auth;
mod custody;
mod database;
mod docs;
mod env;
mod error;
mod models;
mod photo_store;
mod request_state;

#[derive(Parser)]
#[command(name = "recorder-custody-server")]
#[command(version, about = "Custody tracking for video recorders issued to employees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve,
    /// Create an admin user, or reset the password if the user exists
    CreateAdmin,
}

#[tokio::main]
async fn main() {
    let result = init().await;

    let exit_code = match result {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn init() -> ServiceResult<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let photos = PhotoStore::open(env::UPLOAD_FOLDER.as_str()).await?;
    let tokens = TokenKeys::new(
        env::JWT_SECRET.as_bytes(),
        Duration::hours(*env::JWT_EXPIRATION_HOURS),
    );
    let app_state = AppState::connect(env::DATABASE_URL.as_str(), tokens, photos).await?;

    let mut db = app_state.connection().await?;
    db.ensure_seed_roles().await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => start_server(app_state).await,
        Commands::CreateAdmin => create_admin_user(app_state).await,
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
struct IndexDto {
    message: String,
    version: String,
}

async fn index() -> Json<IndexDto> {
    Json(IndexDto {
        message: "Video Recorders Management API".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

async fn start_server(app_state: AppState) -> ServiceResult<()> {
    let mut api = OpenApi::default();

    let app = ApiRouter::new()
        .api_route("/", get_with(index, |op| op.description("Name and version of the service.")))
        .nest_api_service("/api", api::init(app_state))
        .nest_api_service("/docs", docs::docs_routes())
        .finish_api_with(&mut api, docs::api_docs)
        .layer(Extension(Arc::new(api)))
        .layer(CorsLayer::permissive());

    let address = format!("{}:{}", env::API_HOST.as_str(), env::API_PORT.as_str());
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!("Start http server at {}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Read a value from stdin
///
/// # Arguments
/// * `prompt` - A prompt that descripes the required input
/// * `hide_input` - Specifies if the input value is visible or hidden
fn read_value(prompt: &str, hide_input: bool) -> ServiceResult<String> {
    if hide_input {
        loop {
            let p1 = rpassword::prompt_password(prompt)?;
            let p2 = rpassword::prompt_password(prompt)?;

            if p1 == p2 {
                return Ok(p1);
            } else {
                println!("Passwords does not match, retry.");
            }
        }
    } else {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let mut value = String::new();
        std::io::stdin().read_line(&mut value)?;
        Ok(value.trim().to_owned())
    }
}

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_NAME: &str = "Admin";

/// Use `default` for an empty answer.
fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_owned()
    } else {
        value
    }
}

/// An empty answer leaves an optional field unset.
fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn confirmed(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}

fn read_password(prompt: &str) -> ServiceResult<String> {
    let password = read_value(prompt, true)?;
    if password.is_empty() {
        return Err(ServiceError::BadRequest("Password is required"));
    }
    Ok(password)
}

async fn create_admin_user(app_state: AppState) -> ServiceResult<()> {
    let mut db = app_state.connection().await?;

    let username = or_default(
        read_value("Username (default 'admin'): ", false)?,
        DEFAULT_ADMIN_USERNAME,
    );

    if let Some(user) = db.get_user_by_username(&username).await? {
        println!("User '{}' already exists.", username);
        if !confirmed(&read_value("Change the password? (y/n): ", false)?) {
            return Ok(());
        }

        let password = read_password("New password: ")?;
        db.update_user_password(user.id, password_hash_create(&password))
            .await?;

        println!("Password of user '{}' was updated!", username);
        return Ok(());
    }

    let password = read_password("Password: ")?;
    let last_name = or_default(read_value("Last name: ", false)?, DEFAULT_ADMIN_NAME);
    let first_name = or_default(read_value("First name: ", false)?, DEFAULT_ADMIN_NAME);
    let middle_name = optional(read_value("Middle name (optional): ", false)?);

    let role = db
        .get_role_by_name(models::Role::Admin)
        .await?
        .ok_or(ServiceError::NotFound("Role not found"))?;

    db.create_user(models::NewUser {
        username: username.clone(),
        password_hash: password_hash_create(&password),
        last_name,
        first_name,
        middle_name,
        role_id: role.id,
    })
    .await?;

    println!("Admin user '{}' was successfully created!", username);

    Ok(())
}
