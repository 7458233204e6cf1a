use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Multipart;
use axum::Json;
use chrono::Utc;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::photo_store::{guess_mime_type, photo_extension, photo_filename};
use crate::request_state::RequestState;

use super::extract::{ApiJson, ApiPath};
use super::{required_text, Created, ImageResponse, MessageDto};

const MAX_EMPLOYEE_NUMBER_LENGTH: usize = 6;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/employees/:id",
            get_with(get_employee, get_employee_docs)
                .put_with(update_employee, update_employee_docs)
                .delete_with(delete_employee, delete_employee_docs),
        )
        .api_route(
            "/employees/:id/photo",
            get_with(get_employee_photo, get_employee_photo_docs)
                .post_with(upload_employee_photo, upload_employee_photo_docs),
        )
        .api_route(
            "/employees",
            get_with(list_employees, list_employees_docs)
                .post_with(create_employee, create_employee_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct EmployeeDto {
    pub id: u64,
    pub full_name: String,
    pub position: Option<String>,
    pub employee_number: String,
    pub created_at: String,
    pub photo_url: Option<String>,
}

impl From<&models::Employee> for EmployeeDto {
    fn from(value: &models::Employee) -> Self {
        Self {
            id: value.id,
            full_name: value.full_name.to_owned(),
            position: value.position.to_owned(),
            employee_number: value.employee_number.to_owned(),
            created_at: value.created_at.to_rfc3339(),
            photo_url: value
                .photo
                .as_ref()
                .map(|_| format!("/api/employees/{}/photo", value.id)),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct EmployeeSavedDto {
    pub message: String,
    pub employee: EmployeeDto,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveEmployeeDto {
    pub full_name: Option<String>,
    pub employee_number: Option<String>,
    /// An empty value clears the position.
    pub position: Option<String>,
}

fn employee_number(value: Option<String>) -> ServiceResult<String> {
    let number = required_text(value)?;

    if number.chars().count() > MAX_EMPLOYEE_NUMBER_LENGTH {
        return Err(ServiceError::BadRequest(
            "Employee number must be at most 6 characters",
        ));
    }

    Ok(number)
}

fn position(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

pub async fn list_employees(mut state: RequestState) -> ServiceResult<Json<Vec<EmployeeDto>>> {
    state.session_require()?;

    let employees = state.db.get_all_employees().await?;
    Ok(Json(employees.iter().map(|e| e.into()).collect()))
}

fn list_employees_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all employees.")
        .tag("employees")
        .response::<200, Json<Vec<EmployeeDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

pub async fn get_employee(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
) -> ServiceResult<Json<EmployeeDto>> {
    state.session_require()?;

    let employee = state.db.get_employee_by_id(id).await?;

    if let Some(employee) = employee {
        return Ok(Json(EmployeeDto::from(&employee)));
    }

    Err(ServiceError::NotFound("Employee not found"))
}

fn get_employee_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get an employee by id.")
        .tag("employees")
        .response::<200, Json<EmployeeDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested employee does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

async fn create_employee(
    mut state: RequestState,
    form: ApiJson<SaveEmployeeDto>,
) -> ServiceResult<Created<EmployeeSavedDto>> {
    state.session_require_admin()?;

    let form = form.0;
    let employee = models::Employee {
        id: 0,
        full_name: required_text(form.full_name)?,
        position: form.position.and_then(position),
        employee_number: employee_number(form.employee_number)?,
        created_at: Utc::now(),
        photo: None,
    };

    let employee = state.db.store_employee(employee).await?;
    Ok(Created(EmployeeSavedDto {
        message: "Employee created".to_owned(),
        employee: EmployeeDto::from(&employee),
    }))
}

fn create_employee_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new employee.")
        .tag("employees")
        .response::<201, Json<EmployeeSavedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description("Missing fields, invalid or already taken employee number!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}

async fn update_employee(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
    form: ApiJson<SaveEmployeeDto>,
) -> ServiceResult<Json<EmployeeSavedDto>> {
    state.session_require_admin()?;

    let form = form.0;
    let employee = state.db.get_employee_by_id(id).await?;

    if let Some(mut employee) = employee {
        if form.full_name.is_some() {
            employee.full_name = required_text(form.full_name)?;
        }
        if form.employee_number.is_some() {
            employee.employee_number = employee_number(form.employee_number)?;
        }
        if let Some(value) = form.position {
            employee.position = position(value);
        }

        let employee = state.db.store_employee(employee).await?;
        return Ok(Json(EmployeeSavedDto {
            message: "Employee updated".to_owned(),
            employee: EmployeeDto::from(&employee),
        }));
    }

    Err(ServiceError::NotFound("Employee not found"))
}

fn update_employee_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing employee.")
        .tag("employees")
        .response::<200, Json<EmployeeSavedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description("Invalid fields or the employee number is already taken!")
        })
        .response_with::<404, (), _>(|res| res.description("The requested employee does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}

async fn delete_employee(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
) -> ServiceResult<Json<MessageDto>> {
    state.session_require_admin()?;

    let photo = state.db.delete_employee(id).await?;

    if let Some(photo) = photo {
        if let Err(e) = state.photos.remove(&photo.filename).await {
            warn!("Could not remove photo '{}' of employee {}: {:?}", photo.filename, id, e);
        }
    }

    Ok(MessageDto::new("Employee deleted"))
}

fn delete_employee_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete an employee together with the photo. The history is kept.")
        .tag("employees")
        .response::<200, Json<MessageDto>>()
        .response_with::<400, (), _>(|res| res.description("The employee currently holds a video recorder!"))
        .response_with::<404, (), _>(|res| res.description("The requested employee does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}

async fn get_employee_photo(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
) -> ServiceResult<ImageResponse> {
    state.session_require()?;

    let employee = state
        .db
        .get_employee_by_id(id)
        .await?
        .ok_or(ServiceError::NotFound("Employee not found"))?;

    if let Some(photo) = employee.photo {
        if let Some(data) = state.photos.load(&photo.filename).await? {
            return Ok(ImageResponse(models::Image {
                data,
                mimetype: photo.mime_type,
            }));
        }
    }

    Err(ServiceError::NotFound("Photo not found"))
}

fn get_employee_photo_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get the photo of an employee.")
        .tag("employees")
        .response_with::<200, Vec<u8>, _>(|res| res.description("The raw image data."))
        .response_with::<404, (), _>(|res| {
            res.description("The requested employee or the photo does not exist!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

async fn upload_employee_photo(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
    mut multipart: Multipart,
) -> ServiceResult<Json<EmployeeSavedDto>> {
    state.session_require_admin()?;

    if state.db.get_employee_by_id(id).await?.is_none() {
        return Err(ServiceError::NotFound("Employee not found"));
    }

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("photo") {
            continue;
        }

        let upload_name = field.file_name().unwrap_or("").to_owned();
        if upload_name.is_empty() {
            return Err(ServiceError::BadRequest("No file selected"));
        }

        let extension = photo_extension(&upload_name)?;
        let mime_type = match field.content_type() {
            Some(content_type) if content_type.starts_with("image/") => {
                content_type.to_lowercase()
            }
            _ => guess_mime_type(&extension),
        };
        let data = field.bytes().await?;

        let filename = photo_filename(id, &extension);
        let staged = state.photos.stage(&filename, &data).await?;

        let previous = match state
            .db
            .set_employee_photo(
                id,
                models::Photo {
                    filename: filename.clone(),
                    mime_type,
                },
            )
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                if let Err(remove_err) = state.photos.remove(&staged).await {
                    warn!("Could not remove staged photo '{}': {:?}", staged, remove_err);
                }
                return Err(e);
            }
        };

        state.photos.publish(&staged, &filename).await?;

        if let Some(previous) = previous {
            if previous.filename != filename {
                if let Err(e) = state.photos.remove(&previous.filename).await {
                    warn!(
                        "Could not remove replaced photo '{}' of employee {}: {:?}",
                        previous.filename, id, e
                    );
                }
            }
        }

        let employee = state
            .db
            .get_employee_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Employee not found"))?;

        return Ok(Json(EmployeeSavedDto {
            message: "Photo uploaded".to_owned(),
            employee: EmployeeDto::from(&employee),
        }));
    }

    Err(ServiceError::BadRequest("No photo file in the request"))
}

fn upload_employee_photo_docs(op: TransformOperation) -> TransformOperation {
    op.description("Upload or replace the photo of an employee. Accepts png, jpg, jpeg and gif.")
        .tag("employees")
        .response::<200, Json<EmployeeSavedDto>>()
        .response_with::<400, (), _>(|res| res.description("Missing file or unsupported file type!"))
        .response_with::<404, (), _>(|res| res.description("The requested employee does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}
