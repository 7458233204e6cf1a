use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::Json;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::custody;
use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::request_state::RequestState;

use super::extract::{ApiJson, ApiPath};
use super::{required_text, Created, MessageDto};

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/devices/:id",
            get_with(get_device, get_device_docs)
                .put_with(update_device, update_device_docs)
                .delete_with(delete_device, delete_device_docs),
        )
        .api_route(
            "/devices",
            get_with(list_devices, list_devices_docs).post_with(create_device, create_device_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatusDto {
    Available,
    Issued,
}

impl From<&models::DeviceStatus> for DeviceStatusDto {
    fn from(value: &models::DeviceStatus) -> Self {
        match value {
            models::DeviceStatus::Available => DeviceStatusDto::Available,
            models::DeviceStatus::Issued => DeviceStatusDto::Issued,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct DeviceDto {
    pub id: u64,
    pub number: String,
    pub status: DeviceStatusDto,
    pub created_at: String,
}

impl From<&models::Device> for DeviceDto {
    fn from(value: &models::Device) -> Self {
        Self {
            id: value.id,
            number: value.number.to_owned(),
            status: (&value.status).into(),
            created_at: value.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct DeviceSavedDto {
    pub message: String,
    pub device: DeviceDto,
}

pub async fn list_devices(mut state: RequestState) -> ServiceResult<Json<Vec<DeviceDto>>> {
    state.session_require()?;

    let devices = state.db.get_all_devices().await?;
    Ok(Json(devices.iter().map(|d| d.into()).collect()))
}

fn list_devices_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all video recorders with their status.")
        .tag("devices")
        .response::<200, Json<Vec<DeviceDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

pub async fn get_device(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
) -> ServiceResult<Json<DeviceDto>> {
    state.session_require()?;

    let device = state.db.get_device_by_id(id).await?;

    if let Some(device) = device {
        return Ok(Json(DeviceDto::from(&device)));
    }

    Err(ServiceError::NotFound("Video recorder not found"))
}

fn get_device_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get a video recorder by id.")
        .tag("devices")
        .response::<200, Json<DeviceDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested video recorder does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveDeviceDto {
    pub number: Option<String>,
    /// Must match the current status, which only changes through issues and returns.
    pub status: Option<String>,
}

async fn create_device(
    mut state: RequestState,
    form: ApiJson<SaveDeviceDto>,
) -> ServiceResult<Created<DeviceSavedDto>> {
    state.session_require_admin()?;

    let form = form.0;
    let number = required_text(form.number)?;

    // new devices start without an open issue
    if let Some(ref status) = form.status {
        custody::check_status_edit(models::DeviceStatus::Available, status)?;
    }

    let device = models::Device {
        id: 0,
        number,
        status: models::DeviceStatus::Available,
        created_at: Utc::now(),
    };

    let device = state.db.store_device(device).await?;
    Ok(Created(DeviceSavedDto {
        message: "Video recorder created".to_owned(),
        device: DeviceDto::from(&device),
    }))
}

fn create_device_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new video recorder.")
        .tag("devices")
        .response::<201, Json<DeviceSavedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description("Missing number, invalid status or the number is already taken!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}

async fn update_device(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
    form: ApiJson<SaveDeviceDto>,
) -> ServiceResult<Json<DeviceSavedDto>> {
    state.session_require_admin()?;

    let form = form.0;
    let device = state.db.get_device_by_id(id).await?;

    if let Some(mut device) = device {
        if form.number.is_some() {
            device.number = required_text(form.number)?;
        }

        if let Some(ref status) = form.status {
            custody::check_status_edit(device.status, status)?;
        }

        let device = state.db.store_device(device).await?;
        return Ok(Json(DeviceSavedDto {
            message: "Video recorder updated".to_owned(),
            device: DeviceDto::from(&device),
        }));
    }

    Err(ServiceError::NotFound("Video recorder not found"))
}

fn update_device_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update the number of an existing video recorder.")
        .tag("devices")
        .response::<200, Json<DeviceSavedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description("Invalid status, status change or the number is already taken!")
        })
        .response_with::<404, (), _>(|res| res.description("The requested video recorder does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}

async fn delete_device(
    mut state: RequestState,
    ApiPath(id): ApiPath<u64>,
) -> ServiceResult<Json<MessageDto>> {
    state.session_require_admin()?;

    state.db.delete_device(id).await?;
    Ok(MessageDto::new("Video recorder deleted, history was kept"))
}

fn delete_device_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete a video recorder that is not issued. Its history is kept.")
        .tag("devices")
        .response::<200, Json<MessageDto>>()
        .response_with::<400, (), _>(|res| res.description("The video recorder is currently issued!"))
        .response_with::<404, (), _>(|res| res.description("The requested video recorder does not exist!"))
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .response_with::<403, (), _>(|res| res.description("Missing permissions!"))
        .security_requirement_scopes("SessionToken", ["admin"])
}
