use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::database::AppState;
use crate::error::ServiceResult;
use crate::models;
use crate::request_state::RequestState;

use super::extract::{ApiJson, ApiQuery};
use super::{required, Created};

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/issues/issue", post_with(issue_device, issue_device_docs))
        .api_route("/issues/return", post_with(return_device, return_device_docs))
        .api_route("/issues/history", get_with(get_history, get_history_docs))
        .api_route("/issues/active", get_with(get_active_issues, get_active_issues_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatusDto {
    Issued,
    Returned,
}

impl From<&models::IssueStatus> for IssueStatusDto {
    fn from(value: &models::IssueStatus) -> Self {
        match value {
            models::IssueStatus::Issued => IssueStatusDto::Issued,
            models::IssueStatus::Returned => IssueStatusDto::Returned,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct IssueDto {
    pub id: u64,
    pub device_id: Option<u64>,
    pub device_number: Option<String>,
    pub employee_id: Option<u64>,
    pub employee_name: Option<String>,
    pub issued_by_user_id: u64,
    pub issued_by_user_name: Option<String>,
    pub issue_date: String,
    pub status: IssueStatusDto,
}

impl From<&models::Issue> for IssueDto {
    fn from(value: &models::Issue) -> Self {
        Self {
            id: value.id,
            device_id: value.device_id,
            device_number: value.device_number.to_owned(),
            employee_id: value.employee_id,
            employee_name: value.employee_name.to_owned(),
            issued_by_user_id: value.issued_by_user_id,
            issued_by_user_name: value.issued_by_user_name.to_owned(),
            issue_date: value.issue_date.to_rfc3339(),
            status: (&value.status).into(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ReturnDto {
    pub id: u64,
    pub device_id: Option<u64>,
    pub device_number: Option<String>,
    pub employee_id: Option<u64>,
    pub employee_name: Option<String>,
    pub returned_by_user_id: u64,
    pub returned_by_user_name: Option<String>,
    pub return_date: String,
}

impl From<&models::Return> for ReturnDto {
    fn from(value: &models::Return) -> Self {
        Self {
            id: value.id,
            device_id: value.device_id,
            device_number: value.device_number.to_owned(),
            employee_id: value.employee_id,
            employee_name: value.employee_name.to_owned(),
            returned_by_user_id: value.returned_by_user_id,
            returned_by_user_name: value.returned_by_user_name.to_owned(),
            return_date: value.return_date.to_rfc3339(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct TransferDto {
    pub device_id: Option<u64>,
    pub employee_id: Option<u64>,
}

impl TransferDto {
    fn into_transfer(self, actor: &models::User) -> ServiceResult<models::CustodyTransfer> {
        Ok(models::CustodyTransfer {
            device_id: required(self.device_id)?,
            employee_id: required(self.employee_id)?,
            actor_user_id: actor.id,
        })
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct IssueCreatedDto {
    pub message: String,
    pub issue: IssueDto,
}

async fn issue_device(
    mut state: RequestState,
    form: ApiJson<TransferDto>,
) -> ServiceResult<Created<IssueCreatedDto>> {
    let user = state.session_require_user()?;
    let transfer = form.0.into_transfer(&user)?;

    let issue = state.db.issue_device(transfer).await?;
    Ok(Created(IssueCreatedDto {
        message: "Video recorder issued".to_owned(),
        issue: IssueDto::from(&issue),
    }))
}

fn issue_device_docs(op: TransformOperation) -> TransformOperation {
    op.description("Issue an available video recorder to an employee.")
        .tag("issues")
        .response::<201, Json<IssueCreatedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description(
                "Missing fields, the video recorder is issued or the employee already holds one!",
            )
        })
        .response_with::<404, (), _>(|res| {
            res.description("The video recorder or the employee does not exist!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ReturnCreatedDto {
    pub message: String,
    #[serde(rename = "return")]
    pub return_record: ReturnDto,
}

async fn return_device(
    mut state: RequestState,
    form: ApiJson<TransferDto>,
) -> ServiceResult<Created<ReturnCreatedDto>> {
    let user = state.session_require_user()?;
    let transfer = form.0.into_transfer(&user)?;

    let return_record = state.db.return_device(transfer).await?;
    Ok(Created(ReturnCreatedDto {
        message: "Video recorder returned".to_owned(),
        return_record: ReturnDto::from(&return_record),
    }))
}

fn return_device_docs(op: TransformOperation) -> TransformOperation {
    op.description("Register the return of a video recorder by the employee holding it.")
        .tag("issues")
        .response::<201, Json<ReturnCreatedDto>>()
        .response_with::<400, (), _>(|res| {
            res.description("Missing fields or the video recorder was not issued to this employee!")
        })
        .response_with::<404, (), _>(|res| {
            res.description("The video recorder or the employee does not exist!")
        })
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

#[derive(Debug, Default, PartialEq, Deserialize, JsonSchema)]
pub struct HistoryQuery {
    #[serde(default, deserialize_with = "optional_id")]
    pub device_id: Option<u64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub employee_id: Option<u64>,
}

/// Empty or non-numeric filter values do not restrict, `0` is a regular id.
fn optional_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.trim().parse().ok()))
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct HistoryDto {
    pub issues: Vec<IssueDto>,
    pub returns: Vec<ReturnDto>,
}

async fn get_history(
    mut state: RequestState,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ServiceResult<Json<HistoryDto>> {
    state.session_require()?;

    let history = state
        .db
        .get_history(models::HistoryFilter {
            device_id: query.device_id,
            employee_id: query.employee_id,
        })
        .await?;

    Ok(Json(HistoryDto {
        issues: history.issues.iter().map(|i| i.into()).collect(),
        returns: history.returns.iter().map(|r| r.into()).collect(),
    }))
}

fn get_history_docs(op: TransformOperation) -> TransformOperation {
    op.description("List issues and returns, newest first, optionally filtered by video recorder or employee.")
        .tag("issues")
        .response::<200, Json<HistoryDto>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

async fn get_active_issues(mut state: RequestState) -> ServiceResult<Json<Vec<IssueDto>>> {
    state.session_require()?;

    let issues = state.db.get_active_issues().await?;
    Ok(Json(issues.iter().map(|i| i.into()).collect()))
}

fn get_active_issues_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all video recorders that are currently issued.")
        .tag("issues")
        .response::<200, Json<Vec<IssueDto>>>()
        .response_with::<401, (), _>(|res| res.description("Missing login!"))
        .security_requirement("SessionToken")
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::{FromRequestParts, Request};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    async fn history_query(uri: &str) -> HistoryQuery {
        let (mut parts, _) = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
            .into_parts();

        match ApiQuery::<HistoryQuery>::from_request_parts(&mut parts, &()).await {
            Ok(ApiQuery(query)) => query,
            Err(err) => panic!("{uri} was rejected: {err}"),
        }
    }

    #[tokio::test]
    async fn empty_history_filters_do_not_restrict() {
        assert_eq!(
            history_query("/api/issues/history?device_id=&employee_id=").await,
            HistoryQuery::default()
        );
        assert_eq!(
            history_query("/api/issues/history").await,
            HistoryQuery::default()
        );
        assert_eq!(
            history_query("/api/issues/history?device_id=abc&employee_id=-1").await,
            HistoryQuery::default()
        );
    }

    #[tokio::test]
    async fn zero_is_a_history_filter() {
        assert_eq!(
            history_query("/api/issues/history?device_id=0").await,
            HistoryQuery {
                device_id: Some(0),
                employee_id: None,
            }
        );
        assert_eq!(
            history_query("/api/issues/history?device_id=&employee_id=12").await,
            HistoryQuery {
                device_id: None,
                employee_id: Some(12),
            }
        );
    }

    #[test]
    fn return_record_is_serialized_as_return() {
        let dto = ReturnCreatedDto {
            message: "Video recorder returned".to_owned(),
            return_record: ReturnDto::from(&models::Return {
                id: 4,
                device_id: None,
                device_number: None,
                employee_id: Some(2),
                employee_name: Some("Jane Roe".to_owned()),
                returned_by_user_id: 1,
                returned_by_user_name: None,
                return_date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            }),
        };

        let value = serde_json::to_value(dto).unwrap();
        assert_eq!(value["return"]["id"], 4);
        assert_eq!(value["return"]["device_id"], json!(null));
        assert_eq!(value["return"]["return_date"], "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn transfer_requires_both_ids() {
        let actor = models::User {
            id: 9,
            username: "operator".to_owned(),
            password_hash: Vec::new(),
            last_name: "Doe".to_owned(),
            first_name: "John".to_owned(),
            middle_name: None,
            role_id: 2,
            role_name: "operator".to_owned(),
        };

        let missing = TransferDto {
            device_id: Some(1),
            employee_id: None,
        };
        assert!(missing.into_transfer(&actor).is_err());

        let transfer = TransferDto {
            device_id: Some(1),
            employee_id: Some(0),
        }
        .into_transfer(&actor)
        .unwrap();
        assert_eq!(transfer.device_id, 1);
        assert_eq!(transfer.employee_id, 0);
        assert_eq!(transfer.actor_user_id, 9);
    }
}
