use std::fmt::Debug;

use chrono::{DateTime, Utc};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    /// Roles that must exist in every installation.
    pub const SEED: [Role; 2] = [Role::Admin, Role::Operator];

    /// Map a stored role name. Everything that is not `admin` is treated as an operator.
    pub fn from_name(name: &str) -> Self {
        match name {
            "admin" => Role::Admin,
            _ => Role::Operator,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator with full access",
            Role::Operator => "Operator, may issue and accept returned video recorders",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RoleEntry {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(PartialEq, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub role_id: u64,
    pub role_name: String,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_name(&self.role_name)
    }
}

impl Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("last_name", &self.last_name)
            .field("first_name", &self.first_name)
            .field("middle_name", &self.middle_name)
            .field("role_id", &self.role_id)
            .field("role_name", &self.role_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: Vec<u8>,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub role_id: u64,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Photo {
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Employee {
    pub id: u64,
    pub full_name: String,
    pub position: Option<String>,
    pub employee_number: String,
    pub created_at: DateTime<Utc>,
    pub photo: Option<Photo>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeviceStatus {
    Available,
    Issued,
}

impl DeviceStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(DeviceStatus::Available),
            "issued" => Some(DeviceStatus::Issued),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Available => "available",
            DeviceStatus::Issued => "issued",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Device {
    pub id: u64,
    pub number: String,
    pub status: DeviceStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IssueStatus {
    Issued,
    Returned,
}

impl IssueStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "issued" => Some(IssueStatus::Issued),
            "returned" => Some(IssueStatus::Returned),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Issued => "issued",
            IssueStatus::Returned => "returned",
        }
    }
}

/// A checkout of a device to an employee.
///
/// `device_id` and `employee_id` are only `None` after the referenced entity was deleted.
/// The `*_number`/`*_name` fields are resolved for display and follow the same rule.
#[derive(Debug, PartialEq, Clone)]
pub struct Issue {
    pub id: u64,
    pub device_id: Option<u64>,
    pub device_number: Option<String>,
    pub employee_id: Option<u64>,
    pub employee_name: Option<String>,
    pub issued_by_user_id: u64,
    pub issued_by_user_name: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub status: IssueStatus,
}

/// A check-in closing exactly one `Issue`.
#[derive(Debug, PartialEq, Clone)]
pub struct Return {
    pub id: u64,
    pub device_id: Option<u64>,
    pub device_number: Option<String>,
    pub employee_id: Option<u64>,
    pub employee_name: Option<String>,
    pub returned_by_user_id: u64,
    pub returned_by_user_name: Option<String>,
    pub return_date: DateTime<Utc>,
}

/// Request to move a device between the custody states.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct CustodyTransfer {
    pub device_id: u64,
    pub employee_id: u64,
    pub actor_user_id: u64,
}

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct HistoryFilter {
    pub device_id: Option<u64>,
    pub employee_id: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct History {
    pub issues: Vec<Issue>,
    pub returns: Vec<Return>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
    pub valid_until: DateTime<Utc>,
}

#[derive(PartialEq, Clone)]
pub struct Image {
    pub data: Vec<u8>,
    pub mimetype: String,
}

impl Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field(
                "data",
                &format!("{:?}[..20]", &self.data[..20.min(self.data.len())]),
            )
            .field("mimetype", &self.mimetype)
            .finish()
    }
}
