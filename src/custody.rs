//! Custody state machine
//!
//! A device is either `available` (no open issue references it) or `issued` (exactly one open
//! issue references it). The functions in this module decide whether a transition is allowed,
//! given the state loaded inside the transaction that performs it.
//!
//! Checks run in a fixed order so callers always see the same error for the same state:
//! device exists, device status, employee exists, open issues.
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Device, DeviceStatus, Employee, Issue};

/// Check an `issue` transition.
///
/// `open_issue_of_employee` is the open issue the employee currently holds, if any.
pub fn check_issue(
    device: Option<&Device>,
    employee: Option<&Employee>,
    open_issue_of_employee: Option<&Issue>,
) -> ServiceResult<()> {
    let device = device.ok_or(ServiceError::NotFound("Video recorder not found"))?;
    if device.status == DeviceStatus::Issued {
        return Err(ServiceError::Conflict("Video recorder is already issued"));
    }

    employee.ok_or(ServiceError::NotFound("Employee not found"))?;

    if let Some(issue) = open_issue_of_employee {
        return Err(ServiceError::EmployeeHoldsDevice(Box::new(issue.clone())));
    }

    Ok(())
}

/// Check a `return` transition and yield the issue it closes.
///
/// `open_issue_for_pair` is the open issue for exactly this device and employee, if any.
pub fn check_return<'a>(
    device: Option<&Device>,
    employee: Option<&Employee>,
    open_issue_for_pair: Option<&'a Issue>,
) -> ServiceResult<&'a Issue> {
    let device = device.ok_or(ServiceError::NotFound("Video recorder not found"))?;
    if device.status == DeviceStatus::Available {
        return Err(ServiceError::Conflict("Video recorder was not issued"));
    }

    employee.ok_or(ServiceError::NotFound("Employee not found"))?;

    open_issue_for_pair.ok_or(ServiceError::Conflict(
        "Video recorder was not issued to this employee",
    ))
}

/// Validate a requested status for a device whose ledger-backed status is `current`.
///
/// Status only changes through `issue` and `return`, so a differing value is refused.
pub fn check_status_edit(current: DeviceStatus, requested: &str) -> ServiceResult<DeviceStatus> {
    let requested =
        DeviceStatus::parse(requested).ok_or(ServiceError::BadRequest("Invalid status"))?;

    if requested != current {
        return Err(ServiceError::Conflict(
            "Status is managed by issues and returns, use those instead",
        ));
    }

    Ok(requested)
}

pub fn check_device_deletable(device: &Device) -> ServiceResult<()> {
    match device.status {
        DeviceStatus::Available => Ok(()),
        DeviceStatus::Issued => Err(ServiceError::Conflict(
            "Cannot delete a video recorder that is currently issued",
        )),
    }
}

pub fn check_employee_deletable(open_issue_of_employee: Option<&Issue>) -> ServiceResult<()> {
    match open_issue_of_employee {
        None => Ok(()),
        Some(_) => Err(ServiceError::Conflict(
            "Cannot delete an employee that currently holds a video recorder",
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::IssueStatus;

    fn device(status: DeviceStatus) -> Device {
        Device {
            id: 1,
            number: "VR-001".to_owned(),
            status,
            created_at: Utc::now(),
        }
    }

    fn employee() -> Employee {
        Employee {
            id: 2,
            full_name: "Jane Roe".to_owned(),
            position: None,
            employee_number: "000042".to_owned(),
            created_at: Utc::now(),
            photo: None,
        }
    }

    fn open_issue(device_id: u64) -> Issue {
        Issue {
            id: 9,
            device_id: Some(device_id),
            device_number: Some(format!("VR-{device_id:03}")),
            employee_id: Some(2),
            employee_name: Some("Jane Roe".to_owned()),
            issued_by_user_id: 1,
            issued_by_user_name: Some("Admin Admin".to_owned()),
            issue_date: Utc::now(),
            status: IssueStatus::Issued,
        }
    }

    #[test]
    fn issue_available_device_to_free_employee() {
        let result = check_issue(
            Some(&device(DeviceStatus::Available)),
            Some(&employee()),
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn issue_requires_existing_device_and_employee() {
        assert!(matches!(
            check_issue(None, Some(&employee()), None),
            Err(ServiceError::NotFound("Video recorder not found"))
        ));
        assert!(matches!(
            check_issue(Some(&device(DeviceStatus::Available)), None, None),
            Err(ServiceError::NotFound("Employee not found"))
        ));
    }

    #[test]
    fn issue_of_issued_device_conflicts_for_any_employee() {
        let issued = device(DeviceStatus::Issued);
        assert!(matches!(
            check_issue(Some(&issued), Some(&employee()), None),
            Err(ServiceError::Conflict(_))
        ));
        // device status wins over a missing employee
        assert!(matches!(
            check_issue(Some(&issued), None, None),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn issue_to_employee_holding_device_surfaces_blocking_issue() {
        let blocking = open_issue(5);
        let result = check_issue(
            Some(&device(DeviceStatus::Available)),
            Some(&employee()),
            Some(&blocking),
        );

        match result {
            Err(ServiceError::EmployeeHoldsDevice(issue)) => assert_eq!(*issue, blocking),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn return_closes_the_open_issue_of_the_pair() {
        let issue = open_issue(1);
        let closed = check_return(
            Some(&device(DeviceStatus::Issued)),
            Some(&employee()),
            Some(&issue),
        )
        .unwrap();
        assert_eq!(closed.id, issue.id);
    }

    #[test]
    fn return_of_available_device_conflicts() {
        assert!(matches!(
            check_return(Some(&device(DeviceStatus::Available)), Some(&employee()), None),
            Err(ServiceError::Conflict("Video recorder was not issued"))
        ));
    }

    #[test]
    fn return_by_other_employee_conflicts() {
        assert!(matches!(
            check_return(Some(&device(DeviceStatus::Issued)), Some(&employee()), None),
            Err(ServiceError::Conflict(
                "Video recorder was not issued to this employee"
            ))
        ));
    }

    #[test]
    fn return_requires_existing_device_and_employee() {
        assert!(matches!(
            check_return(None, Some(&employee()), None),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            check_return(Some(&device(DeviceStatus::Issued)), None, None),
            Err(ServiceError::NotFound("Employee not found"))
        ));
    }

    #[test]
    fn status_edit_accepts_only_the_current_status() {
        assert_eq!(
            check_status_edit(DeviceStatus::Available, "available").unwrap(),
            DeviceStatus::Available
        );
        assert!(matches!(
            check_status_edit(DeviceStatus::Available, "issued"),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            check_status_edit(DeviceStatus::Issued, "lost"),
            Err(ServiceError::BadRequest("Invalid status"))
        ));
    }

    #[test]
    fn issued_devices_cannot_be_deleted() {
        assert!(check_device_deletable(&device(DeviceStatus::Available)).is_ok());
        assert!(matches!(
            check_device_deletable(&device(DeviceStatus::Issued)),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn employees_holding_a_device_cannot_be_deleted() {
        assert!(check_employee_deletable(None).is_ok());
        assert!(matches!(
            check_employee_deletable(Some(&open_issue(1))),
            Err(ServiceError::Conflict(_))
        ));
    }
}
