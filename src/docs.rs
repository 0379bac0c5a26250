use crate::api::attendance::{AttendanceQuery, SyncQuery, SyncReport};
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeQuery};
use crate::api::payroll::{
    CreatePayroll, PaginatedPayrollResponse, PayrollQuery, PayrollResponse, UpdatePayroll,
};
use crate::api::requests::{
    BulkUpdate, CreateRequest, RequestFilter, RequestListResponse, StatusUpdate,
};
use crate::model::attendance::Attendance;
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::job_title::JobTitle;
use crate::model::request::{
    ChangeRestdayDetail, LeaveType, OffsetDetail, OvertimeDetail, RequestKind, RequestRecord,
    RequestStatus, RetroDetail, SlvlDetail, TimeScheduleDetail, TravelOrderDetail,
};
use crate::workflow::engine::{BulkFailure, BulkReport};
use crate::workflow::guard::Decision;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR/Payroll Administration API",
        version = "1.0.0",
        description = r#"
## HR/Payroll Administration Backend

Employee records, biometric attendance capture, and a family of approval
workflows sharing one state machine.

### Key Features
- **Approval Workflows**
  - Overtime, offset, rest-day change, retro adjustment, time schedule,
    travel order, and sick/vacation leave requests
  - Single and bulk decisions, force-approve override, CSV export
- **Employee Management**
  - Create, update, list, and view employee profiles
- **Attendance Management**
  - Manual check-in/check-out plus biometric terminal sync
- **Payroll Management**
  - Payroll periods with approved retro adjustments folded in

### Security
Endpoints are protected with **JWT Bearer authentication**. Decisions are
scoped by role: super-admin and HR managers decide everywhere, department
managers only within their department. Force-approve is super-admin only.

Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::requests::create_request,
        crate::api::requests::list_requests,
        crate::api::requests::get_request,
        crate::api::requests::update_status,
        crate::api::requests::bulk_update,
        crate::api::requests::delete_request,
        crate::api::requests::export_requests,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::sync_device,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::list_departments,
        crate::api::employee::list_job_titles,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls
    ),
    components(
        schemas(
            RequestStatus,
            RequestKind,
            RequestRecord,
            Decision,
            CreateRequest,
            StatusUpdate,
            BulkUpdate,
            RequestFilter,
            RequestListResponse,
            BulkReport,
            BulkFailure,
            OvertimeDetail,
            OffsetDetail,
            ChangeRestdayDetail,
            RetroDetail,
            TimeScheduleDetail,
            TravelOrderDetail,
            SlvlDetail,
            LeaveType,
            Attendance,
            AttendanceQuery,
            SyncQuery,
            SyncReport,
            CreateEmployee,
            EmployeeQuery,
            Employee,
            EmployeeListResponse,
            Department,
            JobTitle,
            PaginatedPayrollResponse,
            PayrollResponse,
            CreatePayroll,
            UpdatePayroll,
            PayrollQuery
        )
    ),
    tags(
        (name = "Requests", description = "Approval workflow APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
    )
)]
pub struct ApiDoc;
