use crate::api::attendance::{
    ActiveCheckIn, AttendanceFilter, AttendanceListResponse, CheckInReq, CheckOutReq,
    CheckOutResponse,
};
use crate::api::groups::{
    AddMemberReq, CreateGroupReq, GroupDetailResponse, GroupSummary, MemberEntry,
};
use crate::api::hours::HoursFilter;
use crate::api::hours::HoursListResponse;
use crate::api::hours::LogHoursReq;
use crate::api::notifications::{NotificationListResponse, NotificationQuery};
use crate::api::reports::{HoursReportQuery, HoursReportResponse};
use crate::api::shifts::{
    CreateShiftReq, RosterEntry, ShiftDetailResponse, ShiftFilter, ShiftListResponse,
};
use crate::api::volunteers::{VolunteerListResponse, VolunteerQuery};
use crate::model::attendance_record::AttendanceRecord;
use crate::model::group::{Group, GroupMember};
use crate::model::hour_ledger::{HourLedgerEntry, HoursMinutes};
use crate::model::notification::Notification;
use crate::model::shift::{Shift, ShiftAssignment};
use crate::model::volunteer::Volunteer;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Volunteer Management System API",
        version = "1.0.0",
        description = r#"
## Volunteer Management System (VMS)

This API powers a **Volunteer Management System (VMS)** for community organizations that coordinate volunteers, shifts, and service hours.

### 🔹 Key Features
- **Volunteer Management**
  - Register, approve, update, and deactivate volunteer profiles
- **Shift Scheduling**
  - Publish shifts, sign up, withdraw, and view rosters
- **Attendance Tracking**
  - Shift check-in and check-out with automatically derived hour entries
- **Hour Ledger & Reports**
  - Manual hour logging, approval workflow, and aggregated hour reports
- **Groups & Notifications**
  - Team membership, group admins, and in-app notifications

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Only authorized roles such as **Admin** or **Coordinator** can access sensitive operations.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

### 🚀 Usage
Use this API to build:
- Volunteer self-service portals
- Coordinator dashboards
- Service-hour reporting tools

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::active_check_ins,
        crate::api::attendance::attendance_list,

        crate::api::hours::log_hours,
        crate::api::hours::hours_list,
        crate::api::hours::approve_hours,

        crate::api::reports::hours_report,

        crate::api::shifts::create_shift,
        crate::api::shifts::shift_list,
        crate::api::shifts::get_shift,
        crate::api::shifts::update_shift,
        crate::api::shifts::signup_shift,
        crate::api::shifts::withdraw_shift,
        crate::api::shifts::cancel_shift,

        crate::api::volunteers::volunteer_list,
        crate::api::volunteers::get_volunteer,
        crate::api::volunteers::update_volunteer,
        crate::api::volunteers::approve_volunteer,
        crate::api::volunteers::deactivate_volunteer,

        crate::api::groups::create_group,
        crate::api::groups::group_list,
        crate::api::groups::get_group,
        crate::api::groups::add_member,
        crate::api::groups::remove_member,

        crate::api::notifications::notification_list,
        crate::api::notifications::mark_read
    ),
    components(
        schemas(
            CheckInReq,
            CheckOutReq,
            CheckOutResponse,
            ActiveCheckIn,
            AttendanceFilter,
            AttendanceListResponse,
            AttendanceRecord,
            LogHoursReq,
            HoursFilter,
            HoursListResponse,
            HourLedgerEntry,
            HoursMinutes,
            HoursReportQuery,
            HoursReportResponse,
            CreateShiftReq,
            ShiftFilter,
            ShiftListResponse,
            ShiftDetailResponse,
            RosterEntry,
            Shift,
            ShiftAssignment,
            VolunteerQuery,
            VolunteerListResponse,
            Volunteer,
            CreateGroupReq,
            AddMemberReq,
            GroupSummary,
            GroupDetailResponse,
            MemberEntry,
            Group,
            GroupMember,
            NotificationQuery,
            NotificationListResponse,
            Notification
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Shift check-in and check-out APIs"),
        (name = "Hours", description = "Hour ledger and approval APIs"),
        (name = "Reports", description = "Aggregated hour reporting APIs"),
        (name = "Shifts", description = "Shift scheduling and roster APIs"),
        (name = "Volunteers", description = "Volunteer profile management APIs"),
        (name = "Groups", description = "Group and membership APIs"),
        (name = "Notifications", description = "In-app notification APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        // components is always Some: the derive above registers schemas
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
