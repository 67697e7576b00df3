//! The Darwinbox tool table. Pure data: nothing here touches the network.

use std::time::Duration;

use serde_json::json;

use super::definition::{
    BodyField, HttpBinding, Param, ParamType, ResponseEnvelope, ToolDefinition, ValueRule,
};
use super::registry::ToolRegistry;
use crate::config::ApiKey as Key;

use ParamType::{Boolean, String as Str, StringList};
use ValueRule::{
    ApiKey as Env, Const, DayEnd, DayFirst, DayStart, HalfDaySlot, LeaveAction, Month,
    PaidUnpaid, Param as Arg, Records, Trimmed, TrimmedList, Wrapped, YearOrCurrent, YesNo,
};

const EMPLOYEE_NO: &str = "Exact employee number, never a name";
const EMPLOYEE_IDS: &str = "List of exact employee numbers";
const ISO_DATE: &str = "Date in YYYY-MM-DD format";

/// All thirteen tools, grouped leave, attendance, employee.
pub fn hr_tools() -> ToolRegistry {
    leave_tools()
        .into_iter()
        .chain(attendance_tools())
        .chain(employee_tools())
        .fold(ToolRegistry::new(), ToolRegistry::add)
}

fn field(name: &'static str, rule: ValueRule) -> BodyField {
    BodyField::new(name, rule)
}

fn leave_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_leave_report",
            description: "Get leave records for an employee between start_date and end_date in YYYY-MM-DD format",
            params: vec![
                Param::required("employee_no", Str, EMPLOYEE_NO),
                Param::required("start_date", Str, ISO_DATE),
                Param::required("end_date", Str, ISO_DATE),
            ],
            binding: HttpBinding::post(
                "/leavesactionapi/leaveActionTakenLeaves",
                vec![
                    field("api_key", Env(Key::LeaveReport)),
                    field("from", DayFirst("start_date")),
                    field("to", DayFirst("end_date")),
                    field("action", Const("2")),
                    field("action_from", DayFirst("start_date")),
                    field("employee_no", Wrapped("employee_no")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_leave_balance",
            description: "Get leave balance for one or more employees. employee_nos must be a list of strings.",
            params: vec![
                Param::required("employee_nos", StringList, EMPLOYEE_IDS),
                Param::optional("leave_names", StringList, "Leave types to include; all when empty")
                    .with_default(json!([])),
            ],
            binding: HttpBinding::post(
                "/leavesactionapi/leavebalance",
                vec![
                    field("api_key", Env(Key::LeaveBalance)),
                    field("ignore_rounding", Const("1")),
                    field("employee_nos", TrimmedList("employee_nos")),
                    field("leave_names", Arg("leave_names")),
                ],
            ),
        },
        ToolDefinition {
            name: "apply_for_leave",
            description: "Apply for a new leave on behalf of an employee. Dates should be in YYYY-MM-DD format",
            params: vec![
                Param::required("employee_no", Str, EMPLOYEE_NO),
                Param::required("leave_name", Str, "Leave type, e.g. Casual Leave"),
                Param::required("start_date", Str, ISO_DATE),
                Param::required("end_date", Str, ISO_DATE),
                Param::optional("is_half_day", Boolean, "Whether this is a half-day leave")
                    .with_default(json!(false)),
                Param::optional("is_first_half", Boolean, "First half when true, second half otherwise")
                    .with_default(json!(true)),
                Param::optional("is_paid", Boolean, "Paid leave when true")
                    .with_default(json!(true)),
                Param::optional("message", Str, "Reason shown to the approver")
                    .with_default(json!("Applied via AI")),
            ],
            binding: HttpBinding::post(
                "/leavesactionapi/importleave",
                vec![
                    field("api_key", Env(Key::LeaveImport)),
                    field(
                        "data",
                        Records(vec![
                            field("employee_no", Trimmed("employee_no")),
                            field("leave_name", Arg("leave_name")),
                            field("message", Arg("message")),
                            field("from_date", DayFirst("start_date")),
                            field("to_date", DayFirst("end_date")),
                            field("is_half_day", YesNo("is_half_day")),
                            field("is_paid_or_unpaid", PaidUnpaid("is_paid")),
                            field("revoke_leave", Const("no")),
                            field(
                                "is_firsthalf_secondhalf",
                                HalfDaySlot {
                                    half_day: "is_half_day",
                                    first_half: "is_first_half",
                                },
                            ),
                        ]),
                    ),
                ],
            ),
        },
        ToolDefinition {
            name: "update_leave_status",
            description: "Approve, Reject, or Revoke a specific leave request. 'action' must be one of: Approved, Rejected, Revoked",
            params: vec![
                Param::required("employee_no", Str, EMPLOYEE_NO),
                Param::required("leave_id", Str, "Identifier of the leave request"),
                Param::required("action", Str, "Approved, Rejected or Revoked"),
                Param::optional("manager_message", Str, "Note recorded with the decision")
                    .with_default(json!("")),
            ],
            binding: HttpBinding::post(
                "/leavesactionapi/leaveaction",
                vec![
                    field("api_key", Env(Key::LeaveAction)),
                    field("employee_no", Trimmed("employee_no")),
                    field("leave_id", Arg("leave_id")),
                    field("action", LeaveAction("action")),
                    field("manager_message", Arg("manager_message")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_holiday_list",
            description: "Get the holiday calendar for a specific employee and year. If 'year' not provided, uses current year.",
            params: vec![
                Param::required("employee_no", Str, EMPLOYEE_NO),
                Param::optional("year", Str, "Four-digit year"),
            ],
            binding: HttpBinding::post(
                "/leavesactionapi/holidaylist",
                vec![
                    field("api_key", Env(Key::LeaveHoliday)),
                    field("employee_no", Trimmed("employee_no")),
                    field("year", YearOrCurrent("year")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_leave_encashment_details",
            description: "Get leave encashment details for an employee. Dates must be in YYYY-MM-DD format.",
            params: vec![
                Param::required("employee_no", Str, EMPLOYEE_NO),
                Param::required("start_date", Str, ISO_DATE),
                Param::required("end_date", Str, ISO_DATE),
            ],
            binding: HttpBinding::post(
                "/leavesactionapi/encashmentDetails",
                vec![
                    field("api_key", Env(Key::LeaveEncashment)),
                    field("from", DayStart("start_date")),
                    field("to", DayEnd("end_date")),
                    field("employee_no", Wrapped("employee_no")),
                ],
            ),
        },
    ]
}

fn attendance_tools() -> Vec<ToolDefinition> {
    let status_data = |path: &'static str, body: Vec<BodyField>| {
        HttpBinding::post(path, body).with_envelope(ResponseEnvelope::StatusData)
    };

    vec![
        ToolDefinition {
            name: "get_daily_attendance_status",
            description: "Fetch daily attendance status (Present/Absent, timings) for one or more employees for a SINGLE date. Date in YYYY-MM-DD format.",
            params: vec![
                Param::required("employee_ids", StringList, EMPLOYEE_IDS),
                Param::required("attendance_date", Str, ISO_DATE),
            ],
            binding: status_data(
                "/AttendanceDataApi/daily",
                vec![
                    field("api_key", Env(Key::AttendanceDailyStatus)),
                    field("emp-number_list", TrimmedList("employee_ids")),
                    field("attendance_date", DayFirst("attendance_date")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_daily_attendance_roster",
            description: "Get daily attendance roster (shift, status, hours) for one or more employees for a date range. Dates in YYYY-MM-DD format.",
            params: vec![
                Param::required("employee_ids", StringList, EMPLOYEE_IDS),
                Param::required("from_date", Str, ISO_DATE),
                Param::required("to_date", Str, ISO_DATE),
            ],
            // The roster endpoint takes ISO dates as-is.
            binding: status_data(
                "/attendanceDataApi/DailyAttendanceRoster",
                vec![
                    field("api_key", Env(Key::AttendanceDailyRoster)),
                    field("emp_number_list", TrimmedList("employee_ids")),
                    field("from_date", Arg("from_date")),
                    field("to_date", Arg("to_date")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_attendance_punches",
            description: "Get raw attendance punch-in/out records for one or more employees. Dates in YYYY-MM-DD format",
            params: vec![
                Param::required("employee_ids", StringList, EMPLOYEE_IDS),
                Param::required("from_date", Str, ISO_DATE),
                Param::required("to_date", Str, ISO_DATE),
            ],
            binding: status_data(
                "/AttendancePunchesApi",
                vec![
                    field("api_key", Env(Key::AttendancePunches)),
                    field("emp_number_list", TrimmedList("employee_ids")),
                    field("from_date", DayFirst("from_date")),
                    field("to_date", DayFirst("to_date")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_monthly_attendance",
            description: "Get monthly attendance summary. 'month_year' MUST be in YYYY-MM format (e.g., '2025-10').",
            params: vec![
                Param::required("employee_ids", StringList, EMPLOYEE_IDS),
                Param::required("month_year", Str, "Month in YYYY-MM format"),
            ],
            binding: status_data(
                "/AttendanceDataApi/monthly",
                vec![
                    field("api_key", Env(Key::AttendanceMonthly)),
                    field("emp_number_list", TrimmedList("employee_ids")),
                    field("month", Month("month_year")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_timesheet_datewise",
            description: "Get employee timesheet data (projects, tasks) datewise. Dates must be in YYYY-MM-DD format.",
            params: vec![
                Param::required("employee_ids", StringList, EMPLOYEE_IDS),
                Param::required("from_date", Str, ISO_DATE),
                Param::required("to_date", Str, ISO_DATE),
            ],
            binding: status_data(
                "/attendanceDataApi/timesheetdatewise",
                vec![
                    field("api_key", Env(Key::AttendanceTimesheetDatewise)),
                    field("from", DayFirst("from_date")),
                    field("to", DayFirst("to_date")),
                    field("emp_number_list", TrimmedList("employee_ids")),
                ],
            ),
        },
        ToolDefinition {
            name: "get_overtime_datewise",
            description: "Get employee overtime data for a date range. Dates must be in YYYY-MM-DD format.",
            params: vec![
                Param::required("employee_ids", StringList, EMPLOYEE_IDS),
                Param::required("from_date", Str, ISO_DATE),
                Param::required("to_date", Str, ISO_DATE),
            ],
            binding: status_data(
                "/attendanceDataApi/getOverTimeDatewise",
                vec![
                    field("api_key", Env(Key::AttendanceOvertimeDatewise)),
                    field("from", DayFirst("from_date")),
                    field("to", DayFirst("to_date")),
                    field("emp_number_list", TrimmedList("employee_ids")),
                ],
            ),
        },
    ]
}

fn employee_tools() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: "get_all_employees",
        description: "Get complete employee database. Use this to find an employee's ID ('employee_number') when the user asks by name.",
        params: vec![],
        binding: HttpBinding::post(
            "/masterapi/employee",
            vec![
                field("api_key", Env(Key::Employee)),
                field("datasetKey", Env(Key::EmployeeDataset)),
            ],
        )
        .with_timeout(Duration::from_secs(60))
        .with_envelope(ResponseEnvelope::Directory),
    }]
}
