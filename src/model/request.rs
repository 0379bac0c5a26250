use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::workflow::guard::FieldError;

/// Common workflow status shared by every request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    ForceApproved,
}

impl RequestStatus {
    pub fn db_value(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::ForceApproved => "force_approved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::from_str(value).ok()
    }
}

/// The request families handled by the approval engine. One enum value per
/// resource scope in the HTTP layer, one `kind` value in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    Overtime,
    Offset,
    ChangeRestday,
    Retro,
    TimeSchedule,
    TravelOrder,
    Slvl,
}

impl RequestKind {
    pub fn db_value(&self) -> &'static str {
        match self {
            RequestKind::Overtime => "overtime",
            RequestKind::Offset => "offset",
            RequestKind::ChangeRestday => "change_restday",
            RequestKind::Retro => "retro",
            RequestKind::TimeSchedule => "time_schedule",
            RequestKind::TravelOrder => "travel_order",
            RequestKind::Slvl => "slvl",
        }
    }

    /// URL segment used when mounting the resource scope.
    pub fn resource(&self) -> &'static str {
        match self {
            RequestKind::Overtime => "overtime",
            RequestKind::Offset => "offset",
            RequestKind::ChangeRestday => "change-restday",
            RequestKind::Retro => "retro",
            RequestKind::TimeSchedule => "time-schedule",
            RequestKind::TravelOrder => "travel-order",
            RequestKind::Slvl => "slvl",
        }
    }
}

/// Full request row as stored. `details` holds the kind-specific payload,
/// already validated at submission time.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RequestRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "overtime")]
    pub kind: String,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 10)]
    pub department_id: u64,
    #[schema(value_type = Object)]
    pub details: Value,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(example = "project deadline")]
    pub reason: String,
    pub remarks: Option<String>,
    #[schema(example = 7)]
    pub created_by: u64,
    pub approved_by: Option<u64>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Minimal projection the transition guard needs. Loaded before any decision
/// so authorization never trusts caller-supplied fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestHead {
    pub id: u64,
    pub employee_id: u64,
    pub department_id: u64,
    pub status: String,
    pub created_by: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OvertimeDetail {
    #[schema(example = "2026-07-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "18:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "21:00:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = 3.0)]
    pub hours: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OffsetDetail {
    /// Date the extra work was rendered.
    #[schema(example = "2026-07-05", value_type = String, format = "date")]
    pub workday: NaiveDate,
    /// Date the offset is consumed.
    #[schema(example = "2026-07-12", value_type = String, format = "date")]
    pub offset_date: NaiveDate,
    #[schema(example = 4.0)]
    pub hours: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChangeRestdayDetail {
    /// Scheduled rest day being given up.
    #[schema(example = "2026-07-13", value_type = String, format = "date")]
    pub from_date: NaiveDate,
    /// Replacement rest day.
    #[schema(example = "2026-07-15", value_type = String, format = "date")]
    pub to_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RetroDetail {
    /// First day of the payroll period the adjustment lands in.
    #[schema(example = "2026-06-01", value_type = String, format = "date")]
    pub period: NaiveDate,
    #[schema(example = 1500.0)]
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TimeScheduleDetail {
    #[schema(example = "2026-08-01", value_type = String, format = "date")]
    pub effective_date: NaiveDate,
    #[schema(example = "10:00:00", value_type = String)]
    pub time_in: NaiveTime,
    #[schema(example = "19:00:00", value_type = String)]
    pub time_out: NaiveTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TravelOrderDetail {
    #[schema(example = "2026-07-20", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-07-22", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "Cebu branch office")]
    pub destination: String,
    #[schema(example = "quarterly audit")]
    pub purpose: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Vacation,
    Unpaid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlvlDetail {
    #[schema(example = "2026-07-06", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-07-08", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    #[schema(example = true)]
    pub with_pay: bool,
}

/// Kind-specific payload, parsed and validated before a row is written.
#[derive(Debug)]
pub enum RequestDetails {
    Overtime(OvertimeDetail),
    Offset(OffsetDetail),
    ChangeRestday(ChangeRestdayDetail),
    Retro(RetroDetail),
    TimeSchedule(TimeScheduleDetail),
    TravelOrder(TravelOrderDetail),
    Slvl(SlvlDetail),
}

impl RequestDetails {
    pub fn parse(kind: RequestKind, value: Value) -> Result<Self, FieldError> {
        let parsed = match kind {
            RequestKind::Overtime => serde_json::from_value(value).map(RequestDetails::Overtime),
            RequestKind::Offset => serde_json::from_value(value).map(RequestDetails::Offset),
            RequestKind::ChangeRestday => {
                serde_json::from_value(value).map(RequestDetails::ChangeRestday)
            }
            RequestKind::Retro => serde_json::from_value(value).map(RequestDetails::Retro),
            RequestKind::TimeSchedule => {
                serde_json::from_value(value).map(RequestDetails::TimeSchedule)
            }
            RequestKind::TravelOrder => {
                serde_json::from_value(value).map(RequestDetails::TravelOrder)
            }
            RequestKind::Slvl => serde_json::from_value(value).map(RequestDetails::Slvl),
        };

        let details =
            parsed.map_err(|e| FieldError::new("details", format!("invalid payload: {e}")))?;
        details.validate()?;
        Ok(details)
    }

    fn validate(&self) -> Result<(), FieldError> {
        match self {
            RequestDetails::Overtime(d) => {
                if d.start_time >= d.end_time {
                    return Err(FieldError::new("end_time", "must be after start_time"));
                }
                if d.hours <= 0.0 {
                    return Err(FieldError::new("hours", "must be positive"));
                }
            }
            RequestDetails::Offset(d) => {
                if d.hours <= 0.0 {
                    return Err(FieldError::new("hours", "must be positive"));
                }
                if d.offset_date == d.workday {
                    return Err(FieldError::new("offset_date", "must differ from workday"));
                }
            }
            RequestDetails::ChangeRestday(d) => {
                if d.from_date == d.to_date {
                    return Err(FieldError::new("to_date", "must differ from from_date"));
                }
            }
            RequestDetails::Retro(d) => {
                if d.amount == 0.0 {
                    return Err(FieldError::new("amount", "must be non-zero"));
                }
            }
            RequestDetails::TimeSchedule(d) => {
                if d.time_in >= d.time_out {
                    return Err(FieldError::new("time_out", "must be after time_in"));
                }
            }
            RequestDetails::TravelOrder(d) => {
                if d.start_date > d.end_date {
                    return Err(FieldError::new("end_date", "must not be before start_date"));
                }
                if d.destination.trim().is_empty() {
                    return Err(FieldError::new("destination", "must not be empty"));
                }
            }
            RequestDetails::Slvl(d) => {
                if d.start_date > d.end_date {
                    return Err(FieldError::new("end_date", "must not be before start_date"));
                }
            }
        }
        Ok(())
    }

    /// Canonical JSON stored in the `details` column.
    pub fn to_value(&self) -> Value {
        match self {
            RequestDetails::Overtime(d) => serde_json::to_value(d),
            RequestDetails::Offset(d) => serde_json::to_value(d),
            RequestDetails::ChangeRestday(d) => serde_json::to_value(d),
            RequestDetails::Retro(d) => serde_json::to_value(d),
            RequestDetails::TimeSchedule(d) => serde_json::to_value(d),
            RequestDetails::TravelOrder(d) => serde_json::to_value(d),
            RequestDetails::Slvl(d) => serde_json::to_value(d),
        }
        .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_db_values() {
        for s in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::ForceApproved,
        ] {
            assert_eq!(RequestStatus::parse(s.db_value()), Some(s));
        }
        assert_eq!(RequestStatus::parse("cancelled"), None);
    }

    #[test]
    fn kind_resource_segments_are_url_safe() {
        assert_eq!(RequestKind::ChangeRestday.resource(), "change-restday");
        assert_eq!(RequestKind::ChangeRestday.db_value(), "change_restday");
    }

    #[test]
    fn overtime_details_validate_time_order() {
        let bad = json!({
            "date": "2026-07-01",
            "start_time": "21:00:00",
            "end_time": "18:00:00",
            "hours": 3.0
        });
        let err = RequestDetails::parse(RequestKind::Overtime, bad).unwrap_err();
        assert_eq!(err.field, "end_time");
    }

    #[test]
    fn slvl_details_parse_and_serialize() {
        let ok = json!({
            "start_date": "2026-07-06",
            "end_date": "2026-07-08",
            "leave_type": "sick",
            "with_pay": true
        });
        let details = RequestDetails::parse(RequestKind::Slvl, ok).unwrap();
        let stored = details.to_value();
        assert_eq!(stored["leave_type"], "sick");
    }

    #[test]
    fn malformed_payload_reports_details_field() {
        let err = RequestDetails::parse(RequestKind::Retro, json!({"amount": "x"})).unwrap_err();
        assert_eq!(err.field, "details");
    }

    #[test]
    fn retro_rejects_zero_amount() {
        let err = RequestDetails::parse(
            RequestKind::Retro,
            json!({"period": "2026-06-01", "amount": 0.0}),
        )
        .unwrap_err();
        assert_eq!(err.field, "amount");
    }
}
