use std::collections::BTreeMap;
use std::time::Duration;

use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::device::{AttendanceDevice, PunchRecord, UdpDeviceClient};
use crate::model::attendance::Attendance;
use crate::utils::employee_cache;

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully"),
        (status = 400, description = "Already checked in today"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, source)
        VALUES (?, CURDATE(), CURTIME(), 'manual')
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Checked in successfully"
        }))),

        Err(e) => {
            // Duplicate check-in for same day
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                        "message": "Already checked in today"
                    })));
                }
            }

            tracing::error!(error = %e, employee_id, "Check-in failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully"),
        (status = 400, description = "No active check-in found for today"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = CURTIME()
        WHERE employee_id = ?
        AND date = CURDATE()
        AND check_out IS NULL
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Check-out failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "No active check-in found for today"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Checked out successfully"
    })))
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Filter by employee; employees are always scoped to themselves
    pub employee_id: Option<u64>,
    #[schema(example = "2026-07-01", value_type = String, format = "date")]
    pub from: Option<NaiveDate>,
    #[schema(example = "2026-07-31", value_type = String, format = "date")]
    pub to: Option<NaiveDate>,
}

/// Attendance listing
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance rows", body = Vec<Attendance>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = if auth.is_employee() {
        Some(
            auth.employee_id
                .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?,
        )
    } else {
        query.employee_id
    };

    let mut sql = String::from(
        "SELECT id, employee_id, date, check_in, check_out, source FROM attendance WHERE 1=1",
    );
    if employee_id.is_some() {
        sql.push_str(" AND employee_id = ?");
    }
    if query.from.is_some() {
        sql.push_str(" AND date >= ?");
    }
    if query.to.is_some() {
        sql.push_str(" AND date <= ?");
    }
    sql.push_str(" ORDER BY date DESC LIMIT 500");

    let mut q = sqlx::query_as::<_, Attendance>(&sql);
    if let Some(id) = employee_id {
        q = q.bind(id);
    }
    if let Some(from) = query.from {
        q = q.bind(from);
    }
    if let Some(to) = query.to {
        q = q.bind(to);
    }

    let rows = q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch attendance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct SyncQuery {
    /// Clear the device log after a successful pull
    pub clear: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct SyncReport {
    #[schema(example = 54)]
    pub fetched: usize,
    #[schema(example = 27)]
    pub imported_days: usize,
    #[schema(example = 2)]
    pub unknown_pins: usize,
    #[schema(example = true)]
    pub cleared: bool,
}

/// First/last punch per (pin, day); the earliest punch becomes check-in and
/// the latest check-out.
pub fn fold_punches(punches: &[PunchRecord]) -> BTreeMap<(String, NaiveDate), (NaiveTime, NaiveTime)> {
    let mut days: BTreeMap<(String, NaiveDate), (NaiveTime, NaiveTime)> = BTreeMap::new();

    for punch in punches {
        let key = (punch.pin.clone(), punch.at.date());
        let time = punch.at.time();
        days.entry(key)
            .and_modify(|(first, last)| {
                if time < *first {
                    *first = time;
                }
                if time > *last {
                    *last = time;
                }
            })
            .or_insert((time, time));
    }

    days
}

/// Pull punches from the biometric terminal and fold them into attendance
#[utoipa::path(
    post,
    path = "/api/v1/attendance/device-sync",
    params(SyncQuery),
    responses(
        (status = 200, description = "Sync report", body = SyncReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 502, description = "Device unreachable")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn sync_device(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<SyncQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let mut device = UdpDeviceClient::new(
        config.device_addr.clone(),
        Duration::from_millis(config.device_timeout_ms),
    );

    let clear = query.clear.unwrap_or(false);
    let punches = pull_device_logs(&mut device, clear).await.map_err(|e| {
        tracing::error!(error = %e, addr = %config.device_addr, "Device sync failed");
        actix_web::error::ErrorBadGateway("Device unreachable")
    })?;

    let report = import_punches(pool.get_ref(), &punches, clear).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Full device conversation for one sync run. Disconnects even on failure.
pub async fn pull_device_logs<D: AttendanceDevice>(
    device: &mut D,
    clear: bool,
) -> Result<Vec<PunchRecord>, crate::device::DeviceError> {
    device.connect().await?;

    let result = async {
        let punches = device.get_attendance().await?;
        // only wipe the device log once the records are in hand
        if clear && !punches.is_empty() {
            device.clear_attendance().await?;
        }
        Ok(punches)
    }
    .await;

    let _ = device.disconnect().await;
    result
}

async fn import_punches(
    pool: &MySqlPool,
    punches: &[PunchRecord],
    cleared: bool,
) -> actix_web::Result<SyncReport> {
    let days = fold_punches(punches);

    let mut imported_days = 0usize;
    let mut unknown_pins = 0usize;

    for ((pin, date), (first, last)) in days {
        let Some(employee_id) = employee_cache::resolve_pin(pool, &pin).await else {
            tracing::warn!(pin = %pin, "punch from unenrolled PIN skipped");
            unknown_pins += 1;
            continue;
        };

        sqlx::query(
            r#"
            INSERT INTO attendance (employee_id, date, check_in, check_out, source)
            VALUES (?, ?, ?, ?, 'device')
            ON DUPLICATE KEY UPDATE
                check_in = LEAST(check_in, VALUES(check_in)),
                check_out = GREATEST(COALESCE(check_out, VALUES(check_out)), VALUES(check_out))
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(first)
        .bind(last)
        .execute(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, %date, "Failed to upsert attendance");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

        imported_days += 1;
    }

    Ok(SyncReport {
        fetched: punches.len(),
        imported_days,
        unknown_pins,
        cleared: cleared && !punches.is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn punch(pin: &str, y: i32, m: u32, d: u32, h: u32, min: u32) -> PunchRecord {
        PunchRecord {
            pin: pin.into(),
            at: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap(),
        }
    }

    #[test]
    fn fold_keeps_earliest_and_latest_punch_per_day() {
        let punches = vec![
            punch("1042", 2026, 7, 1, 12, 2),
            punch("1042", 2026, 7, 1, 7, 58),
            punch("1042", 2026, 7, 1, 17, 4),
            punch("1042", 2026, 7, 2, 8, 1),
        ];

        let days = fold_punches(&punches);
        assert_eq!(days.len(), 2);

        let day1 = &days[&("1042".to_string(), NaiveDate::from_ymd_opt(2026, 7, 1).unwrap())];
        assert_eq!(day1.0, NaiveTime::from_hms_opt(7, 58, 0).unwrap());
        assert_eq!(day1.1, NaiveTime::from_hms_opt(17, 4, 0).unwrap());

        let day2 = &days[&("1042".to_string(), NaiveDate::from_ymd_opt(2026, 7, 2).unwrap())];
        assert_eq!(day2.0, day2.1);
    }

    #[test]
    fn fold_separates_pins() {
        let punches = vec![
            punch("1042", 2026, 7, 1, 8, 0),
            punch("2001", 2026, 7, 1, 8, 5),
        ];
        assert_eq!(fold_punches(&punches).len(), 2);
    }

    /// Scripted stand-in for the terminal.
    struct ScriptedDevice {
        punches: Vec<PunchRecord>,
        connected: bool,
        cleared: bool,
        disconnects: usize,
        fail_fetch: bool,
    }

    impl ScriptedDevice {
        fn new(punches: Vec<PunchRecord>) -> Self {
            Self {
                punches,
                connected: false,
                cleared: false,
                disconnects: 0,
                fail_fetch: false,
            }
        }
    }

    #[async_trait]
    impl AttendanceDevice for ScriptedDevice {
        async fn connect(&mut self) -> Result<(), DeviceError> {
            self.connected = true;
            Ok(())
        }

        async fn get_attendance(&mut self) -> Result<Vec<PunchRecord>, DeviceError> {
            if self.fail_fetch {
                return Err(DeviceError::NotConnected);
            }
            Ok(self.punches.clone())
        }

        async fn clear_attendance(&mut self) -> Result<(), DeviceError> {
            self.cleared = true;
            self.punches.clear();
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), DeviceError> {
            self.connected = false;
            self.disconnects += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn pull_clears_only_after_successful_fetch() {
        let mut device = ScriptedDevice::new(vec![punch("1042", 2026, 7, 1, 8, 0)]);
        let punches = pull_device_logs(&mut device, true).await.unwrap();
        assert_eq!(punches.len(), 1);
        assert!(device.cleared);
        assert_eq!(device.disconnects, 1);
    }

    #[tokio::test]
    async fn pull_skips_clear_when_log_is_empty() {
        let mut device = ScriptedDevice::new(Vec::new());
        let punches = pull_device_logs(&mut device, true).await.unwrap();
        assert!(punches.is_empty());
        assert!(!device.cleared);
    }

    #[tokio::test]
    async fn pull_disconnects_after_fetch_failure() {
        let mut device = ScriptedDevice::new(Vec::new());
        device.fail_fetch = true;
        assert!(pull_device_logs(&mut device, false).await.is_err());
        assert_eq!(device.disconnects, 1);
    }
}
