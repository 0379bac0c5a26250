use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::model::request::{RequestKind, RetroDetail};

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,

    /// First day of the payroll period
    #[schema(example = "2026-06-01", value_type = String, format = "date")]
    pub period: NaiveDate,

    #[schema(example = 50000.0)]
    pub base_salary: f64,

    #[schema(example = 2000.0)]
    pub allowance: f64,

    #[schema(example = 5000.0)]
    pub bonus: f64,

    #[schema(example = 2000.0)]
    pub deductions: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 52000.0)]
    pub base_salary: Option<f64>,

    #[schema(example = 2500.0)]
    pub allowance: Option<f64>,

    #[schema(example = 6000.0)]
    pub bonus: Option<f64>,

    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,
}

#[derive(Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollResponse {
    pub id: u64,
    pub employee_id: u64,

    #[schema(value_type = String, format = "date")]
    pub period: NaiveDate,

    pub base_salary: f64,
    pub allowance: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub retro_adjustment: f64,
    pub net_salary: f64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1001)]
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Sum of approved retro adjustments for the employee landing in the given
/// period. Details live in the request JSON, so the rows are summed here
/// rather than in SQL.
async fn retro_total(
    pool: &MySqlPool,
    employee_id: u64,
    period: NaiveDate,
) -> Result<f64, sqlx::Error> {
    let rows = sqlx::query_scalar::<_, serde_json::Value>(
        r#"
        SELECT details
        FROM approval_requests
        WHERE kind = ? AND employee_id = ? AND status IN ('approved', 'force_approved')
        "#,
    )
    .bind(RequestKind::Retro.db_value())
    .bind(employee_id)
    .fetch_all(pool)
    .await?;

    let total = rows
        .into_iter()
        .filter_map(|details| serde_json::from_value::<RetroDetail>(details).ok())
        .filter(|d| d.period.year() == period.year() && d.period.month() == period.month())
        .map(|d| d.amount)
        .sum();

    Ok(total)
}

#[utoipa::path(
    post,
    path = "/api/v1/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let retro_adjustment = retro_total(pool.get_ref(), payload.employee_id, payload.period)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to sum retro adjustments");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let net_salary = payload.base_salary + payload.allowance + payload.bonus + retro_adjustment
        - payload.deductions;

    sqlx::query(
        r#"
        INSERT INTO payroll
        (employee_id, period, base_salary, allowance, bonus, deductions, retro_adjustment, net_salary)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.period)
    .bind(payload.base_salary)
    .bind(payload.allowance)
    .bind(payload.bonus)
    .bind(payload.deductions)
    .bind(retro_adjustment)
    .bind(net_salary)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Payroll created successfully",
        "retro_adjustment": retro_adjustment,
        "net_salary": net_salary
    })))
}

#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(
        ("payroll_id", Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated"),
        (status = 404, description = "Payroll not found"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let payroll_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE payroll
        SET base_salary = COALESCE(?, base_salary),
            allowance = COALESCE(?, allowance),
            bonus = COALESCE(?, bonus),
            deductions = COALESCE(?, deductions),
            net_salary = COALESCE(?, base_salary) + COALESCE(?, allowance)
                       + COALESCE(?, bonus) + retro_adjustment - COALESCE(?, deductions)
        WHERE id = ?
        "#,
    )
    .bind(payload.base_salary)
    .bind(payload.allowance)
    .bind(payload.bonus)
    .bind(payload.deductions)
    .bind(payload.base_salary)
    .bind(payload.allowance)
    .bind(payload.bonus)
    .bind(payload.deductions)
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to update payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Payroll not found"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payroll updated successfully"
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll/{payroll_id}",
    params(
        ("payroll_id", Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll found", body = PayrollResponse),
        (status = 404, description = "Payroll not found"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payroll_id = path.into_inner();

    let payroll = sqlx::query_as::<_, PayrollResponse>(
        r#"
        SELECT id, employee_id, period, base_salary, allowance, bonus, deductions,
               retro_adjustment, net_salary
        FROM payroll
        WHERE id = ?
        "#,
    )
    .bind(payroll_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, payroll_id, "Failed to fetch payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(payroll) = payroll else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Payroll not found"
        })));
    };

    // employees may only read their own payslips
    if auth.is_employee() && auth.employee_id != Some(payroll.employee_id) {
        return Err(actix_web::error::ErrorForbidden("Forbidden"));
    }

    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payroll list", body = PaginatedPayrollResponse),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    if query.employee_id.is_some() {
        where_sql.push_str(" AND employee_id = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM payroll{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(emp_id) = query.employee_id {
        count_q = count_q.bind(emp_id);
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count payroll rows");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, period, base_salary, allowance, bonus, deductions,
               retro_adjustment, net_salary
        FROM payroll
        {}
        ORDER BY period DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, PayrollResponse>(&data_sql);
    if let Some(emp_id) = query.employee_id {
        data_q = data_q.bind(emp_id);
    }

    let payrolls = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch payroll list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data: payrolls,
        page,
        per_page,
        total,
    }))
}
