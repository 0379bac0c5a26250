use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::model::request::{RequestDetails, RequestKind, RequestRecord};
use crate::utils::export::CsvBuilder;
use crate::workflow::capability::ApprovalAuthority;
use crate::workflow::engine::{self, BulkReport, WorkflowError};
use crate::workflow::guard::{Decision, TransitionError};

#[derive(Deserialize, ToSchema)]
pub struct CreateRequest {
    /// Subject employee; defaults to the caller's own employee profile.
    #[schema(example = 1000)]
    pub employee_id: Option<u64>,
    #[schema(example = "project cutover ran past shift end")]
    pub reason: String,
    /// Kind-specific fields, validated against the resource's schema.
    #[schema(value_type = Object)]
    pub details: Value,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusUpdate {
    #[schema(example = "approved")]
    pub target: Decision,
    #[schema(example = "ok per plant manager", nullable = true)]
    pub remarks: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkUpdate {
    #[schema(example = json!([11, 12, 13]))]
    pub ids: Vec<u64>,
    #[schema(example = "approved")]
    pub target: Decision,
    pub remarks: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct RequestFilter {
    #[schema(example = "pending")]
    /// Filter by workflow status
    pub status: Option<String>,
    #[schema(example = 1000)]
    /// Filter by subject employee
    pub employee_id: Option<u64>,
    #[schema(example = 10)]
    /// Filter by department
    pub department_id: Option<u64>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 20)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct RequestListResponse {
    pub data: Vec<RequestRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

fn workflow_response(err: WorkflowError) -> actix_web::Result<HttpResponse> {
    match err {
        WorkflowError::Transition(TransitionError::NotFound) => {
            Ok(HttpResponse::NotFound().json(json!({
                "message": "Request not found"
            })))
        }
        WorkflowError::Transition(TransitionError::AlreadyProcessed(_)) => {
            Ok(HttpResponse::BadRequest().json(json!({
                "message": "Request not found or already processed"
            })))
        }
        WorkflowError::Transition(TransitionError::Forbidden) => {
            // deliberately generic
            Ok(HttpResponse::Forbidden().json(json!({
                "message": "Forbidden"
            })))
        }
        WorkflowError::Transition(TransitionError::Validation(f)) => {
            Ok(HttpResponse::BadRequest().json(json!({
                "errors": { f.field: f.message }
            })))
        }
        WorkflowError::Db(e) => {
            tracing::error!(error = %e, "workflow database error");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Resolve the subject employee and their department for a new submission.
async fn resolve_subject(
    auth: &AuthUser,
    pool: &MySqlPool,
    requested: Option<u64>,
) -> actix_web::Result<Result<(u64, u64), HttpResponse>> {
    let employee_id = match requested.or(auth.employee_id) {
        Some(id) => id,
        None => {
            return Ok(Err(HttpResponse::BadRequest().json(json!({
                "errors": { "employee_id": "caller has no employee profile" }
            }))));
        }
    };

    let department_id =
        sqlx::query_scalar::<_, u64>("SELECT department_id FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, employee_id, "Failed to resolve employee");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;

    let Some(department_id) = department_id else {
        return Ok(Err(HttpResponse::BadRequest().json(json!({
            "errors": { "employee_id": "unknown employee" }
        }))));
    };

    // Filing on behalf of someone else needs authority over their department.
    if Some(employee_id) != auth.employee_id {
        let actor = auth.actor_context();
        if !actor.authority.covers(department_id) {
            return Ok(Err(HttpResponse::Forbidden().json(json!({
                "message": "Forbidden"
            }))));
        }
    }

    Ok(Ok((employee_id, department_id)))
}

/// Submit a new request of the scope's kind
#[utoipa::path(
    post,
    path = "/api/v1/{resource}",
    request_body = CreateRequest,
    params(
        ("resource" = String, Path, description = "Request resource, e.g. overtime, offset, slvl")
    ),
    responses(
        (status = 201, description = "Request submitted", body = Object, example = json!({
            "id": 42,
            "status": "pending"
        })),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn create_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    payload: web::Json<CreateRequest>,
) -> actix_web::Result<impl Responder> {
    let kind = *kind.get_ref();
    let payload = payload.into_inner();

    if payload.reason.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "errors": { "reason": "must not be empty" }
        })));
    }

    let (employee_id, department_id) =
        match resolve_subject(&auth, pool.get_ref(), payload.employee_id).await? {
            Ok(subject) => subject,
            Err(resp) => return Ok(resp),
        };

    let details = match RequestDetails::parse(kind, payload.details) {
        Ok(d) => d,
        Err(f) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "errors": { f.field: f.message }
            })));
        }
    };

    let id = engine::submit(
        pool.get_ref(),
        kind,
        employee_id,
        department_id,
        &details,
        payload.reason.trim(),
        auth.user_id,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, kind = kind.db_value(), "Failed to submit request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "status": "pending"
    })))
}

/// Visibility scoping shared by list and export: employees see themselves,
/// department managers their department, global roles everything.
fn scope_filter(auth: &AuthUser, query: &RequestFilter) -> Result<(Option<u64>, Option<u64>), ()> {
    let actor = auth.actor_context();
    match actor.authority {
        ApprovalAuthority::Global => Ok((query.employee_id, query.department_id)),
        ApprovalAuthority::Department(dept) => Ok((query.employee_id, Some(dept))),
        ApprovalAuthority::None => match auth.employee_id {
            Some(own) => Ok((Some(own), None)),
            None => Err(()),
        },
    }
}

fn build_where<'a>(
    kind: RequestKind,
    status: Option<&'a str>,
    employee_id: Option<u64>,
    department_id: Option<u64>,
) -> (String, Vec<FilterValue<'a>>) {
    let mut where_sql = String::from(" WHERE kind = ?");
    let mut args: Vec<FilterValue> = vec![FilterValue::Str(kind.db_value())];

    if let Some(status) = status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }
    if let Some(emp_id) = employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }
    if let Some(dept_id) = department_id {
        where_sql.push_str(" AND department_id = ?");
        args.push(FilterValue::U64(dept_id));
    }

    (where_sql, args)
}

/// Paginated request listing for the scope's kind
#[utoipa::path(
    get,
    path = "/api/v1/{resource}",
    params(RequestFilter),
    responses(
        (status = 200, description = "Paginated request list", body = RequestListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn list_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    query: web::Query<RequestFilter>,
) -> actix_web::Result<impl Responder> {
    let kind = *kind.get_ref();

    let Ok((employee_id, department_id)) = scope_filter(&auth, &query) else {
        return Err(actix_web::error::ErrorForbidden("No employee profile"));
    };

    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let (where_sql, args) = build_where(kind, query.status.as_deref(), employee_id, department_id);

    let count_sql = format!("SELECT COUNT(*) FROM approval_requests{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, kind, employee_id, department_id, details, status, reason, remarks,
               created_by, approved_by, approved_at, created_at
        FROM approval_requests
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, RequestRecord>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let records = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch request list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(RequestListResponse {
        data: records,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/// Fetch one request
#[utoipa::path(
    get,
    path = "/api/v1/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Request resource"),
        ("id" = u64, Path, description = "Request id")
    ),
    responses(
        (status = 200, description = "Request found", body = RequestRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn get_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let kind = *kind.get_ref();
    let id = path.into_inner();

    let record = sqlx::query_as::<_, RequestRecord>(
        r#"
        SELECT id, kind, employee_id, department_id, details, status, reason, remarks,
               created_by, approved_by, approved_at, created_at
        FROM approval_requests
        WHERE id = ? AND kind = ?
        "#,
    )
    .bind(id)
    .bind(kind.db_value())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, id, "Failed to fetch request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(record) = record else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Request not found"
        })));
    };

    let actor = auth.actor_context();
    let visible = actor.authority.covers(record.department_id)
        || auth.employee_id == Some(record.employee_id)
        || record.created_by == auth.user_id;
    if !visible {
        return Ok(HttpResponse::Forbidden().json(json!({ "message": "Forbidden" })));
    }

    Ok(HttpResponse::Ok().json(record))
}

/// Decide one request: approve, reject, or force-approve
#[utoipa::path(
    post,
    path = "/api/v1/{resource}/{id}/status",
    request_body = StatusUpdate,
    params(
        ("resource" = String, Path, description = "Request resource"),
        ("id" = u64, Path, description = "Request id")
    ),
    responses(
        (status = 200, description = "Decision applied", body = Object, example = json!({
            "message": "Request approved"
        })),
        (status = 400, description = "Validation error or already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn update_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    path: web::Path<u64>,
    payload: web::Json<StatusUpdate>,
) -> actix_web::Result<impl Responder> {
    let kind = *kind.get_ref();
    let id = path.into_inner();
    let actor = auth.actor_context();

    match engine::decide(
        pool.get_ref(),
        kind,
        id,
        &actor,
        payload.target,
        payload.remarks.as_deref(),
    )
    .await
    {
        Ok(()) => {
            let verb = match payload.target {
                Decision::Approved => "approved",
                Decision::Rejected => "rejected",
                Decision::ForceApproved => "force-approved",
            };
            Ok(HttpResponse::Ok().json(json!({
                "message": format!("Request {verb}")
            })))
        }
        Err(e) => workflow_response(e),
    }
}

/// Apply one decision across many requests
#[utoipa::path(
    post,
    path = "/api/v1/{resource}/bulk-update",
    request_body = BulkUpdate,
    params(
        ("resource" = String, Path, description = "Request resource")
    ),
    responses(
        (status = 200, description = "Per-record outcome report", body = BulkReport),
        (status = 400, description = "Empty id list"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn bulk_update(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    payload: web::Json<BulkUpdate>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let kind = *kind.get_ref();
    let payload = payload.into_inner();

    if payload.ids.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "errors": { "ids": "must not be empty" }
        })));
    }

    let actor = auth.actor_context();
    let report = engine::decide_bulk(
        pool.get_ref(),
        kind,
        &payload.ids,
        &actor,
        payload.target,
        payload.remarks.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Bulk update failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(report))
}

/// Delete one request under the ownership rule
#[utoipa::path(
    delete,
    path = "/api/v1/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Request resource"),
        ("id" = u64, Path, description = "Request id")
    ),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn delete_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let kind = *kind.get_ref();
    let id = path.into_inner();
    let actor = auth.actor_context();

    match engine::delete(pool.get_ref(), kind, id, &actor).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "message": "Successfully deleted"
        }))),
        Err(e) => workflow_response(e),
    }
}

const EXPORT_ROW_CAP: u64 = 10_000;

/// CSV export of the scope-visible requests
#[utoipa::path(
    get,
    path = "/api/v1/{resource}/export",
    params(RequestFilter),
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Requests"
)]
pub async fn export_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    kind: web::Data<RequestKind>,
    query: web::Query<RequestFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;

    let kind = *kind.get_ref();
    let Ok((employee_id, department_id)) = scope_filter(&auth, &query) else {
        return Err(actix_web::error::ErrorForbidden("No employee profile"));
    };

    let (where_sql, args) = build_where(kind, query.status.as_deref(), employee_id, department_id);

    let data_sql = format!(
        r#"
        SELECT id, kind, employee_id, department_id, details, status, reason, remarks,
               created_by, approved_by, approved_at, created_at
        FROM approval_requests
        {}
        ORDER BY created_at DESC
        LIMIT ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, RequestRecord>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let records = data_q
        .bind(EXPORT_ROW_CAP)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to export requests");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let mut csv = CsvBuilder::new(&[
        "id",
        "kind",
        "employee_id",
        "department_id",
        "status",
        "reason",
        "remarks",
        "approved_by",
        "approved_at",
        "created_at",
        "details",
    ]);

    for r in &records {
        csv.push_row([
            r.id.to_string(),
            r.kind.clone(),
            r.employee_id.to_string(),
            r.department_id.to_string(),
            r.status.clone(),
            r.reason.clone(),
            r.remarks.clone().unwrap_or_default(),
            r.approved_by.map(|v| v.to_string()).unwrap_or_default(),
            r.approved_at.map(|v| v.to_rfc3339()).unwrap_or_default(),
            r.created_at.map(|v| v.to_rfc3339()).unwrap_or_default(),
            r.details.to_string(),
        ]);
    }

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}-requests.csv\"", kind.resource()),
        ))
        .body(csv.finish()))
}
