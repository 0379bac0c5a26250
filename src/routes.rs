use crate::{
    api::{attendance, employee, payroll, requests},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    model::request::RequestKind,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    Scope,
    middleware::from_fn,
    web::{self, Data},
};
use std::sync::Arc;
use strum::IntoEnumIterator;

/// One resource scope per request kind, all wired to the same generic
/// handlers; the kind travels as scope-level app data.
fn request_scope(kind: RequestKind) -> Scope {
    web::scope(&format!("/{}", kind.resource()))
        .app_data(Data::new(kind))
        .service(
            web::resource("")
                .route(web::post().to(requests::create_request))
                .route(web::get().to(requests::list_requests)),
        )
        .service(web::resource("/bulk-update").route(web::post().to(requests::bulk_update)))
        .service(web::resource("/export").route(web::get().to(requests::export_requests)))
        .service(
            web::resource("/{id}")
                .route(web::get().to(requests::get_request))
                .route(web::delete().to(requests::delete_request)),
        )
        .service(web::resource("/{id}/status").route(web::post().to(requests::update_status)))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    let mut protected = web::scope(&config.api_prefix)
        .wrap(from_fn(auth_middleware))
        // authentication
        .wrap(protected_limiter) // rate limiting
        .service(
            web::scope("/employees")
                // /employees
                .service(
                    web::resource("")
                        .route(web::post().to(employee::create_employee))
                        .route(web::get().to(employee::list_employees)),
                )
                // /employees/{id}
                .service(
                    web::resource("/{id}")
                        .route(web::put().to(employee::update_employee))
                        .route(web::get().to(employee::get_employee))
                        .route(web::delete().to(employee::delete_employee)),
                ),
        )
        .service(web::resource("/departments").route(web::get().to(employee::list_departments)))
        .service(web::resource("/job-titles").route(web::get().to(employee::list_job_titles)))
        .service(
            web::scope("/attendance")
                .service(
                    web::resource("")
                        .route(web::get().to(attendance::list_attendance)),
                )
                .service(
                    web::resource("/check-in").route(web::post().to(attendance::check_in)),
                )
                .service(
                    web::resource("/check-out").route(web::put().to(attendance::check_out)),
                )
                .service(
                    web::resource("/device-sync").route(web::post().to(attendance::sync_device)),
                ),
        )
        .service(
            web::scope("/payroll")
                .service(
                    web::resource("")
                        .route(web::post().to(payroll::create_payroll))
                        .route(web::get().to(payroll::list_payrolls)),
                )
                .service(
                    web::resource("/{id}")
                        .route(web::put().to(payroll::update_payroll))
                        .route(web::get().to(payroll::get_payroll)),
                ),
        );

    // approval workflow resources share one set of handlers
    for kind in RequestKind::iter() {
        protected = protected.service(request_scope(kind));
    }

    cfg.service(protected);
}
