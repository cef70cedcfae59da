use crate::{
    api::{attendance, groups, hours, notifications, reports, shifts, volunteers},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter config; Governor instances built
    // from the same config share one rate limiter state
    fn build_limiter(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min.max(1))
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap()
    }

    let login_limiter = build_limiter(config.rate_login_per_min);
    let register_limiter = build_limiter(config.rate_register_per_min);
    let refresh_limiter = build_limiter(config.rate_refresh_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(Governor::new(&login_limiter))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(Governor::new(&register_limiter))
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(Governor::new(&refresh_limiter))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(Governor::new(&login_limiter))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Governor::new(&protected_limiter)) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::attendance_list)),
                    )
                    // /attendance/check-in
                    .service(
                        web::resource("/check-in")
                            .route(web::post().to(attendance::check_in)),
                    )
                    // /attendance/check-out
                    .service(
                        web::resource("/check-out")
                            .route(web::post().to(attendance::check_out)),
                    )
                    // /attendance/active
                    .service(
                        web::resource("/active")
                            .route(web::get().to(attendance::active_check_ins)),
                    ),
            )
            .service(
                web::scope("/hours")
                    // /hours
                    .service(
                        web::resource("")
                            .route(web::post().to(hours::log_hours))
                            .route(web::get().to(hours::hours_list)),
                    )
                    // /hours/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(hours::approve_hours)),
                    ),
            )
            .service(
                web::scope("/reports")
                    // /reports/hours
                    .service(
                        web::resource("/hours")
                            .route(web::get().to(reports::hours_report)),
                    ),
            )
            .service(
                web::scope("/shifts")
                    // /shifts
                    .service(
                        web::resource("")
                            .route(web::post().to(shifts::create_shift))
                            .route(web::get().to(shifts::shift_list)),
                    )
                    // /shifts/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(shifts::get_shift))
                            .route(web::put().to(shifts::update_shift)),
                    )
                    // /shifts/{id}/signup
                    .service(
                        web::resource("/{id}/signup")
                            .route(web::post().to(shifts::signup_shift))
                            .route(web::delete().to(shifts::withdraw_shift)),
                    )
                    // /shifts/{id}/cancel
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(shifts::cancel_shift)),
                    ),
            )
            .service(
                web::scope("/volunteers")
                    // /volunteers
                    .service(
                        web::resource("")
                            .route(web::get().to(volunteers::volunteer_list)),
                    )
                    // /volunteers/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(volunteers::get_volunteer))
                            .route(web::put().to(volunteers::update_volunteer)),
                    )
                    // /volunteers/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(volunteers::approve_volunteer)),
                    )
                    // /volunteers/{id}/deactivate
                    .service(
                        web::resource("/{id}/deactivate")
                            .route(web::put().to(volunteers::deactivate_volunteer)),
                    ),
            )
            .service(
                web::scope("/groups")
                    // /groups
                    .service(
                        web::resource("")
                            .route(web::post().to(groups::create_group))
                            .route(web::get().to(groups::group_list)),
                    )
                    // /groups/{id}
                    .service(web::resource("/{id}").route(web::get().to(groups::get_group)))
                    // /groups/{id}/members
                    .service(
                        web::resource("/{id}/members")
                            .route(web::post().to(groups::add_member)),
                    )
                    // /groups/{id}/members/{volunteer_id}
                    .service(
                        web::resource("/{id}/members/{volunteer_id}")
                            .route(web::delete().to(groups::remove_member)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    // /notifications
                    .service(
                        web::resource("")
                            .route(web::get().to(notifications::notification_list)),
                    )
                    // /notifications/{id}/read
                    .service(
                        web::resource("/{id}/read")
                            .route(web::put().to(notifications::mark_read)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /refresh with refresh_token
//       └─ returns new access_token
