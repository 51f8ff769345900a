use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use prepdesk_server::{
    app_state::AppState,
    auth::{AuthMiddleware, JwtService},
    config::Config,
    handlers,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    config.validate_for_production();

    let state = Arc::new(
        AppState::new(config.clone())
            .await
            .expect("failed to initialize application state"),
    );

    // Attempts left IN_PROGRESS by a previous process must keep being swept.
    if let Err(e) = state.scheduler.reconcile_from_store().await {
        log::error!("Failed to reconcile auto-submit state: {}", e);
    }

    let jwt_service = web::Data::new(JwtService::new(&config.jwt_secret));

    let bind_addr = (config.web_server_host.clone(), config.web_server_port);
    log::info!(
        "Starting server on {}:{}",
        config.web_server_host,
        config.web_server_port
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .app_data(jwt_service.clone())
            .service(handlers::health_check)
            .service(handlers::health_check_ready)
            .service(
                web::scope("/api/test-attempts")
                    .wrap(AuthMiddleware)
                    .service(handlers::my_attempts)
                    .service(handlers::start_attempt)
                    .service(handlers::submit_question)
                    .service(handlers::visit_question)
                    .service(handlers::submit_test)
                    .service(handlers::live_questions)
                    .service(handlers::result_analysis)
                    .service(handlers::leaderboard),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
