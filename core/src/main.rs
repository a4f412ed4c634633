mod cors;

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::env_config::Config;
use family::{FamilyService, PgBackend};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // get env vars
    let config = Config::from_env();
    let config_data = config.clone();

    // get info
    let is_production = config.environment == "production";
    let origin = config.cors_allowed_origin.clone();

    // init logger
    logger::setup(&config.log_file, config.console_logging_enabled)
        .expect("Failed to set up logger");

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    // one engine shared by every worker
    let family = web::Data::new(FamilyService::new(
        PgBackend::new(pool.clone()),
        config.family.clone(),
    ));

    log::info!(
        "Starting family service on {}:{} with {} workers",
        config.server_host,
        config.server_port,
        config.num_workers
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config_data.clone()))
            .app_data(family.clone())
            .wrap(logger::middleware()) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    // hooks first, "/family" would swallow "/family/hooks"
                    .service(
                        api_family::mount_hooks()
                            .wrap(api_family::hook_key_middleware(&config_data)),
                    )
                    .service(
                        api_family::mount_family()
                            .wrap(api_family::auth_middleware(&config_data)),
                    ),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
