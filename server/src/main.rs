use actix_web::{middleware as actix_middleware, web, App, HttpServer};

use veil::config::ProxyConfig;
use veil::handlers;
use veil::proxy::ProxyState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if it exists (for development)
    dotenvy::dotenv().ok();

    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting veil...");
    log::info!("Protocol version: {}", protocol::protocol_version());

    let config_path = std::env::var("VEIL_CONFIG").unwrap_or_else(|_| "veil.toml".to_string());

    let config = ProxyConfig::load(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration from '{}': {}", config_path, e);
        eprintln!("Hint: set VEIL_HOMESERVER or point VEIL_CONFIG at a config file");
        std::process::exit(1);
    });

    log::info!("Proxying homeserver {}", config.homeserver);
    if let Some(proxy) = &config.proxy {
        log::info!("Upstream requests go through proxy {}", proxy);
    }
    if config.ssl_insecure {
        log::warn!("TLS verification for the homeserver is disabled");
    }
    log::info!("Device trust policy: {:?}", config.device_trust);

    let state = ProxyState::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Failed to initialise proxy: {}", e);
        std::process::exit(1);
    });
    let state = web::Data::new(state);
    let state_for_app = state.clone();
    let max_body_bytes = config.max_body_bytes;

    log::info!(
        "Starting HTTP server at {}:{}...",
        config.listen_address,
        config.listen_port
    );

    let http_result = HttpServer::new(move || {
        App::new()
            .app_data(state_for_app.clone())
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind((config.listen_address, config.listen_port))?
    .run()
    .await;

    let closed = state.registry().drain_all().await;
    log::info!("Shutdown complete ({} sessions closed)", closed);

    http_result
}
