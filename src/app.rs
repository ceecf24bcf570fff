use std::{sync::Arc, time::Instant};

use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceFactory, ServiceRequest, ServiceResponse},
    http::header::{self, HeaderName, HeaderValue},
    middleware::Logger,
    web, App, HttpServer,
};
use env_logger::Env;
use log::{debug, info};
use uuid::Uuid;

use crate::{
    config::{Config, Environment},
    db::Database,
    errors::AppError,
    middleware::{BodyLimits, ErrorNormalizer, RequestParser, RequestTimeout},
    repositories::UserRepository,
    routes,
    services::{purge_sessions_periodically, UserService},
    supervisor::{install_panic_hook, Supervisor},
    types::AppState,
};

// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

// Setup logging with custom format and configuration
fn setup_logging(config: &Config) -> Result<(), AppError> {
    let log_level = match config.app.environment {
        Environment::Development => config.app.log_level.clone(),
        Environment::Testing => "debug,actix_web=info,sqlx=warn".to_string(),
        Environment::Production => "info,actix_web=warn,sqlx=warn".to_string(),
    };

    let env = Env::default()
        .filter_or("RUST_LOG", log_level)
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::try_init_from_env(env)
        .map_err(|e| AppError::Logger(format!("Failed to initialize logger: {}", e)))
}

fn log_format(environment: Environment) -> &'static str {
    match environment {
        Environment::Production => {
            "%a \"%r\" %s %b %T \"%{Referer}i\" \"%{User-Agent}i\" %{x-request-id}o"
        }
        _ => "%a \"%r\" %s %b %T %{x-request-id}o",
    }
}

fn cors(allowed_origin: &str) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600);

    if allowed_origin == "*" {
        cors.allow_any_origin()
    } else {
        cors.allowed_origin(allowed_origin)
    }
}

/// Everything a worker needs to assemble its copy of the application.
#[derive(Clone)]
pub struct AppDependencies {
    pub config: Config,
    pub state: web::Data<AppState>,
    pub users: web::Data<UserService>,
}

/// Assemble the application: shared data, routes, the not-found fallback,
/// and the middleware stack. Registration is innermost first, so requests
/// pass through access log, request id, error normalization, CORS, timeout,
/// and request parsing before reaching a route.
pub fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        config,
        state,
        users,
    } = deps;
    let limits = BodyLimits {
        json: config.server.json_limit_bytes,
        form: config.server.form_limit_bytes,
    };

    App::new()
        .app_data(state)
        .app_data(users)
        .app_data(web::Data::new(config.session.clone()))
        .configure(routes::configure_routes)
        .default_service(web::to(routes::not_found))
        .wrap(RequestParser::new(limits))
        .wrap(RequestTimeout::new(config.server.request_timeout()))
        .wrap(cors(&config.server.cors_allowed_origin))
        .wrap(ErrorNormalizer::new(config.app.environment))
        .wrap_fn(|req, srv| {
            let request_id = req.headers().get(&REQUEST_ID).cloned();
            let fut = srv.call(req);
            async move {
                let mut res = fut.await?;
                let request_id = request_id
                    .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());
                if let Some(value) = request_id {
                    res.headers_mut().insert(REQUEST_ID, value);
                }
                Ok(res)
            }
        })
        .wrap(Logger::new(log_format(config.app.environment)))
}

pub async fn server() -> AppResult<()> {
    // Load application configuration
    let config = Config::load()?;

    // Setup enhanced logging based on configuration
    setup_logging(&config)?;

    // Capture start time for uptime calculation
    let start_time = Instant::now();

    info!("Starting {} v{}", config.app.name, config.app.version);
    info!("Environment: {:?}", config.app.environment);

    if config.app.environment == Environment::Development {
        debug!("Full configuration: {:?}", config);
    }

    let supervisor = Supervisor::new();
    install_panic_hook(supervisor.reporter());
    let lifecycle = supervisor.lifecycle();
    let db_config = config.db.clone();

    supervisor
        .run(
            async move { Database::connect(&db_config).await },
            move |db, reporter| {
                let repository = Arc::new(UserRepository::new(db));
                let users = UserService::new(repository, config.session.ttl());

                let deps = AppDependencies {
                    state: web::Data::new(AppState {
                        start_time,
                        version: config.app.version.clone(),
                        lifecycle,
                        db: Some(db.clone()),
                    }),
                    users: web::Data::new(users.clone()),
                    config: config.clone(),
                };

                info!(
                    "Binding to {}:{} with {} workers",
                    config.server.host, config.server.port, config.server.workers
                );
                let server = HttpServer::new(move || build_app(deps.clone()))
                    .workers(config.server.workers)
                    .shutdown_timeout(config.server.shutdown_timeout_seconds)
                    .bind((config.server.host, config.server.port))?
                    .run();
                info!(
                    "Server running on http://{}:{}",
                    config.server.host, config.server.port
                );

                reporter.spawn_guarded(
                    "session-purge",
                    purge_sessions_periodically(users, config.session.purge_interval()),
                );

                Ok(server)
            },
        )
        .await
}
