//! Arranque compartido por los dos puntos de entrada.

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::{
    api,
    app_state::{AppState, SessionStore},
    config::{AppConfig, AppMode},
    intake,
    llm::LlmManager,
    models::{Notice, Summary},
    report,
};

/// Logging con `RUST_LOG`; por defecto, nivel info.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();
}

/// Prepara el estado. En modo estático resume aquí el fichero fijo: si falla,
/// el servidor arranca igualmente y el error queda en `startup_notice`.
pub async fn build_state(config: AppConfig, mode: AppMode, llm_manager: LlmManager) -> AppState {
    let (static_summary, startup_notice) = match &mode {
        AppMode::Upload if llm_manager.is_configured() => {
            (None, Notice::info("Sube un informe PDF para empezar."))
        }
        AppMode::Upload => (
            None,
            Notice::error(crate::error::ReportError::MissingApiKey.to_string()),
        ),
        AppMode::Static { report_path } => {
            match load_static_summary(&llm_manager, report_path).await {
                Ok(summary) => {
                    info!("Resumen de {} cargado", report_path.display());
                    (Some(summary), Notice::success("Resumen del informe cargado."))
                }
                Err(err) => {
                    error!("No se pudo resumir el informe fijo: {}", err);
                    (None, Notice::error(err.to_string()))
                }
            }
        }
    };

    let sessions = SessionStore::from_config(&config);
    AppState {
        config,
        mode,
        llm_manager,
        sessions,
        static_summary,
        startup_notice,
    }
}

async fn load_static_summary(
    llm_manager: &LlmManager,
    report_path: &std::path::Path,
) -> Result<Summary, crate::error::ReportError> {
    // Mismo orden que en el resumen: primero la clave, luego el fichero.
    llm_manager.model()?;
    intake::check_pdf_path(report_path)?;
    report::summarize_report(llm_manager, report_path).await
}

/// Router completo: API, frontend estático, CORS y trazas HTTP.
pub fn build_app(state: AppState) -> Router {
    let frontend_dir = state.config.frontend_dir.clone();
    Router::new()
        .merge(api::create_router(state))
        .fallback_service(ServeDir::new(frontend_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Carga configuración, arranca el servidor y espera a Ctrl+C.
pub async fn run(mode_for: impl FnOnce(&AppConfig) -> AppMode) -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;
    let mode = mode_for(&cfg);
    let llm_manager = LlmManager::from_config(&cfg);

    let app_state = build_state(cfg, mode, llm_manager).await;
    let server_addr = app_state.config.server_addr.clone();
    let open_browser = app_state.config.open_browser;
    info!(
        "Modo '{}' con modelo {}",
        app_state.mode.label(),
        app_state.llm_manager.model_name
    );

    let app = build_app(app_state);

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
