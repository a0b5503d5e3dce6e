//! Punto de entrada con informe fijo: resume `STATIC_REPORT_PATH` al arrancar
//! y solo permite hacer preguntas sobre él.

use doc_ai::{config::AppMode, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run(|cfg| AppMode::Static {
        report_path: cfg.static_report_path.clone(),
    })
    .await
}
