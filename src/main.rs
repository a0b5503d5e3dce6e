//! Punto de entrada con subida interactiva de informes.

use doc_ai::{config::AppMode, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run(|_| AppMode::Upload).await
}
