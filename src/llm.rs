//! Abstracción sobre Rig para hablar con Gemini.
//!
//! `ReportModel` es la costura que usa el resto de la aplicación: la
//! implementación real (`GeminiModel`) extrae el texto del PDF y lo manda al
//! modelo; los tests usan un doble que cuenta llamadas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::ReportError;

/// Servicio remoto de IA: resumen de documentos y generación de texto.
#[async_trait]
pub trait ReportModel: Send + Sync {
    /// Resume el PDF que hay en `pdf_path`.
    async fn summarize(&self, pdf_path: &Path) -> Result<String>;

    /// Una única llamada de generación, sin historial.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

const SUMMARY_PREAMBLE: &str = r#"
You are a medical document assistant. You receive the raw text of a patient's
laboratory / biochemistry report. Produce a concise, well-organized Markdown
summary listing every measured parameter that is out of its reference range
(value, range, High/Low, and a severity grade such as mild/moderate/severe),
followed by a short overall interpretation. Do not invent values that are not
in the report.
"#;

/// Cliente de Gemini a través de Rig.
pub struct GeminiModel {
    api_key: String,
    model_name: String,
}

impl GeminiModel {
    pub fn new(api_key: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_name: model_name.into(),
        }
    }

    async fn prompt_with_preamble(&self, preamble: Option<&str>, text: &str) -> Result<String> {
        use rig::client::CompletionClient as _;
        use rig::providers::gemini;

        let client = gemini::Client::new(&self.api_key);
        let mut builder = client.agent(&self.model_name);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        let agent = builder.build();

        let answer = agent.prompt(text).await?;
        Ok(answer)
    }
}

#[async_trait]
impl ReportModel for GeminiModel {
    async fn summarize(&self, pdf_path: &Path) -> Result<String> {
        let path: PathBuf = pdf_path.to_path_buf();
        // pdf-extract es síncrono y puede tardar con informes largos.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .context("la tarea de extracción de texto terminó de forma inesperada")?
            .map_err(|e| ReportError::EmptyDocument(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ReportError::EmptyDocument(format!(
                "{} no contiene texto extraíble",
                pdf_path.display()
            ))
            .into());
        }

        info!(
            "Enviando {} caracteres de {} a {} para resumir",
            text.len(),
            pdf_path.display(),
            self.model_name
        );
        self.prompt_with_preamble(Some(SUMMARY_PREAMBLE), text).await
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompt_with_preamble(None, prompt).await
    }
}

/// Gestor del modelo. Sin clave de API no hay modelo, y por tanto ninguna
/// operación llega a hacer una llamada remota.
#[derive(Clone)]
pub struct LlmManager {
    model: Option<Arc<dyn ReportModel>>,
    pub model_name: String,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let model = match &cfg.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiModel::new(key.clone(), cfg.gemini_model.clone()))
                as Arc<dyn ReportModel>),
            None => {
                warn!("GEMINI_API_KEY no está definida: no se harán llamadas a Gemini.");
                None
            }
        };
        Self {
            model,
            model_name: cfg.gemini_model.clone(),
        }
    }

    /// Manager con un modelo arbitrario (otro proveedor o un doble de test).
    pub fn with_model(model: Arc<dyn ReportModel>, model_name: impl Into<String>) -> Self {
        Self {
            model: Some(model),
            model_name: model_name.into(),
        }
    }

    /// Manager sin clave configurada.
    pub fn unconfigured(model_name: impl Into<String>) -> Self {
        Self {
            model: None,
            model_name: model_name.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Devuelve el modelo o el error de configuración.
    pub fn model(&self) -> Result<&dyn ReportModel, ReportError> {
        self.model.as_deref().ok_or(ReportError::MissingApiKey)
    }
}

impl std::fmt::Debug for LlmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmManager")
            .field("model_name", &self.model_name)
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Convierte el error del modelo en el error de dominio, conservando los
/// errores de dominio que el propio modelo haya devuelto.
pub fn into_report_error(err: anyhow::Error) -> ReportError {
    match err.downcast::<ReportError>() {
        Ok(domain) => domain,
        Err(other) => ReportError::Remote(format!("{other:#}")),
    }
}
