//! Error de dominio único para intake, resumen y conversación.
//!
//! Cada operación sigue teniendo un único punto de fallo visible para el
//! usuario (un mensaje de texto), pero las variantes permiten a la capa HTTP
//! elegir el nivel del aviso y el código de estado.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// El fichero subido o configurado no termina en `.pdf`.
    #[error("Solo se admiten ficheros PDF: '{name}'")]
    NotPdf { name: String },

    #[error("Fichero no encontrado: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("La clave de API de Gemini no está configurada (GEMINI_API_KEY).")]
    MissingApiKey,

    #[error("No hay ningún resumen disponible. Sube primero un informe.")]
    NoSummary,

    #[error("Por favor, introduce una pregunta.")]
    EmptyQuestion,

    #[error("No se pudo extraer texto del PDF: {0}")]
    EmptyDocument(String),

    #[error("La subida de ficheros está desactivada en modo informe fijo.")]
    UploadsDisabled,

    #[error("Sesión no encontrada: {0}")]
    SessionNotFound(String),

    #[error("Petición inválida: {0}")]
    BadRequest(String),

    #[error("El fichero supera el tamaño máximo permitido ({limit_mb} MB).")]
    PayloadTooLarge { limit_mb: usize },

    /// Cualquier fallo del servicio remoto, ya convertido a texto.
    #[error("Error del servicio de IA: {0}")]
    Remote(String),

    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Avisos que el usuario puede resolver sin que haya fallado nada.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::NoSummary | Self::EmptyQuestion)
    }
}
