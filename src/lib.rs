//! Doc AI: sube un informe médico en PDF, obtén un resumen de Gemini y
//! haz preguntas de seguimiento.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod intake;
pub mod llm;
pub mod models;
pub mod report;
pub mod server;

pub use app_state::{AppState, ReportSession, ReportState, SessionStore};
pub use config::{AppConfig, AppMode};
pub use error::ReportError;
pub use llm::{LlmManager, ReportModel};
