//! Carga y gestión de configuración de la aplicación (Gemini + servidor + ficheros).

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

use chrono::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_STATIC_REPORT: &str = "uploads/PDF REPORT_20241219185722.pdf";

/// Punto de entrada con el que se arranca el servidor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppMode {
    /// El usuario sube sus propios informes.
    Upload,
    /// Se resume un único fichero fijo al arrancar; no se admiten subidas.
    Static { report_path: PathBuf },
}

impl AppMode {
    pub fn label(&self) -> &'static str {
        match self {
            AppMode::Upload => "upload",
            AppMode::Static { .. } => "static",
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub upload_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub static_report_path: PathBuf,
    pub max_upload_bytes: usize,
    pub open_browser: bool,
    /// Tiempo sin actividad tras el que se descarta una sesión.
    pub session_idle_ttl: Duration,
    pub max_sessions: usize,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo de una función arbitraria.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Una variable vacía cuenta como no definida.
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let number = |key: &str, default: usize| -> Result<usize> {
            match get(key) {
                Some(raw) => raw
                    .parse::<usize>()
                    .map_err(|_| anyhow!("{key} no es un número válido: {raw}")),
                None => Ok(default),
            }
        };

        let max_upload_mb = number("MAX_UPLOAD_MB", 20)?;
        let session_idle_minutes = number("SESSION_IDLE_MINUTES", 60)?;
        let max_sessions = number("MAX_SESSIONS", 1000)?;
        if max_sessions == 0 {
            return Err(anyhow!("MAX_SESSIONS debe ser mayor que cero"));
        }

        let open_browser = match get("OPEN_BROWSER") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow!("OPEN_BROWSER debe ser true/false: {raw}"))?,
            None => true,
        };

        Ok(Self {
            server_addr: get("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3322".to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()).into(),
            frontend_dir: get("FRONTEND_DIR").unwrap_or_else(|| "frontend".to_string()).into(),
            static_report_path: get("STATIC_REPORT_PATH")
                .unwrap_or_else(|| DEFAULT_STATIC_REPORT.to_string())
                .into(),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            open_browser,
            session_idle_ttl: Duration::minutes(session_idle_minutes as i64),
            max_sessions,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
