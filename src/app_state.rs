use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::{AppConfig, AppMode},
    llm::LlmManager,
    models::{Notice, Summary, UploadedDocument},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub mode: AppMode,
    pub llm_manager: LlmManager,
    pub sessions: SessionStore,
    /// Resultado del resumen del fichero fijo (solo en modo estático).
    pub static_summary: Option<Summary>,
    pub startup_notice: Notice,
}

/// Estado de una sesión: todavía sin documento, o con un resumen listo.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReportState {
    NoDocument,
    Summarized {
        document: Option<UploadedDocument>,
        summary: Summary,
    },
}

impl ReportState {
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            ReportState::NoDocument => None,
            ReportState::Summarized { summary, .. } => Some(summary),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSession {
    pub id: Uuid,
    #[serde(flatten)]
    pub report: ReportState,
    pub status: Notice,
    pub last_seen: DateTime<Utc>,
}

/// Sesiones en memoria.
///
/// Una sesión sin actividad durante `idle_ttl` se descarta al crear otra, y
/// nunca hay más de `max_sessions`: si se llega al tope se expulsa la que
/// lleva más tiempo sin usarse.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, ReportSession>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            inner: Arc::default(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.session_idle_ttl, cfg.max_sessions)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ReportSession>> {
        // Ninguna sección crítica deja el mapa a medias, así que un lock
        // envenenado sigue siendo utilizable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Crea una sesión nueva. Con `summary` arranca ya en `Summarized`.
    pub fn create(&self, summary: Option<Summary>, status: Notice) -> ReportSession {
        self.create_at(summary, status, Utc::now())
    }

    fn create_at(
        &self,
        summary: Option<Summary>,
        status: Notice,
        now: DateTime<Utc>,
    ) -> ReportSession {
        let report = match summary {
            Some(summary) => ReportState::Summarized {
                document: None,
                summary,
            },
            None => ReportState::NoDocument,
        };
        let session = ReportSession {
            id: Uuid::new_v4(),
            report,
            status,
            last_seen: now,
        };

        let mut sessions = self.lock();
        self.evict(&mut sessions, now);
        sessions.insert(session.id, session.clone());
        session
    }

    fn evict(&self, sessions: &mut HashMap<Uuid, ReportSession>, now: DateTime<Utc>) {
        let before = sessions.len();
        let cutoff = now - self.idle_ttl;
        sessions.retain(|_, s| s.last_seen > cutoff);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.last_seen)
                .map(|s| s.id);
            match oldest {
                Some(id) => sessions.remove(&id),
                None => break,
            };
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("{} sesiones inactivas descartadas", evicted);
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<ReportSession> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(id)?;
        session.last_seen = Utc::now();
        Some(session.clone())
    }

    pub fn summary(&self, id: &Uuid) -> Option<Option<Summary>> {
        self.get(id).map(|s| s.report.summary().cloned())
    }

    /// Pasa la sesión a `Summarized` con el nuevo documento y resumen.
    pub fn set_summarized(
        &self,
        id: &Uuid,
        document: UploadedDocument,
        summary: Summary,
        status: Notice,
    ) -> Option<ReportSession> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(id)?;
        session.report = ReportState::Summarized {
            document: Some(document),
            summary,
        };
        session.status = status;
        session.last_seen = Utc::now();
        Some(session.clone())
    }

    /// Solo cambia el aviso; el estado del informe se queda como estaba.
    pub fn set_status(&self, id: &Uuid, status: Notice) {
        if let Some(session) = self.lock().get_mut(id) {
            session.status = status;
            session.last_seen = Utc::now();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
