//! Recepción de informes: comprobación de extensión y escritura en disco
//! bajo un nombre con marca de tiempo.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mime_guess::MimeGuess;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{error::ReportError, models::UploadedDocument};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const MAX_NAME_ATTEMPTS: usize = 5;

/// `true` si el nombre termina en `.pdf` (sin distinguir mayúsculas).
pub fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Misma comprobación que en la subida, para la ruta fija del modo estático.
pub fn check_pdf_path(path: &Path) -> Result<(), ReportError> {
    let name = path.to_string_lossy();
    if has_pdf_extension(&name) {
        Ok(())
    } else {
        Err(ReportError::NotPdf {
            name: name.into_owned(),
        })
    }
}

/// Nombre con el que se guarda un fichero: `<nombre>_<AAAAMMDDhhmmss>.pdf`.
///
/// Del nombre que manda el cliente solo se usa el último componente.
pub fn stored_file_name(original_name: &str, now: DateTime<Utc>) -> Result<String, ReportError> {
    let base = base_name(original_name);
    if !has_pdf_extension(base) {
        return Err(ReportError::NotPdf {
            name: original_name.to_string(),
        });
    }

    let stem = Path::new(base)
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "report".to_string());

    Ok(format!("{}_{}.pdf", stem, now.format(TIMESTAMP_FORMAT)))
}

// `labs_20241219185722.pdf` -> `labs_20241219185722_1a2b3c4d.pdf`
fn with_random_suffix(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".pdf").unwrap_or(file_name);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}.pdf", stem, &suffix[..8])
}

/// Crea el fichero sin pisar nunca uno existente. Si el nombre ya está
/// ocupado (misma subida en el mismo segundo), prueba con un sufijo aleatorio.
async fn write_new_file(
    dir: &Path,
    file_name: &str,
    bytes: &[u8],
) -> Result<(String, PathBuf), ReportError> {
    let mut candidate = file_name.to_string();
    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(&candidate);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok((candidate, path));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("{} ya existe, se generará otro nombre", path.display());
                candidate = with_random_suffix(file_name);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ReportError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no se encontró un nombre libre para {file_name}"),
    )))
}

/// Guarda los bytes sin tocar en `dir` y devuelve el documento resultante.
pub async fn store_upload(
    dir: &Path,
    original_name: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Result<UploadedDocument, ReportError> {
    let file_name = stored_file_name(original_name, now)?;

    tokio::fs::create_dir_all(dir).await?;
    let (id, path) = write_new_file(dir, &file_name, bytes).await?;

    let mime_type = MimeGuess::from_path(&path).first().map(|m| m.to_string());
    info!("Informe '{}' guardado en {} ({} bytes)", original_name, path.display(), bytes.len());

    Ok(UploadedDocument {
        id,
        original_name: base_name(original_name).to_string(),
        path,
        size_bytes: bytes.len() as u64,
        mime_type,
        uploaded_at: now,
    })
}

// Los navegadores en Windows pueden mandar rutas con '\'.
fn base_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name).trim()
}
