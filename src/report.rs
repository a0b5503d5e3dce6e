//! Resumen de informes y preguntas de seguimiento.
//!
//! Flujo:
//!   1. `summarize_report`: clave configurada → el fichero existe → una
//!      llamada al modelo.
//!   2. `answer_question`: hay resumen → hay pregunta → clave configurada →
//!      se construye el prompt y se hace una sola llamada, sin historial.

use std::path::Path;

use chrono::Utc;
use tracing::{error, info};

use crate::{
    error::ReportError,
    llm::{into_report_error, LlmManager},
    models::{ConversationTurn, Summary},
};

const ANSWER_TEMPLATE: &str = r#"You are an authorized AI assistant working alongside a doctor to analyze a patient's medical biochemistry report. Interpret the overall results, suggest medication guidance according to your knowledge (a doctor will review it), and explain the findings simply and clearly.

Use the report summary below as the only source of patient data.

**Report Summary:**
{summary}

Answer in this Markdown layout:

**Report Summary:**
- <parameter> (High / Low), grade: mild / moderate / severe

**Medication Guidance:**
- <medication and usage instructions>

**Recommendations:**
- <simple, helpful recommendation>

**Follow-up and Monitoring:**
- <tests to repeat and when>

Keep the output clear, short, simple for non-specialists and well organized.

User Input: {question}
"#;

/// Construye el prompt fijo con el resumen y la pregunta.
pub fn build_prompt(summary: &Summary, question: &str) -> String {
    ANSWER_TEMPLATE
        .replace("{summary}", summary.text.trim())
        .replace("{question}", question.trim())
}

/// Resume el PDF de `path` con el modelo configurado.
pub async fn summarize_report(llm: &LlmManager, path: &Path) -> Result<Summary, ReportError> {
    let model = llm.model()?;

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ReportError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    info!("Resumiendo {} con {}", path.display(), llm.model_name);
    let text = model.summarize(path).await.map_err(|e| {
        error!("Error resumiendo {}: {:#}", path.display(), e);
        into_report_error(e)
    })?;

    let source = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(Summary {
        text,
        source,
        generated_at: Utc::now(),
    })
}

/// Responde a una pregunta sobre el resumen. Cada pregunta es independiente.
pub async fn answer_question(
    llm: &LlmManager,
    summary: Option<&Summary>,
    question: &str,
) -> Result<ConversationTurn, ReportError> {
    let summary = summary.ok_or(ReportError::NoSummary)?;

    let question = question.trim();
    if question.is_empty() {
        return Err(ReportError::EmptyQuestion);
    }

    let model = llm.model()?;
    let prompt = build_prompt(summary, question);

    info!("Pregunta sobre {} ({} caracteres)", summary.source, question.len());
    let answer = model.generate(&prompt).await.map_err(|e| {
        error!("Error generando respuesta: {:#}", e);
        into_report_error(e)
    })?;

    Ok(ConversationTurn {
        question: question.to_string(),
        answer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ReportModel;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct RecordingModel {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ReportModel for RecordingModel {
        async fn summarize(&self, pdf_path: &Path) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("503 Service Unavailable"));
            }
            Ok(format!("summary of {}", pdf_path.display()))
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(anyhow!("503 Service Unavailable"));
            }
            Ok("Drink water.".to_string())
        }
    }

    fn manager(model: &Arc<RecordingModel>) -> LlmManager {
        LlmManager::with_model(model.clone(), "test-model")
    }

    fn summary() -> Summary {
        Summary {
            text: "ALT 80 U/L (High), grade: mild".into(),
            source: "labs.pdf".into(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn prompt_embeds_summary_and_question() {
        let prompt = build_prompt(&summary(), "  Is my liver ok?  ");
        assert!(prompt.contains("ALT 80 U/L (High), grade: mild"));
        assert!(prompt.contains("User Input: Is my liver ok?\n"));
        assert!(!prompt.contains("{summary}"));
        assert!(!prompt.contains("{question}"));
    }

    #[tokio::test]
    async fn question_without_summary_is_a_warning_and_no_call() {
        let model = Arc::new(RecordingModel::default());
        let err = answer_question(&manager(&model), None, "anything?")
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NoSummary));
        assert!(err.is_warning());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_question_is_a_warning_and_no_call() {
        let model = Arc::new(RecordingModel::default());
        for question in ["", "   ", "\n\t"] {
            let err = answer_question(&manager(&model), Some(&summary()), question)
                .await
                .unwrap_err();
            assert!(matches!(err, ReportError::EmptyQuestion));
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_key_never_reaches_the_model() {
        let llm = LlmManager::unconfigured("gemini-1.5-flash");
        let err = answer_question(&llm, Some(&summary()), "why?").await.unwrap_err();
        assert!(matches!(err, ReportError::MissingApiKey));

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("labs.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        let err = summarize_report(&llm, &pdf).await.unwrap_err();
        assert!(matches!(err, ReportError::MissingApiKey));
    }

    #[tokio::test]
    async fn missing_file_is_reported_not_thrown() {
        let model = Arc::new(RecordingModel::default());
        let err = summarize_report(&manager(&model), Path::new("uploads/does-not-exist.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::FileNotFound { .. }));
        assert!(err.to_string().contains("does-not-exist.pdf"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn summarize_then_ask_makes_one_call_each() {
        let model = Arc::new(RecordingModel::default());
        let llm = manager(&model);
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("labs.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();

        let summary = assert_ok!(summarize_report(&llm, &pdf).await);
        assert_eq!(summary.source, "labs.pdf");
        assert!(summary.text.starts_with("summary of"));

        let turn = assert_ok!(answer_question(&llm, Some(&summary), "What now?").await);
        assert_eq!(turn.question, "What now?");
        assert_eq!(turn.answer, "Drink water.");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&summary.text));
    }

    #[tokio::test]
    async fn remote_failures_become_display_text() {
        let model = Arc::new(RecordingModel {
            fail: true,
            ..Default::default()
        });
        let err = answer_question(&manager(&model), Some(&summary()), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Remote(_)));
        assert!(err.to_string().contains("503 Service Unavailable"));
    }
}
