//! Analysis orchestration: relevance gate, workflow synthesis, execution,
//! and final rendering.
//!
//! A failed tool call must still produce a user-visible explanation: host
//! and fail-state errors are converted into a short textual description that
//! replaces the collected data in the final prompt, so the model can tell
//! the user what went wrong instead of the run hard-failing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use marketflow_catalog::{render_outputs, MethodCatalog, OutputRecorder};
use marketflow_core::{DefinitionError, Interpreter, InterpreterError, StateMachine};

use crate::llm::{extract_json, LlmClient, LlmError, LlmRequest};
use crate::prompts::{answer_prompt, relevance_prompt, workflow_prompt, OFF_TOPIC_REPLY};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct AnalysisEngineConfig {
    pub model: String,
    pub temperature: f32,
    /// Wall-clock cap on one interpretation.
    pub interpretation_cap: Duration,
    /// Whether the relevance gate runs before anything else.
    pub relevance_gate: bool,
}

impl Default for AnalysisEngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            interpretation_cap: Duration::from_secs(600),
            relevance_gate: true,
        }
    }
}

/// Analysis failures that cannot be explained away in the final answer.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("workflow generation returned no JSON object")]
    MissingWorkflow,
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}

/// The result of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Rendered answer for the user.
    pub answer: String,
    /// The generated definition, when one was produced.
    pub workflow_json: Option<String>,
    /// What the final prompt saw as collected data.
    pub collected: String,
}

/// Drives the question → workflow → execution → answer pipeline.
pub struct AnalysisEngine {
    llm: Arc<dyn LlmClient>,
    catalog: Arc<MethodCatalog>,
    recorder: Arc<OutputRecorder>,
    catalog_metadata: String,
    config: AnalysisEngineConfig,
}

impl AnalysisEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        catalog: Arc<MethodCatalog>,
        recorder: Arc<OutputRecorder>,
        config: AnalysisEngineConfig,
    ) -> Self {
        // The catalog is immutable, so its metadata document is rendered once.
        let catalog_metadata = catalog.metadata().to_string();
        Self {
            llm,
            catalog,
            recorder,
            catalog_metadata,
            config,
        }
    }

    /// Answer a free-form question about cryptocurrency market behaviour.
    pub async fn analyze(&self, question: &str) -> Result<AnalysisOutcome, AnalysisError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, question_len = question.len(), "analysis started");

        if self.config.relevance_gate && !self.check_relevance(question).await? {
            info!(%run_id, "question rejected by relevance gate");
            return Ok(AnalysisOutcome {
                answer: OFF_TOPIC_REPLY.to_string(),
                workflow_json: None,
                collected: String::new(),
            });
        }

        self.recorder.clear();
        let workflow_json = self.generate_workflow(question).await?;
        let definition = StateMachine::from_json(&workflow_json)?;

        let interpreter = Interpreter::new(self.catalog.clone());
        let cancel = interpreter.cancellation_token();
        let run = tokio::time::timeout(
            self.config.interpretation_cap,
            interpreter.interpret(&definition, json!({})),
        )
        .await;

        let collected = match run {
            Ok(Ok(final_data)) => {
                let entries = self.recorder.snapshot();
                if entries.is_empty() {
                    // Nothing was recorded explicitly; fall back to the
                    // accumulator so the answer still has something to cite.
                    final_data.to_string()
                } else {
                    render_outputs(&entries)
                }
            }
            Ok(Err(error)) if is_describable(&error) => {
                warn!(%run_id, %error, "workflow failed; describing the failure instead");
                format!(
                    "The data-collection workflow failed before completing: {error}. \
                     No market data is available for this question."
                )
            }
            Ok(Err(error)) => return Err(error.into()),
            Err(_elapsed) => {
                cancel.cancel();
                warn!(%run_id, cap_secs = self.config.interpretation_cap.as_secs(), "workflow timed out");
                format!(
                    "The data collection did not finish within {} seconds and was stopped. \
                     No market data is available for this question.",
                    self.config.interpretation_cap.as_secs()
                )
            }
        };

        let answer = self.render_answer(question, &collected).await?;
        info!(%run_id, "analysis completed");
        Ok(AnalysisOutcome {
            answer,
            workflow_json: Some(workflow_json),
            collected,
        })
    }

    async fn check_relevance(&self, question: &str) -> Result<bool, AnalysisError> {
        let (system, user) = relevance_prompt(question);
        let verdict = self.complete(system, user).await?;
        let normalized = verdict.trim().trim_matches('"').to_ascii_lowercase();
        debug!(verdict = %normalized, "relevance verdict");
        Ok(normalized.starts_with("yes"))
    }

    async fn generate_workflow(&self, question: &str) -> Result<String, AnalysisError> {
        let now = chrono_now();
        let (system, user) = workflow_prompt(&self.catalog_metadata, question, &now);
        let output = self.complete(system, user).await?;
        let workflow_json = extract_json(&output).ok_or(AnalysisError::MissingWorkflow)?;
        debug!(workflow_len = workflow_json.len(), "workflow generated");
        Ok(workflow_json)
    }

    async fn render_answer(&self, question: &str, collected: &str) -> Result<String, AnalysisError> {
        let (system, user) = answer_prompt(question, collected);
        Ok(self.complete(system, user).await?)
    }

    async fn complete(&self, system: String, user: String) -> Result<String, LlmError> {
        self.llm
            .complete(LlmRequest {
                system,
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
            })
            .await
    }
}

/// Failures worth explaining to the user rather than surfacing to the
/// caller: a tool call blew up, or the generated machine chose to fail.
fn is_describable(error: &InterpreterError) -> bool {
    matches!(
        error,
        InterpreterError::Host { .. } | InterpreterError::FailState { .. }
    )
}

fn chrono_now() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
