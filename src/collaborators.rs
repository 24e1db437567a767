//! Collaborator contracts.
//!
//! These are the external interfaces the core *consumes* but does not
//! implement: LLM provider transports, the deterministic directive
//! decomposer and the provider-credentials resolver are explicit non-goals
//! The core depends only on the trait shapes below, generalised from
//! a generic `agent/provider.rs::LLMProvider` shape (`async fn generate(...)`)
//! and the pack's `LlmRouter`/`LlmProvider` traits.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub text: String,
    pub usage: Usage,
    pub status: ExecStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub max_tokens: Option<u32>,
    pub deadline: Option<std::time::Duration>,
}

/// `llmTextExecute(modelId, prompt, opts?)`. A single non-streaming call.
#[async_trait]
pub trait LlmExecutor: Send + Sync {
    async fn execute_text(
        &self,
        model_id: &str,
        prompt: &str,
        opts: ExecuteOptions,
    ) -> anyhow::Result<ExecutionResult>;

    /// `llmExecuteJsonStrict({modelId, prompt, schema})`. Fails on parse mismatch.
    async fn execute_json_strict(
        &self,
        model_id: &str,
        prompt: &str,
        schema_hint: &str,
    ) -> anyhow::Result<serde_json::Value> {
        let result = self
            .execute_text(model_id, prompt, ExecuteOptions::default())
            .await?;
        serde_json::from_str(&result.text)
            .map_err(|e| anyhow::anyhow!("strict JSON parse failed against {schema_hint}: {e}"))
    }
}

/// A decomposed unit of a directive, as produced by the deterministic
/// decomposer (the grammar itself is external).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSubtask {
    pub id: String,
    pub description: String,
    pub task_type: String,
    pub difficulty: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// `ctx.deterministicDecomposeDirective(directive)`.
pub trait DirectiveDecomposer: Send + Sync {
    fn decompose(&self, directive: &str) -> Vec<ProjectSubtask>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Connected,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialCheck {
    pub status: CredentialStatus,
    #[serde(default)]
    pub missing_vars: Vec<String>,
}

/// Provider credentials resolver. Reads only from env.
pub trait CredentialsResolver: Send + Sync {
    fn check_status(&self, provider_id: &str) -> CredentialCheck;
    fn get_credential(&self, provider_id: &str, key: Option<&str>) -> Option<String>;
}

/// Reads `<PROVIDER>_API_KEY` (and `<PROVIDER>_<KEY>` when `key` is given),
/// matching the env-var-only credential lookup convention used throughout this codebase.
pub struct EnvCredentialsResolver;

impl CredentialsResolver for EnvCredentialsResolver {
    fn check_status(&self, provider_id: &str) -> CredentialCheck {
        let var = format!("{}_API_KEY", provider_id.to_uppercase());
        if std::env::var(&var).is_ok() {
            CredentialCheck {
                status: CredentialStatus::Connected,
                missing_vars: Vec::new(),
            }
        } else {
            CredentialCheck {
                status: CredentialStatus::Missing,
                missing_vars: vec![var],
            }
        }
    }

    fn get_credential(&self, provider_id: &str, key: Option<&str>) -> Option<String> {
        let var = match key {
            Some(k) => format!("{}_{}", provider_id.to_uppercase(), k.to_uppercase()),
            None => format!("{}_API_KEY", provider_id.to_uppercase()),
        };
        std::env::var(var).ok()
    }
}

/// Deterministic, content-keyed mock executor for tests and local
/// development — the one concrete `LlmExecutor` the core ships, mirroring
/// the `SmartMockProvider` test idiom used in `tests/e2e_scenarios.rs`.
pub struct MockLlmExecutor {
    responses: HashMap<String, String>,
    default_response: String,
}

impl MockLlmExecutor {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            responses: HashMap::new(),
            default_response: default_response.into(),
        }
    }

    pub fn with_response(mut self, model_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.responses.insert(model_id.into(), text.into());
        self
    }
}

#[async_trait]
impl LlmExecutor for MockLlmExecutor {
    async fn execute_text(
        &self,
        model_id: &str,
        prompt: &str,
        _opts: ExecuteOptions,
    ) -> anyhow::Result<ExecutionResult> {
        let text = self
            .responses
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());
        Ok(ExecutionResult {
            text,
            usage: Usage {
                input_tokens: (prompt.len() as u32 / 4).max(1),
                output_tokens: 64,
            },
            status: ExecStatus::Ok,
            error: None,
        })
    }
}
