//! Extraction orchestrator
//!
//! For every record without an artifact: normalize the SQL, render the
//! prompt, call the generation service under a shared concurrency limit,
//! interpret the response and write the artifact. Each object ends in one of
//! three ways:
//!
//! - `Completed`: artifact with a lineage list written
//! - `ErrorArtifact`: the response was unusable, an error marker was written
//! - `TransientFailure`: no artifact, the object is attempted again next run
//!
//! A failure for one object never stops the others.

use sqlineage_core::{
    temp_path, ArtifactName, Config, Extraction, ObjectKey, ObjectRecord, RunSummary,
};
use sqlineage_llm::{GenerateRequest, GenerationClient, PromptError, PromptTemplate};
use sqlineage_source::normalize_sql;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Errors that stop a run before any object is processed
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Concurrency limit must be at least 1")]
    InvalidConcurrency,

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Settings for one extractor
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Maximum generation calls in flight
    pub concurrency_limit: usize,

    /// Generation backend
    pub client: Arc<dyn GenerationClient>,

    /// Model identifier passed with every request
    pub model: String,

    /// Upper bound on a single generation call
    pub timeout: Duration,

    /// Prompt template
    pub prompt: PromptTemplate,

    /// Artifact directory
    pub output_dir: PathBuf,
}

impl ExtractorConfig {
    /// One call at a time, built-in prompt, default model and timeout
    pub fn new(client: Arc<dyn GenerationClient>, output_dir: impl Into<PathBuf>) -> Self {
        let defaults = sqlineage_core::GenerationConfig::default();
        Self {
            concurrency_limit: defaults.max_concurrent_requests,
            client,
            model: defaults.model,
            timeout: Duration::from_secs(defaults.timeout_secs),
            prompt: PromptTemplate::builtin(),
            output_dir: output_dir.into(),
        }
    }

    /// Settings from a loaded project config
    pub fn from_config(config: &Config, client: Arc<dyn GenerationClient>) -> Result<Self, ExtractError> {
        let prompt_path = config
            .generation
            .prompt_template
            .as_ref()
            .map(|p| config.resolve(p));

        Ok(Self {
            concurrency_limit: config.generation.max_concurrent_requests,
            client,
            model: config.generation.model.clone(),
            timeout: Duration::from_secs(config.generation.timeout_secs),
            prompt: PromptTemplate::load(prompt_path.as_deref())?,
            output_dir: config.output_dir(),
        })
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }
}

impl std::fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("concurrency_limit", &self.concurrency_limit)
            .field("client", &self.client.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

/// How one object's extraction ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOutcome {
    /// Lineage artifact written
    Completed { edges: usize },

    /// Error-marker artifact written
    ErrorArtifact { reason: String },

    /// Nothing written; retried on the next run
    TransientFailure { error: String },
}

/// State shared by all object tasks of one run
struct Shared {
    client: Arc<dyn GenerationClient>,
    model: String,
    timeout: Duration,
    prompt: PromptTemplate,
    output_dir: PathBuf,
    limiter: Semaphore,
    concurrency_limit: usize,
}

/// Resumable, concurrency-bounded extractor
pub struct Extractor {
    shared: Arc<Shared>,
}

impl Extractor {
    /// Create an extractor; rejects a concurrency limit of zero
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractError> {
        if config.concurrency_limit == 0 {
            return Err(ExtractError::InvalidConcurrency);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                limiter: Semaphore::new(config.concurrency_limit),
                concurrency_limit: config.concurrency_limit,
                client: config.client,
                model: config.model,
                timeout: config.timeout,
                prompt: config.prompt,
                output_dir: config.output_dir,
            }),
        })
    }

    /// Artifact directory
    pub fn output_dir(&self) -> &Path {
        &self.shared.output_dir
    }

    /// Process every record that does not have an artifact yet
    ///
    /// Records are numbered by their position in `records`; that number
    /// becomes the artifact ordinal. Per-object failures are counted in the
    /// summary, never returned as errors.
    pub async fn run(&self, records: Vec<ObjectRecord>) -> Result<RunSummary, ExtractError> {
        let output_dir = &self.shared.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| ExtractError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let completed = crate::index::scan_completed(output_dir).map_err(|source| ExtractError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let mut summary = RunSummary::new(records.len());
        let mut scheduled: HashSet<ObjectKey> = HashSet::new();
        let mut tasks = JoinSet::new();

        for (ordinal, record) in records.into_iter().enumerate() {
            let key = record.key();
            let name = ArtifactName::new(ordinal, &record.schema, &record.object_name);

            if completed.contains(&key) {
                tracing::debug!("Skipping {}: artifact exists", record.qualified_name());
                summary.skipped += 1;
                continue;
            }
            if !scheduled.insert(key) {
                tracing::warn!("Skipping {}: listed more than once", record.qualified_name());
                summary.skipped += 1;
                continue;
            }

            let shared = Arc::clone(&self.shared);
            tasks.spawn(async move {
                let qualified_name = record.qualified_name();
                let outcome = process_object(&shared, name, record).await;
                (qualified_name, outcome)
            });
        }

        let pending = tasks.len();
        tracing::info!(
            "Extracting {} objects ({} already done, concurrency {})",
            pending,
            summary.skipped,
            self.shared.concurrency_limit
        );

        let mut finished = 0;
        while let Some(joined) = tasks.join_next().await {
            finished += 1;
            match joined {
                Ok((qualified_name, outcome)) => {
                    match &outcome {
                        ObjectOutcome::Completed { edges } => {
                            summary.completed += 1;
                            tracing::info!("[{}/{}] {}: {} edges", finished, pending, qualified_name, edges);
                        }
                        ObjectOutcome::ErrorArtifact { reason } => {
                            summary.error_artifacts += 1;
                            tracing::warn!("[{}/{}] {}: {}", finished, pending, qualified_name, reason);
                        }
                        ObjectOutcome::TransientFailure { error } => {
                            tracing::error!("[{}/{}] {}: {}", finished, pending, qualified_name, error);
                            summary.record_failure(qualified_name);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("[{}/{}] Extraction task aborted: {}", finished, pending, e);
                    summary.record_failure("<aborted task>");
                }
            }
        }

        Ok(summary)
    }
}

async fn process_object(shared: &Shared, name: ArtifactName, record: ObjectRecord) -> ObjectOutcome {
    let sql = normalize_sql(&record.raw_definition);
    let prompt = match shared.prompt.render(&record.schema, &record.object_name, &sql) {
        Ok(prompt) => prompt,
        Err(e) => return ObjectOutcome::TransientFailure { error: e.to_string() },
    };
    let request = GenerateRequest::json(&shared.model, prompt);

    let response = {
        let _permit = match shared.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => return ObjectOutcome::TransientFailure { error: e.to_string() },
        };
        tokio::time::timeout(shared.timeout, shared.client.generate(&request)).await
    };

    let text = match response {
        Ok(Ok(response)) => response.response,
        Ok(Err(e)) => {
            return ObjectOutcome::TransientFailure {
                error: format!("{} call failed: {}", shared.client.name(), e),
            }
        }
        Err(_) => {
            return ObjectOutcome::TransientFailure {
                error: format!("No response within {:?}", shared.timeout),
            }
        }
    };

    let extraction = Extraction::from_model_response(&text);
    let document = match extraction.to_json() {
        Ok(document) => document,
        Err(e) => return ObjectOutcome::TransientFailure { error: e.to_string() },
    };

    let path = name.path_in(&shared.output_dir);
    if let Err(e) = write_artifact(&path, &document).await {
        return ObjectOutcome::TransientFailure {
            error: format!("Failed to write {}: {}", path.display(), e),
        };
    }

    match extraction {
        Extraction::Lineage(edges) => ObjectOutcome::Completed { edges: edges.len() },
        Extraction::Unparsed { reason, .. } => ObjectOutcome::ErrorArtifact { reason },
    }
}

/// Write to a hidden temp sibling, then rename into place
async fn write_artifact(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
