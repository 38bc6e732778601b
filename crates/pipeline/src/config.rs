use std::time::Duration;

use visionary_core::visualization::DEFAULT_FACE_SWAP_MODEL;
use visionary_replicate::api::DEFAULT_API_URL;

/// Signed-URL lifetime for user uploads handed to the inference provider (10 hours).
pub const USER_UPLOAD_SIGNED_URL_TTL_SECS: u64 = 36_000;

/// Signed-URL lifetime for objects in any other bucket (1 hour).
pub const STORAGE_SIGNED_URL_TTL_SECS: u64 = 3_600;

/// Signed-URL lifetime for persisted results whose public URL is unreachable (24 hours).
pub const RESULT_SIGNED_URL_TTL_SECS: u64 = 86_400;

/// Shortest poll interval accepted from the environment.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Behaviour of the orchestration pipeline.
///
/// Defaults match the hosted deployment; every field can be overridden via
/// environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model reference used for face-swap jobs.
    pub face_swap_model: String,
    /// Bucket holding user-uploaded portraits.
    pub user_uploads_bucket: String,
    /// Bucket receiving persisted results.
    pub results_bucket: String,
    /// Folder inside `results_bucket` for persisted results.
    pub results_folder: String,
    /// Interval between polls of the active job.
    pub poll_interval: Duration,
    /// How long a job may sit in `starting` before it counts as stuck.
    pub stuck_threshold: Duration,
    /// Timeout for existence probes.
    pub probe_timeout: Duration,
    /// Timeout for content fetches (input verification, data-URL fallback).
    pub fetch_timeout: Duration,
    /// Timeout for downloading a finished result before upload.
    pub download_timeout: Duration,
    /// Refuse to submit a face swap whose inputs fail the reachability check.
    pub strict_input_check: bool,
    /// Run a server-side poll loop for every started visualization.
    pub background_polling: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            face_swap_model: DEFAULT_FACE_SWAP_MODEL.to_string(),
            user_uploads_bucket: "user-uploads".into(),
            results_bucket: "ai-generated".into(),
            results_folder: "final".into(),
            poll_interval: Duration::from_secs(4),
            stuck_threshold: Duration::from_secs(180),
            probe_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(120),
            strict_input_check: false,
            background_polling: false,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default            |
    /// |--------------------------|--------------------|
    /// | `FACE_SWAP_MODEL`        | built-in model ref |
    /// | `USER_UPLOADS_BUCKET`    | `user-uploads`     |
    /// | `RESULTS_BUCKET`         | `ai-generated`     |
    /// | `RESULTS_FOLDER`         | `final`            |
    /// | `POLL_INTERVAL_SECS`     | `4` (min `1`)      |
    /// | `STUCK_THRESHOLD_SECS`   | `180`              |
    /// | `PROBE_TIMEOUT_SECS`     | `5`                |
    /// | `FETCH_TIMEOUT_SECS`     | `10`               |
    /// | `DOWNLOAD_TIMEOUT_SECS`  | `120`              |
    /// | `STRICT_INPUT_CHECK`     | `false`            |
    /// | `BACKGROUND_POLLING`     | `false`            |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            face_swap_model: env_or("FACE_SWAP_MODEL", defaults.face_swap_model),
            user_uploads_bucket: env_or("USER_UPLOADS_BUCKET", defaults.user_uploads_bucket),
            results_bucket: env_or("RESULTS_BUCKET", defaults.results_bucket),
            results_folder: env_or("RESULTS_FOLDER", defaults.results_folder),
            poll_interval: env_secs("POLL_INTERVAL_SECS", defaults.poll_interval).max(MIN_POLL_INTERVAL),
            stuck_threshold: env_secs("STUCK_THRESHOLD_SECS", defaults.stuck_threshold),
            probe_timeout: env_secs("PROBE_TIMEOUT_SECS", defaults.probe_timeout),
            fetch_timeout: env_secs("FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
            download_timeout: env_secs("DOWNLOAD_TIMEOUT_SECS", defaults.download_timeout),
            strict_input_check: env_bool("STRICT_INPUT_CHECK", defaults.strict_input_check),
            background_polling: env_bool("BACKGROUND_POLLING", defaults.background_polling),
        }
    }

    /// Stuck threshold as a chrono duration for timestamp arithmetic.
    pub fn stuck_threshold_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stuck_threshold).unwrap_or(chrono::Duration::MAX)
    }
}

/// Endpoints and secrets of the external services.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub replicate_api_url: String,
    pub replicate_api_token: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    /// OpenAI-compatible chat API used for prompt enhancement. Enhancement
    /// is disabled when no key is configured.
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
}

impl ProviderConfig {
    /// Load provider settings from environment variables.
    ///
    /// | Env Var                     | Default                          |
    /// |-----------------------------|----------------------------------|
    /// | `REPLICATE_API_URL`         | `https://api.replicate.com/v1`   |
    /// | `REPLICATE_API_TOKEN`       | required                         |
    /// | `SUPABASE_URL`              | required                         |
    /// | `SUPABASE_SERVICE_ROLE_KEY` | required                         |
    /// | `LLM_API_URL`               | `https://api.openai.com/v1`      |
    /// | `LLM_API_KEY`               | unset (enhancement disabled)     |
    /// | `LLM_MODEL`                 | `gpt-4o-mini`                    |
    pub fn from_env() -> Self {
        Self {
            replicate_api_url: env_or("REPLICATE_API_URL", DEFAULT_API_URL.to_string()),
            replicate_api_token: std::env::var("REPLICATE_API_TOKEN").expect("REPLICATE_API_TOKEN must be set"),
            supabase_url: std::env::var("SUPABASE_URL").expect("SUPABASE_URL must be set"),
            supabase_service_key: std::env::var("SUPABASE_SERVICE_ROLE_KEY")
                .expect("SUPABASE_SERVICE_ROLE_KEY must be set"),
            llm_api_url: env_or("LLM_API_URL", "https://api.openai.com/v1".to_string()),
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini".to_string()),
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => Duration::from_secs(
            raw.parse()
                .unwrap_or_else(|_| panic!("{name} must be a whole number of seconds")),
        ),
        Err(_) => default,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}
