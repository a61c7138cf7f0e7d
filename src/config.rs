use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arcane::agent::{AgentProfile, GoalLoopConfig, RetryPolicy};
use arcane::executor::GoalLoopWorkerFactory;
use arcane::history::EventLog;
use arcane::llm::AnthropicConfig;
use arcane::prompt::{PromptSet, Prompts};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub executor: ExecutorConfig,
    pub storage: StorageConfig,
    pub prompts: PromptsConfig,
    /// Agent address -> base URL, for `send_agent_message`
    pub agents: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: arcane::llm::anthropic::DEFAULT_MODEL.to_string(),
            max_tokens: arcane::llm::anthropic::DEFAULT_MAX_TOKENS,
            timeout_ms: 300000,
            api_key_env: arcane::llm::anthropic::DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub context: String,
    pub max_iterations: u32,
    pub default_goal: String,
    pub generation_timeout_ms: u64,
    /// Keep at most this many events in the agent's history
    pub history_limit: Option<usize>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "ARCANE".to_string(),
            context: "I am a helpful agent. I can answer directly, work with files in my work directory, \
                      and delegate complex tasks to teams of specialized agents."
                .to_string(),
            max_iterations: 5,
            default_goal: arcane::agent::DEFAULT_GOAL.to_string(),
            generation_timeout_ms: 120000,
            history_limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: u32,
    pub worker_max_iterations: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            backoff_factor: 2,
            worker_max_iterations: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of agent workspaces; plans live under `<root>/plans`
    pub workspace_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            workspace_root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("arcane")
                .join("workspace"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// YAML prompt set overriding the built-in templates
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let mut candidates = vec![PathBuf::from(format!(".{}.yml", project_name))];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(format!("{}.yml", project_name)));
        }

        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Failed to load config from {}: {}", candidate.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be at least 1");
        }
        if self.executor.max_retries == 0 {
            bail!("executor.max_retries must be at least 1");
        }
        if self.executor.worker_max_iterations == 0 {
            bail!("executor.worker_max_iterations must be at least 1");
        }
        if self.executor.backoff_factor == 0 {
            bail!("executor.backoff_factor must be at least 1");
        }
        if self.agent.generation_timeout_ms == 0 || self.llm.timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.agent.history_limit == Some(0) {
            bail!("agent.history_limit must be at least 1 when set");
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be greater than zero");
        }
        Ok(())
    }

    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            api_key_env: self.llm.api_key_env.clone(),
        }
    }

    pub fn profile(&self) -> AgentProfile {
        AgentProfile::new(&self.agent.name, &self.agent.context)
    }

    /// Goal loop settings for the top-level agent
    pub fn goal_loop(&self) -> GoalLoopConfig {
        GoalLoopConfig {
            max_iterations: self.agent.max_iterations,
            default_goal: self.agent.default_goal.clone(),
            generation_timeout: self.generation_timeout(),
            ..Default::default()
        }
    }

    /// Goal loop settings for plan task workers
    pub fn worker_goal_loop(&self) -> GoalLoopConfig {
        GoalLoopConfig {
            max_iterations: self.executor.worker_max_iterations,
            default_goal: self.agent.default_goal.clone(),
            generation_timeout: self.generation_timeout(),
            action_retry: self.retry_policy(),
            ..GoalLoopWorkerFactory::default_config()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.executor.max_retries,
            base_delay: Duration::from_millis(self.executor.base_delay_ms),
            factor: self.executor.backoff_factor,
        }
    }

    /// Empty history for the top-level agent, capped if configured
    pub fn event_log(&self) -> EventLog {
        match self.agent.history_limit {
            Some(limit) => EventLog::with_capacity_limit(limit),
            None => EventLog::new(),
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.agent.generation_timeout_ms)
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.storage.workspace_root.join("plans")
    }

    /// The configured prompt set, or the built-in one
    pub fn prompts(&self) -> Result<Prompts> {
        let set = match &self.prompts.file {
            Some(path) => PromptSet::load(path).context(format!("Failed to load prompts from {}", path.display()))?,
            None => PromptSet::default(),
        };
        Prompts::new(set).context("Failed to compile prompt templates")
    }
}
