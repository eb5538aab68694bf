use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub video: VideoConfig,
    pub detector: DetectorConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    /// Directory of pre-decoded frame images. Empty = bundled demo scene.
    pub frames_dir: String,
    /// Source frame rate; timestamps are frame_index / fps.
    pub fps: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Detector backend. Only "synthetic" ships with this crate; model
    /// backends plug in through the tracker/detector traits.
    pub backend: String,
}
impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: "synthetic".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Process every Nth frame, starting at frame 0.
    pub frame_step: u32,
}
impl Default for PipelineConfig {
    fn default() -> Self {
        Self { frame_step: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub metadata_path: String,
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metadata_path: "output/metadata.json".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}
impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "video_metadata.db".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    // ── OpenRouter (primary) ─────────────────────────────────────────────
    /// OpenRouter API key — prefer env OPENROUTER_API_KEY
    pub openrouter_api_key: Option<String>,
    /// OpenRouter model (e.g. "meta-llama/llama-3.1-8b-instruct")
    pub openrouter_model: String,

    // ── Local fallback (Ollama / llama.cpp / LM Studio) ──────────────────
    /// Local server base URL (e.g. "http://localhost:11434/v1")
    pub local_base_url: Option<String>,
    /// Local model name (e.g. "llama3" for Ollama)
    pub local_model: String,

    /// Max tokens for generated SQL
    pub max_tokens: u32,
}
impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_model: "meta-llama/llama-3.1-8b-instruct".into(),
            local_base_url: Some("http://localhost:11434/v1".into()),
            local_model: "llama3".into(),
            max_tokens: 200,
        }
    }
}

pub fn load_config() -> Result<AppConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name("cityeye").required(false))
        .add_source(config::Environment::with_prefix("CITYEYE").separator("__"))
        .build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;

    // Convenience: OPENROUTER_API_KEY env var (without CITYEYE__ prefix)
    if app.llm.openrouter_api_key.is_none() {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            app.llm.openrouter_api_key = Some(key);
        }
    }

    Ok(app)
}

pub fn default_config() -> AppConfig {
    AppConfig {
        video: VideoConfig {
            frames_dir: String::new(),
            fps: 30.0,
        },
        detector: DetectorConfig::default(),
        pipeline: PipelineConfig::default(),
        output: OutputConfig::default(),
        database: DatabaseConfig::default(),
        llm: LlmConfig::default(),
    }
}
