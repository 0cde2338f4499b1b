use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::fingerprint::{ObservationMode, TaskConfig, safe_component};

pub const DEMO_FILE_SUFFIX: &str = ".json";
pub const TOOL_NAME: &str = env!("CARGO_PKG_NAME");
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEMO_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DemoFormat {
    Full,
    Lightweight,
}

impl DemoFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DemoFormat::Full => "full",
            DemoFormat::Lightweight => "lightweight",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DemoStep {
    pub action: Vec<f64>,
    pub observations: BTreeMap<String, Vec<f64>>,
    pub reward: Option<f64>,
    pub termination: bool,
    pub truncation: bool,
}

impl DemoStep {
    pub fn is_terminal(&self) -> bool {
        self.termination || self.truncation
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DemoMetadata {
    pub id: String,
    pub config: TaskConfig,
    pub format: DemoFormat,
    pub seed: Option<u64>,
    pub recorded_at: String,
    #[serde(default)]
    pub tool_versions: BTreeMap<String, String>,
}

impl DemoMetadata {
    pub fn new(config: TaskConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let format = if config.observation_mode == ObservationMode::Lightweight {
            DemoFormat::Lightweight
        } else {
            DemoFormat::Full
        };
        Ok(Self {
            id: Uuid::new_v4().simple().to_string(),
            config,
            format,
            seed,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            tool_versions: BTreeMap::from([(TOOL_NAME.to_string(), TOOL_VERSION.to_string())]),
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.id, DEMO_FILE_SUFFIX)
    }

    pub fn validate(&self) -> Result<()> {
        safe_component("demo id", &self.id)?;
        self.config.validate()
    }
}

/// One recorded episode. Treated as immutable once recorded: nothing in this
/// crate mutates steps after `Demo::new`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Demo {
    pub metadata: DemoMetadata,
    pub steps: Vec<DemoStep>,
}

impl Demo {
    pub fn new(metadata: DemoMetadata, steps: Vec<DemoStep>) -> Self {
        Self { metadata, steps }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn format(&self) -> DemoFormat {
        self.metadata.format
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Copy keeping only actions and termination/truncation flags. The copy is
    /// repartitioned under the lightweight observation mode, so it never shares
    /// a cache entry with the full recording.
    pub fn to_lightweight(&self) -> Demo {
        let steps = self
            .steps
            .iter()
            .map(|s| DemoStep {
                action: s.action.clone(),
                observations: BTreeMap::new(),
                reward: None,
                termination: s.termination,
                truncation: s.truncation,
            })
            .collect();
        let mut metadata = self.metadata.clone();
        metadata.format = DemoFormat::Lightweight;
        metadata.config.observation_mode = ObservationMode::Lightweight;
        metadata.config.cameras = Vec::new();
        Demo { metadata, steps }
    }

    pub fn encode(&self) -> Result<String> {
        let doc = DemoFileDoc {
            version: DEMO_FILE_VERSION,
            metadata: self.metadata.clone(),
            steps_sha256: steps_digest(&self.steps)?,
            steps: self.steps.clone(),
        };
        serde_json::to_string_pretty(&doc)
            .map_err(|e| StoreError::codec(format!("failed to encode demo {}", self.id()), e))
    }

    pub fn decode(raw: &str, origin: &Path) -> Result<Demo> {
        let doc: DemoFileDoc = serde_json::from_str(raw)
            .map_err(|e| StoreError::invalid_demo(origin, format!("parse failed: {e}")))?;
        if doc.version != DEMO_FILE_VERSION {
            return Err(StoreError::invalid_demo(
                origin,
                format!("unsupported demo file version {}", doc.version),
            ));
        }
        doc.metadata
            .validate()
            .map_err(|e| StoreError::invalid_demo(origin, e.to_string()))?;
        let digest = steps_digest(&doc.steps)?;
        if digest != doc.steps_sha256 {
            return Err(StoreError::invalid_demo(origin, "steps checksum mismatch"));
        }
        if let Some(recorded) = doc.metadata.tool_versions.get(TOOL_NAME)
            && recorded != TOOL_VERSION
        {
            warn!(
                "demo {} was recorded with {TOOL_NAME} {recorded}, current is {TOOL_VERSION}",
                doc.metadata.id
            );
        }
        Ok(Demo {
            metadata: doc.metadata,
            steps: doc.steps,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoFileDoc {
    version: u32,
    metadata: DemoMetadata,
    steps_sha256: String,
    steps: Vec<DemoStep>,
}

fn steps_digest(steps: &[DemoStep]) -> Result<String> {
    let canonical = serde_json::to_value(steps)
        .map_err(|e| StoreError::codec("failed to encode demo steps", e))?;
    let encoded = serde_json::to_vec(&canonical)
        .map_err(|e| StoreError::codec("failed to encode demo steps", e))?;
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}

pub fn read_demo_file(path: &Path) -> Result<Demo> {
    let bytes = fs::read(path)
        .map_err(|e| StoreError::io(format!("failed to read {}", path.display()), e))?;
    // Non-UTF-8 bytes are corruption in the file, not an I/O fault.
    let raw = String::from_utf8(bytes)
        .map_err(|_| StoreError::invalid_demo(path, "not valid UTF-8"))?;
    Demo::decode(&raw, path)
}

pub fn write_demo_file(path: &Path, demo: &Demo) -> Result<()> {
    atomic_write_text(path, &demo.encode()?)
}

// A completed rename is the completeness marker: readers never observe a
// half-written demo file, only the temp name, which cache scans purge.
pub(crate) fn atomic_write_text(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(format!("failed to create {}", parent.display()), e))?;
    }
    let file_name = path.file_name().and_then(|s| s.to_str()).ok_or_else(|| {
        StoreError::config(format!("invalid file path for atomic write: {}", path.display()))
    })?;
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    fs::write(&tmp, body)
        .map_err(|e| StoreError::io(format!("failed to write temp file {}", tmp.display()), e))?;
    fs::rename(&tmp, path).map_err(|e| {
        StoreError::io(
            format!("failed to rename {} -> {}", tmp.display(), path.display()),
            e,
        )
    })?;
    Ok(())
}
