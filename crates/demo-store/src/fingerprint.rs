use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

pub const CONTROL_FREQUENCY_MIN: u32 = 20;
pub const CONTROL_FREQUENCY_MAX: u32 = 500;

fn default_control_frequency() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

fn default_resolution() -> [u32; 2] {
    [84, 84]
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    JointPosition,
    JointDelta,
    EndEffector,
}

impl Default for ActionMode {
    fn default() -> Self {
        Self::JointPosition
    }
}

impl ActionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JointPosition => "joint_position",
            Self::JointDelta => "joint_delta",
            Self::EndEffector => "end_effector",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObservationMode {
    State,
    Pixel,
    Lightweight,
}

impl Default for ObservationMode {
    fn default() -> Self {
        Self::State
    }
}

impl ObservationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Pixel => "pixel",
            Self::Lightweight => "lightweight",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CameraSpec {
    pub name: String,
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            resolution: default_resolution(),
        }
    }
}

/// The demo-partitioning identity of one task request. Demos recorded under
/// different values of any field here are not interchangeable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub task: String,
    pub action_mode: ActionMode,
    pub floating_base: bool,
    #[serde(default = "default_control_frequency")]
    pub control_frequency: u32,
    #[serde(default = "default_true")]
    pub proprioception: bool,
    pub observation_mode: ObservationMode,
    pub cameras: Vec<CameraSpec>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            task: String::new(),
            action_mode: ActionMode::default(),
            floating_base: false,
            control_frequency: default_control_frequency(),
            proprioception: true,
            observation_mode: ObservationMode::default(),
            cameras: Vec::new(),
        }
    }
}

impl TaskConfig {
    pub fn validate(&self) -> Result<()> {
        safe_component("task id", &self.task)?;
        if self.control_frequency < CONTROL_FREQUENCY_MIN
            || self.control_frequency > CONTROL_FREQUENCY_MAX
        {
            return Err(StoreError::config(format!(
                "control_frequency {} out of range [{}, {}]",
                self.control_frequency, CONTROL_FREQUENCY_MIN, CONTROL_FREQUENCY_MAX
            )));
        }
        if self.observation_mode == ObservationMode::Pixel && self.cameras.is_empty() {
            return Err(StoreError::config(
                "pixel observation mode requires at least one camera",
            ));
        }
        for cam in &self.cameras {
            safe_component("camera name", &cam.name)?;
            if cam.resolution[0] == 0 || cam.resolution[1] == 0 {
                return Err(StoreError::config(format!(
                    "camera '{}' has a zero resolution",
                    cam.name
                )));
            }
        }
        Ok(())
    }

    /// Short human-readable summary of the partition, for logs and listings.
    pub fn describe(&self) -> String {
        let mut parts = vec![
            self.action_mode.as_str().to_string(),
            format!("{}hz", self.control_frequency),
            self.observation_mode.as_str().to_string(),
        ];
        if self.floating_base {
            parts.insert(1, "floating".to_string());
        }
        if !self.cameras.is_empty() {
            let cams = self
                .cameras
                .iter()
                .map(|c| format!("{}_{}x{}", c.name, c.resolution[0], c.resolution[1]))
                .collect::<Vec<_>>()
                .join("_");
            parts.push(cams);
        }
        parts.join("_")
    }
}

/// Hex SHA-256 of the canonical JSON encoding of the config. Map keys are
/// sorted by the encoder, so key order in the source file never matters;
/// camera list order does, matching the recorded data.
pub fn fingerprint_for(cfg: &TaskConfig) -> Result<String> {
    cfg.validate()?;
    let payload = serde_json::to_value(cfg)
        .map_err(|e| StoreError::codec("failed to encode fingerprint payload", e))?;
    let encoded = serde_json::to_vec(&payload)
        .map_err(|e| StoreError::codec("failed to encode fingerprint payload", e))?;
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}

/// Ids that end up in paths and object keys: ASCII alphanumerics plus `._-`.
pub fn safe_component(what: &str, raw: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(StoreError::config(format!("{what} is empty")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(StoreError::config(format!(
            "{what} '{value}' contains invalid characters"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> TaskConfig {
        TaskConfig {
            task: "move_plate".to_string(),
            ..TaskConfig::default()
        }
    }

    #[test]
    fn fingerprint_is_stable_across_calls() {
        let cfg = base_config();
        let a = fingerprint_for(&cfg).expect("fp a");
        let b = fingerprint_for(&cfg).expect("fp b");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_ignores_source_key_order() {
        let a: TaskConfig = serde_json::from_str(
            r#"{"task": "move_plate", "control_frequency": 100, "floating_base": true}"#,
        )
        .expect("parse a");
        let b: TaskConfig = serde_json::from_str(
            r#"{"floating_base": true, "task": "move_plate", "control_frequency": 100}"#,
        )
        .expect("parse b");
        assert_eq!(
            fingerprint_for(&a).expect("fp a"),
            fingerprint_for(&b).expect("fp b")
        );
    }

    #[test]
    fn fingerprint_changes_with_control_frequency() {
        let a = fingerprint_for(&base_config()).expect("fp a");
        let mut cfg = base_config();
        cfg.control_frequency = 500;
        let b = fingerprint_for(&cfg).expect("fp b");
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_respects_camera_order() {
        let mut cfg = base_config();
        cfg.observation_mode = ObservationMode::Pixel;
        cfg.cameras = vec![
            CameraSpec {
                name: "head".into(),
                resolution: [84, 84],
            },
            CameraSpec {
                name: "wrist".into(),
                resolution: [84, 84],
            },
        ];
        let a = fingerprint_for(&cfg).expect("fp a");
        cfg.cameras.reverse();
        let b = fingerprint_for(&cfg).expect("fp b");
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_frequency_is_rejected() {
        let mut cfg = base_config();
        cfg.control_frequency = 501;
        let err = fingerprint_for(&cfg).expect_err("must fail");
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn pixel_mode_requires_a_camera() {
        let mut cfg = base_config();
        cfg.observation_mode = ObservationMode::Pixel;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unsafe_task_id_is_rejected() {
        let mut cfg = base_config();
        cfg.task = "move/plate".to_string();
        assert!(cfg.validate().is_err());
        cfg.task = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn describe_names_the_partition() {
        let mut cfg = base_config();
        cfg.floating_base = true;
        let d = cfg.describe();
        assert!(d.contains("joint_position"));
        assert!(d.contains("floating"));
        assert!(d.contains("50hz"));
        assert!(d.contains("state"));
    }
}
