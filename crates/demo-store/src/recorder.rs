use crate::demo::{Demo, DemoFormat, DemoMetadata, DemoStep};
use crate::error::{Result, StoreError};
use crate::fingerprint::TaskConfig;

/// Accumulates per-timestep records for one episode and freezes them into an
/// immutable demo. In lightweight mode observation snapshots and rewards are
/// dropped at record time, not at save time.
#[derive(Debug)]
pub struct DemoRecorder {
    metadata: DemoMetadata,
    steps: Vec<DemoStep>,
}

impl DemoRecorder {
    pub fn new(config: TaskConfig, seed: Option<u64>) -> Result<Self> {
        Ok(Self {
            metadata: DemoMetadata::new(config, seed)?,
            steps: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn add_step(&mut self, mut step: DemoStep) -> Result<()> {
        if let Some(last) = self.steps.last()
            && last.is_terminal()
        {
            return Err(StoreError::config(
                "episode already ended; cannot record more steps",
            ));
        }
        if let Some(first) = self.steps.first()
            && first.action.len() != step.action.len()
        {
            return Err(StoreError::config(format!(
                "action dimension changed from {} to {}",
                first.action.len(),
                step.action.len()
            )));
        }
        if self.metadata.format == DemoFormat::Lightweight {
            step.observations.clear();
            step.reward = None;
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn finish(self) -> Result<Demo> {
        if self.steps.is_empty() {
            return Err(StoreError::config("cannot finish a demo with no steps"));
        }
        Ok(Demo::new(self.metadata, self.steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::ObservationMode;
    use std::collections::BTreeMap;

    fn mk_config(task: &str) -> TaskConfig {
        TaskConfig {
            task: task.to_string(),
            ..TaskConfig::default()
        }
    }

    fn step(action: Vec<f64>, terminal: bool) -> DemoStep {
        DemoStep {
            action,
            observations: BTreeMap::from([("qpos".to_string(), vec![0.1, 0.2])]),
            reward: Some(1.0),
            termination: terminal,
            truncation: false,
        }
    }

    #[test]
    fn records_steps_and_finishes() {
        let mut rec = DemoRecorder::new(mk_config("stack_blocks"), Some(3)).expect("recorder");
        rec.add_step(step(vec![0.1, 0.2], false)).expect("step 1");
        rec.add_step(step(vec![0.3, 0.4], true)).expect("step 2");
        assert_eq!(rec.step_count(), 2);

        let demo = rec.finish().expect("finish");
        assert_eq!(demo.step_count(), 2);
        assert_eq!(demo.metadata.seed, Some(3));
        assert_eq!(demo.format(), DemoFormat::Full);
        assert!(demo.steps[0].reward.is_some());
    }

    #[test]
    fn rejects_steps_after_episode_end() {
        let mut rec = DemoRecorder::new(mk_config("stack_blocks"), None).expect("recorder");
        rec.add_step(step(vec![0.1], true)).expect("terminal step");
        assert!(rec.add_step(step(vec![0.2], false)).is_err());
    }

    #[test]
    fn rejects_action_dimension_change() {
        let mut rec = DemoRecorder::new(mk_config("stack_blocks"), None).expect("recorder");
        rec.add_step(step(vec![0.1, 0.2], false)).expect("first");
        let err = rec.add_step(step(vec![0.1], false)).expect_err("dim change");
        assert!(err.to_string().contains("action dimension"));
    }

    #[test]
    fn rejects_empty_episode() {
        let rec = DemoRecorder::new(mk_config("stack_blocks"), None).expect("recorder");
        assert!(rec.finish().is_err());
    }

    #[test]
    fn lightweight_mode_strips_observations_at_record_time() {
        let config = TaskConfig {
            observation_mode: ObservationMode::Lightweight,
            ..mk_config("stack_blocks")
        };
        let mut rec = DemoRecorder::new(config, None).expect("recorder");
        rec.add_step(step(vec![0.5], true)).expect("step");

        let demo = rec.finish().expect("finish");
        assert_eq!(demo.format(), DemoFormat::Lightweight);
        assert!(demo.steps[0].observations.is_empty());
        assert!(demo.steps[0].reward.is_none());
    }
}
