use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::demo::{DEMO_FILE_SUFFIX, Demo, read_demo_file, write_demo_file};
use crate::error::{Result, StoreError};
use crate::fingerprint::{fingerprint_for, safe_component};

pub const CACHE_SUBDIR: &str = "demonstrations";

/// On-disk demo cache for one dataset version. Layout:
/// `{root}/demonstrations/{version}/{task}/{fingerprint}/{demo_id}.json`.
#[derive(Debug, Clone)]
pub struct DemoCache {
    root: PathBuf,
    version: String,
}

impl DemoCache {
    pub fn new(root: impl Into<PathBuf>, version: &str) -> Result<Self> {
        let version = safe_component("dataset version", version)?;
        Ok(Self {
            root: root.into(),
            version,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn version_root(&self) -> PathBuf {
        self.root.join(CACHE_SUBDIR).join(&self.version)
    }

    pub fn ensure_version_root(&self) -> Result<PathBuf> {
        let dir = self.version_root();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("failed to create {}", dir.display()), e))?;
        Ok(dir)
    }

    pub fn entry_dir(&self, task: &str, fingerprint: &str) -> Result<PathBuf> {
        let task = safe_component("task id", task)?;
        let fingerprint = safe_component("fingerprint", fingerprint)?;
        Ok(self.version_root().join(task).join(fingerprint))
    }

    /// All valid demos in one cache entry, in on-disk enumeration order
    /// (sorted by file name). Stale temp files and demos that fail to decode
    /// are purged as the scan encounters them.
    pub fn load_all(&self, task: &str, fingerprint: &str) -> Result<Vec<Demo>> {
        let dir = self.entry_dir(task, fingerprint)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir)
            .map_err(|e| StoreError::io(format!("failed to read {}", dir.display()), e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| StoreError::io(format!("failed to read {}", dir.display()), e))?;
        entries.sort_by_key(|e| e.file_name());

        let mut demos = Vec::new();
        for entry in entries {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') && name.contains(".tmp.") {
                warn!("purging stale temp file {}", path.display());
                let _ = fs::remove_file(&path);
                continue;
            }
            if !name.ends_with(DEMO_FILE_SUFFIX) {
                continue;
            }
            match read_demo_file(&path) {
                Ok(demo) if demo.metadata.file_name() == name => demos.push(demo),
                Ok(demo) => {
                    warn!(
                        "purging cached demo {}: embedded id '{}' does not match file name",
                        path.display(),
                        demo.id()
                    );
                    let _ = fs::remove_file(&path);
                }
                Err(StoreError::InvalidDemo { reason, .. }) => {
                    warn!("purging invalid cached demo {}: {reason}", path.display());
                    let _ = fs::remove_file(&path);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(demos)
    }

    pub fn list(&self, task: &str, fingerprint: &str) -> Result<Vec<String>> {
        Ok(self
            .load_all(task, fingerprint)?
            .into_iter()
            .map(|d| d.metadata.id)
            .collect())
    }

    /// The first `count` cached demos in enumeration order; `CacheMiss` when
    /// fewer are present. Never touches the network.
    pub fn take(&self, task: &str, fingerprint: &str, count: usize) -> Result<Vec<Demo>> {
        let mut demos = self.load_all(task, fingerprint)?;
        if demos.len() < count {
            return Err(StoreError::CacheMiss {
                task: task.to_string(),
                fingerprint: fingerprint.to_string(),
                requested: count,
                cached: demos.len(),
            });
        }
        demos.truncate(count);
        Ok(demos)
    }

    /// Atomically materialize one demo into its cache entry. Re-inserting an
    /// existing id overwrites the file in place.
    pub fn insert(&self, task: &str, fingerprint: &str, demo: &Demo) -> Result<PathBuf> {
        demo.metadata.validate()?;
        let expected = fingerprint_for(&demo.metadata.config)?;
        if expected != fingerprint {
            return Err(StoreError::config(format!(
                "demo '{}' belongs to fingerprint {expected}, not {fingerprint}",
                demo.id()
            )));
        }
        let dir = self.entry_dir(task, fingerprint)?;
        let path = dir.join(demo.metadata.file_name());
        write_demo_file(&path, demo)?;
        debug!("cached demo {} at {}", demo.id(), path.display());
        Ok(path)
    }

    pub fn contains(&self, task: &str, fingerprint: &str, id: &str) -> Result<bool> {
        let id = safe_component("demo id", id)?;
        let path = self
            .entry_dir(task, fingerprint)?
            .join(format!("{id}{DEMO_FILE_SUFFIX}"));
        Ok(path.is_file())
    }

    pub fn remove_entry(&self, task: &str, fingerprint: &str) -> Result<()> {
        let dir = self.entry_dir(task, fingerprint)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(
                format!("failed to remove {}", dir.display()),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DemoMetadata, DemoStep};
    use crate::fingerprint::TaskConfig;
    use std::collections::BTreeMap;

    fn make_config(task: &str) -> TaskConfig {
        TaskConfig {
            task: task.to_string(),
            ..TaskConfig::default()
        }
    }

    fn make_demo(task: &str) -> Demo {
        let metadata = DemoMetadata::new(make_config(task), None).expect("metadata");
        let steps = vec![DemoStep {
            action: vec![0.0, 1.0],
            observations: BTreeMap::from([("qpos".to_string(), vec![0.25])]),
            reward: None,
            termination: true,
            truncation: false,
        }];
        Demo::new(metadata, steps)
    }

    fn cache_at(root: &Path) -> DemoCache {
        DemoCache::new(root, "0.9.0").expect("cache")
    }

    #[test]
    fn insert_then_list_in_sorted_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");

        let mut ids = Vec::new();
        for _ in 0..3 {
            let demo = make_demo("move_plate");
            ids.push(demo.id().to_string());
            cache.insert("move_plate", &fp, &demo).expect("insert");
        }
        ids.sort();

        assert_eq!(cache.list("move_plate", &fp).expect("list"), ids);
        assert!(cache.contains("move_plate", &fp, &ids[0]).expect("contains"));
        assert!(!cache.contains("move_plate", &fp, "deadbeef").expect("contains"));
        let demos = cache.take("move_plate", &fp, 2).expect("take");
        assert_eq!(demos.len(), 2);
        assert_eq!(demos[0].id(), ids[0]);
        assert_eq!(demos[1].id(), ids[1]);
    }

    #[test]
    fn take_signals_cache_miss_with_counts() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");
        cache
            .insert("move_plate", &fp, &make_demo("move_plate"))
            .expect("insert");

        let err = cache.take("move_plate", &fp, 3).expect_err("must miss");
        match err {
            StoreError::CacheMiss {
                requested, cached, ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(cached, 1);
            }
            other => panic!("expected CacheMiss, got {other}"),
        }
    }

    #[test]
    fn corrupt_entry_is_purged_on_scan() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");
        let demo = make_demo("move_plate");
        cache.insert("move_plate", &fp, &demo).expect("insert");

        let dir = cache.entry_dir("move_plate", &fp).expect("dir");
        let bad = dir.join("deadbeef.json");
        fs::write(&bad, "{ not json").expect("write bad");

        let ids = cache.list("move_plate", &fp).expect("list");
        assert_eq!(ids, vec![demo.id().to_string()]);
        assert!(!bad.exists(), "corrupt file must be purged");
    }

    #[test]
    fn non_utf8_entry_is_purged_on_scan() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");
        let demo = make_demo("move_plate");
        cache.insert("move_plate", &fp, &demo).expect("insert");

        let dir = cache.entry_dir("move_plate", &fp).expect("dir");
        let bad = dir.join("deadbeef.json");
        fs::write(&bad, [0xff, 0xfe, 0x80, 0x9f, 0x00, 0xd8]).expect("write bad");

        let ids = cache.list("move_plate", &fp).expect("list");
        assert_eq!(ids, vec![demo.id().to_string()]);
        assert!(!bad.exists(), "binary garbage must be purged");
    }

    #[test]
    fn checksum_mismatch_is_purged_on_scan() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");
        let demo = make_demo("move_plate");
        let path = cache.insert("move_plate", &fp, &demo).expect("insert");

        let raw = fs::read_to_string(&path).expect("read");
        fs::write(&path, raw.replace("0.25", "0.26")).expect("tamper");

        assert!(cache.list("move_plate", &fp).expect("list").is_empty());
        assert!(!path.exists(), "tampered file must be purged");
    }

    #[test]
    fn stale_temp_files_are_purged_on_scan() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");
        let dir = cache.entry_dir("move_plate", &fp).expect("dir");
        fs::create_dir_all(&dir).expect("mkdir");
        let stale = dir.join(".abc.json.tmp.123.456");
        fs::write(&stale, "partial").expect("write stale");

        assert!(cache.list("move_plate", &fp).expect("list").is_empty());
        assert!(!stale.exists(), "stale temp file must be purged");
    }

    #[test]
    fn fingerprints_never_share_entries() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg_a = make_config("move_plate");
        let mut cfg_b = make_config("move_plate");
        cfg_b.control_frequency = 500;
        let fp_a = fingerprint_for(&cfg_a).expect("fp a");
        let fp_b = fingerprint_for(&cfg_b).expect("fp b");
        assert_ne!(fp_a, fp_b);

        cache
            .insert("move_plate", &fp_a, &make_demo("move_plate"))
            .expect("insert");
        assert_eq!(cache.list("move_plate", &fp_a).expect("list a").len(), 1);
        assert!(cache.list("move_plate", &fp_b).expect("list b").is_empty());
    }

    #[test]
    fn insert_rejects_demo_from_another_partition() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let mut other = make_config("move_plate");
        other.control_frequency = 500;
        let wrong_fp = fingerprint_for(&other).expect("fp");

        let demo = make_demo("move_plate");
        let err = cache
            .insert("move_plate", &wrong_fp, &demo)
            .expect_err("must reject");
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn remove_entry_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = cache_at(tmp.path());
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");
        cache
            .insert("move_plate", &fp, &make_demo("move_plate"))
            .expect("insert");
        cache.remove_entry("move_plate", &fp).expect("remove");
        cache.remove_entry("move_plate", &fp).expect("remove again");
        assert!(cache.list("move_plate", &fp).expect("list").is_empty());
    }

    #[test]
    fn version_bump_starts_an_empty_cache() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = make_config("move_plate");
        let fp = fingerprint_for(&cfg).expect("fp");

        let old = cache_at(tmp.path());
        old.insert("move_plate", &fp, &make_demo("move_plate"))
            .expect("insert");

        let bumped = DemoCache::new(tmp.path(), "0.10.0").expect("cache");
        assert!(bumped.list("move_plate", &fp).expect("list").is_empty());
        assert_eq!(old.list("move_plate", &fp).expect("list").len(), 1);
    }
}
