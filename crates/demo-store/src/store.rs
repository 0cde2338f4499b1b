use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cache::DemoCache;
use crate::config::StoreConfig;
use crate::demo::{DEMO_FILE_SUFFIX, Demo, atomic_write_text};
use crate::error::{Result, StoreError};
use crate::fingerprint::{TaskConfig, fingerprint_for};
use crate::remote::{Manifest, RemoteClient};

const SEED_MARKER_FILE: &str = ".seeded";
const SEED_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    AlreadySeeded,
    Seeded { demo_files: usize },
}

#[derive(Debug, Clone)]
pub struct DemoInventory {
    pub task: String,
    pub fingerprint: String,
    pub entry_dir: PathBuf,
    pub local: Vec<String>,
    pub backend: Option<String>,
    pub remote: Option<Vec<String>>,
    pub remote_error: Option<String>,
}

/// Single entry point for demo retrieval and publishing. Reads are satisfied
/// from the local cache first and topped up from the remote repository; writes
/// go straight through to the remote.
#[derive(Debug)]
pub struct DemoStore {
    cache: DemoCache,
    remote: Option<RemoteClient>,
    releases_url: Option<String>,
}

impl DemoStore {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let cache_root = config.resolve_cache_root()?;
        let cache = DemoCache::new(cache_root, &config.version)?;
        let remote = match config
            .backend
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(backend_ref) => Some(RemoteClient::new(config.backends.clone(), backend_ref)?),
            None => None,
        };
        Ok(Self {
            cache,
            remote,
            releases_url: config.resolve_releases_url(),
        })
    }

    /// Cache-only store with no remote backend.
    pub fn local(root: impl Into<PathBuf>, version: &str) -> Result<Self> {
        Ok(Self {
            cache: DemoCache::new(root, version)?,
            remote: None,
            releases_url: None,
        })
    }

    pub fn cache(&self) -> &DemoCache {
        &self.cache
    }

    pub fn remote(&self) -> Option<&RemoteClient> {
        self.remote.as_ref()
    }

    // Offline stores see exactly the cached ids as the available set.
    fn manifest_for(&self, task: &str, fingerprint: &str, cached: &[Demo]) -> Result<Manifest> {
        match &self.remote {
            Some(remote) => remote.list(task, fingerprint),
            None => Ok(Manifest::from_ids(
                cached.iter().map(|d| d.id().to_string()),
            )),
        }
    }

    /// Fetch exactly `count` demos recorded under `config`. Cached demos are
    /// served first; the shortfall is downloaded in manifest order and cached
    /// before being returned. Fails without downloading anything when the
    /// remote holds fewer than `count` demos.
    pub fn get_demos(&self, config: &TaskConfig, count: usize) -> Result<Vec<Demo>> {
        let fingerprint = fingerprint_for(config)?;
        let task = config.task.as_str();

        // One cache scan per call: the satisfied check and the shortfall below
        // work from the same snapshot, so a concurrent writer cannot skew them.
        let cached = self.cache.load_all(task, &fingerprint)?;
        if cached.len() >= count {
            let mut out = cached;
            out.truncate(count);
            debug!("served {count} demos for {task}/{fingerprint} from cache");
            return Ok(out);
        }
        debug!(
            "cache holds {} of {count} demos for {task}/{fingerprint}",
            cached.len()
        );

        let manifest = self.manifest_for(task, &fingerprint, &cached)?;
        if count > manifest.len() {
            return Err(StoreError::TooManyDemosRequested {
                requested: count,
                available: manifest.len(),
            });
        }

        let cached_ids: BTreeSet<String> = cached.iter().map(|d| d.id().to_string()).collect();
        let shortfall = count - cached.len();
        let mut out = cached;
        for id in manifest.ids() {
            if out.len() >= count {
                break;
            }
            if cached_ids.contains(id) {
                continue;
            }
            let demo = self
                .remote
                .as_ref()
                .ok_or_else(|| StoreError::remote("no remote backend configured"))?
                .download_one(task, &fingerprint, id)?;
            self.cache.insert(task, &fingerprint, &demo)?;
            out.push(demo);
        }
        if out.len() != count {
            return Err(StoreError::remote(format!(
                "manifest for {task}/{fingerprint} listed {} demos but only {} were retrievable",
                manifest.len(),
                out.len()
            )));
        }
        info!("downloaded {shortfall} demos for {task}/{fingerprint}");
        Ok(out)
    }

    /// Fetch every demo known for `config`: the cached set plus anything else
    /// the manifest lists.
    pub fn get_all_demos(&self, config: &TaskConfig) -> Result<Vec<Demo>> {
        let fingerprint = fingerprint_for(config)?;
        let task = config.task.as_str();

        let mut out = self.cache.load_all(task, &fingerprint)?;
        let Some(remote) = &self.remote else {
            return Ok(out);
        };
        let cached_ids: BTreeSet<String> = out.iter().map(|d| d.id().to_string()).collect();
        let manifest = remote.list(task, &fingerprint)?;
        for id in manifest.ids() {
            if cached_ids.contains(id) {
                continue;
            }
            let demo = remote.download_one(task, &fingerprint, id)?;
            self.cache.insert(task, &fingerprint, &demo)?;
            out.push(demo);
        }
        Ok(out)
    }

    /// Add a freshly recorded demo to the local cache under its own
    /// configuration fingerprint.
    pub fn record_demo(&self, demo: &Demo) -> Result<PathBuf> {
        let fingerprint = fingerprint_for(&demo.metadata.config)?;
        self.cache
            .insert(&demo.metadata.config.task, &fingerprint, demo)
    }

    /// Push one demo to the remote repository. Uploads are write-through and
    /// never populate the local cache.
    pub fn upload_demo(&self, demo: &Demo) -> Result<()> {
        let Some(remote) = &self.remote else {
            return Err(StoreError::remote("no remote backend configured"));
        };
        let fingerprint = fingerprint_for(&demo.metadata.config)?;
        remote.upload(&demo.metadata.config.task, &fingerprint, demo)
    }

    /// Push demos in order, stopping at the first failure.
    pub fn upload_demos(&self, demos: &[Demo]) -> Result<usize> {
        for (n, demo) in demos.iter().enumerate() {
            self.upload_demo(demo).map_err(|e| {
                debug!("upload stopped after {n} demos: {e}");
                e
            })?;
        }
        Ok(demos.len())
    }

    /// Snapshot of what is cached and (optionally) what the remote lists for
    /// one configuration. Remote listing failures are captured, not raised.
    pub fn inventory(&self, config: &TaskConfig, include_remote: bool) -> Result<DemoInventory> {
        let fingerprint = fingerprint_for(config)?;
        let task = config.task.as_str();
        let mut inventory = DemoInventory {
            task: task.to_string(),
            fingerprint: fingerprint.clone(),
            entry_dir: self.cache.entry_dir(task, &fingerprint)?,
            local: self.cache.list(task, &fingerprint)?,
            backend: self.remote.as_ref().map(|r| r.backend_ref().to_string()),
            remote: None,
            remote_error: None,
        };
        if include_remote && let Some(remote) = &self.remote {
            match remote.list(task, &fingerprint) {
                Ok(manifest) => inventory.remote = Some(manifest.ids().to_vec()),
                Err(e) => inventory.remote_error = Some(e.to_string()),
            }
        }
        Ok(inventory)
    }

    /// One-shot population of the cache version root from a published release
    /// archive. A marker file under the version root makes repeat calls no-ops.
    pub fn seed_cache(&self) -> Result<SeedOutcome> {
        let Some(releases_url) = self
            .releases_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return Err(StoreError::config(
                "store.releases_url is empty; cannot seed the cache",
            ));
        };

        let version_root = self.cache.ensure_version_root()?;
        let marker = version_root.join(SEED_MARKER_FILE);
        if marker.is_file() {
            debug!("cache already seeded at {}", version_root.display());
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let archive_url = format!(
            "{}/demonstrations-{}.tar",
            releases_url.trim_end_matches('/'),
            self.cache.version()
        );
        info!("seeding demo cache from {archive_url}");
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(SEED_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::remote(format!("failed to build HTTP client: {e}")))?;
        let res = client
            .get(&archive_url)
            .send()
            .map_err(|e| StoreError::remote(format!("seed archive download failed: {e}")))?;
        if !res.status().is_success() {
            return Err(StoreError::remote(format!(
                "seed archive download failed with status {} for {archive_url}",
                res.status()
            )));
        }
        let body = res
            .bytes()
            .map_err(|e| StoreError::remote(format!("seed archive read failed: {e}")))?;

        let staging = tempfile::tempdir()
            .map_err(|e| StoreError::io("failed to create staging dir".to_string(), e))?;
        let archive_path = staging.path().join("demonstrations.tar");
        std::fs::write(&archive_path, &body)
            .map_err(|e| StoreError::io(format!("failed to write {}", archive_path.display()), e))?;

        let out = Command::new("tar")
            .arg("-xf")
            .arg(&archive_path)
            .arg("-C")
            .arg(&version_root)
            .output()
            .map_err(|e| StoreError::remote(format!("failed to run tar: {e}")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(StoreError::remote(format!(
                "seed archive extraction failed: {stderr}"
            )));
        }

        let demo_files = WalkDir::new(&version_root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| {
                e.file_type().is_file()
                    && e.file_name()
                        .to_str()
                        .is_some_and(|n| n.ends_with(DEMO_FILE_SUFFIX))
            })
            .count();
        atomic_write_text(
            &marker,
            &format!("seeded {} from {archive_url}\n", chrono::Utc::now().to_rfc3339()),
        )?;
        info!("seeded {demo_files} demo files into {}", version_root.display());
        Ok(SeedOutcome::Seeded { demo_files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DemoMetadata, DemoStep};

    fn mk_config(task: &str) -> TaskConfig {
        TaskConfig {
            task: task.to_string(),
            ..TaskConfig::default()
        }
    }

    fn mk_demo(task: &str, action: f64) -> Demo {
        let metadata = DemoMetadata::new(mk_config(task), Some(7)).expect("metadata");
        Demo::new(
            metadata,
            vec![DemoStep {
                action: vec![action],
                termination: true,
                ..DemoStep::default()
            }],
        )
    }

    #[test]
    fn offline_store_serves_cached_demos_in_id_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        for i in 0..3 {
            store.record_demo(&mk_demo("stack_blocks", i as f64)).expect("record");
        }

        let cfg = mk_config("stack_blocks");
        let two = store.get_demos(&cfg, 2).expect("fetch");
        assert_eq!(two.len(), 2);
        let mut ids: Vec<&str> = two.iter().map(Demo::id).collect();
        let sorted = {
            let mut s = ids.clone();
            s.sort_unstable();
            s
        };
        assert_eq!(ids, sorted);

        // Same call again returns the same demos in the same order.
        let again = store.get_demos(&cfg, 2).expect("refetch");
        let again_ids: Vec<&str> = again.iter().map(Demo::id).collect();
        ids.sort_unstable();
        assert_eq!(again_ids, ids);
    }

    #[test]
    fn offline_store_reports_too_many_before_anything_else() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        store.record_demo(&mk_demo("stack_blocks", 0.1)).expect("record");
        store.record_demo(&mk_demo("stack_blocks", 0.2)).expect("record");

        let err = store
            .get_demos(&mk_config("stack_blocks"), 3)
            .expect_err("not enough demos");
        match err {
            StoreError::TooManyDemosRequested {
                requested,
                available,
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected TooManyDemosRequested, got {other}"),
        }
    }

    #[test]
    fn get_all_demos_returns_whole_cache_offline() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        for i in 0..4 {
            store.record_demo(&mk_demo("flip_cup", i as f64)).expect("record");
        }
        let all = store.get_all_demos(&mk_config("flip_cup")).expect("fetch all");
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn upload_without_remote_is_remote_unavailable() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        let err = store
            .upload_demo(&mk_demo("flip_cup", 0.3))
            .expect_err("no backend");
        assert!(matches!(err, StoreError::RemoteUnavailable { .. }));
    }

    #[test]
    fn seed_without_releases_url_is_config_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        let err = store.seed_cache().expect_err("no url");
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn inventory_lists_cached_ids_without_remote() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        let demo = mk_demo("flip_cup", 0.3);
        store.record_demo(&demo).expect("record");

        let inv = store
            .inventory(&mk_config("flip_cup"), true)
            .expect("inventory");
        assert_eq!(inv.local, vec![demo.id().to_string()]);
        assert!(inv.backend.is_none());
        assert!(inv.remote.is_none());
        assert!(inv.remote_error.is_none());
        assert!(inv.entry_dir.starts_with(tmp.path()));
    }

    #[test]
    fn fingerprints_partition_the_cache() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DemoStore::local(tmp.path(), "0.9.0").expect("store");
        let slow = TaskConfig {
            task: "flip_cup".to_string(),
            control_frequency: 50,
            ..TaskConfig::default()
        };
        let fast = TaskConfig {
            control_frequency: 100,
            ..slow.clone()
        };
        let metadata = DemoMetadata::new(slow.clone(), None).expect("metadata");
        let demo = Demo::new(
            metadata,
            vec![DemoStep {
                action: vec![1.0],
                termination: true,
                ..DemoStep::default()
            }],
        );
        store.record_demo(&demo).expect("record");

        assert_eq!(store.get_all_demos(&slow).expect("slow").len(), 1);
        assert!(store.get_all_demos(&fast).expect("fast").is_empty());
    }
}
