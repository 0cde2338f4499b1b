use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::demo::{DEMO_FILE_SUFFIX, Demo, read_demo_file, write_demo_file};
use crate::error::{Result, StoreError};
use crate::fingerprint::safe_component;

const HTTP_QUERY_TIMEOUT_SECS: u64 = 30;
const HTTP_TRANSFER_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub base_url_env: Option<String>,
    pub token: Option<String>,
    pub token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct S3BackendConfig {
    pub bucket: String,
    pub bucket_env: Option<String>,
    pub region: Option<String>,
    pub region_env: Option<String>,
    pub prefix: Option<String>,
    pub prefix_env: Option<String>,
    pub endpoint_url: Option<String>,
    pub endpoint_url_env: Option<String>,
    pub profile: Option<String>,
    pub profile_env: Option<String>,
    pub aws_access_key_id_env: Option<String>,
    pub aws_secret_access_key_env: Option<String>,
    pub aws_session_token_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RemoteBackendsConfig {
    pub s3: BTreeMap<String, S3BackendConfig>,
    pub http: BTreeMap<String, HttpBackendConfig>,
}

#[derive(Debug, Clone)]
enum BackendResolved<'a> {
    S3(String, &'a S3BackendConfig),
    Http(String, &'a HttpBackendConfig),
}

fn resolve_backend<'a>(
    backends: &'a RemoteBackendsConfig,
    backend_ref: &str,
) -> Result<BackendResolved<'a>> {
    let backend_ref = backend_ref.trim();
    if backend_ref.is_empty() {
        return Err(StoreError::config("empty remote backend reference"));
    }

    if let Some((kind, name)) = backend_ref.split_once(':') {
        let k = kind.trim();
        let n = name.trim();
        return match k {
            "s3" => backends
                .s3
                .get(n)
                .map(|v| BackendResolved::S3(n.to_string(), v))
                .ok_or_else(|| StoreError::config(format!("unknown remote backend '{k}:{n}'"))),
            "http" => backends
                .http
                .get(n)
                .map(|v| BackendResolved::Http(n.to_string(), v))
                .ok_or_else(|| StoreError::config(format!("unknown remote backend '{k}:{n}'"))),
            _ => Err(StoreError::config(format!(
                "unknown remote backend kind '{k}'; expected s3/http"
            ))),
        };
    }

    let mut hits = Vec::<BackendResolved<'a>>::new();
    if let Some(v) = backends.s3.get(backend_ref) {
        hits.push(BackendResolved::S3(backend_ref.to_string(), v));
    }
    if let Some(v) = backends.http.get(backend_ref) {
        hits.push(BackendResolved::Http(backend_ref.to_string(), v));
    }

    if hits.is_empty() {
        return Err(StoreError::config(format!(
            "unknown remote backend '{backend_ref}'"
        )));
    }
    if hits.len() > 1 {
        return Err(StoreError::config(format!(
            "ambiguous remote backend '{backend_ref}'; use kind:name"
        )));
    }
    Ok(hits.remove(0))
}

/// Sorted, de-duplicated demo ids available remotely for one task/fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    ids: Vec<String>,
}

impl Manifest {
    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        let set: BTreeSet<String> = ids.into_iter().collect();
        Self {
            ids: set.into_iter().collect(),
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.binary_search_by(|probe| probe.as_str().cmp(id)).is_ok()
    }
}

// Object names carry the demo file suffix; anything else in the listing is
// not a demo and is skipped.
fn manifest_from_names<I, S>(names: I) -> Manifest
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids = BTreeSet::<String>::new();
    for name in names {
        let name = name.as_ref().trim();
        let Some(stem) = name.strip_suffix(DEMO_FILE_SUFFIX) else {
            continue;
        };
        if let Ok(id) = safe_component("demo id", stem) {
            ids.insert(id);
        }
    }
    Manifest {
        ids: ids.into_iter().collect(),
    }
}

/// Client for one configured remote demo repository. Objects are keyed
/// `{task}/{fingerprint}/{demo_id}.json` under the backend's root.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    backends: RemoteBackendsConfig,
    backend_ref: String,
}

impl RemoteClient {
    pub fn new(backends: RemoteBackendsConfig, backend_ref: &str) -> Result<Self> {
        let backend_ref = backend_ref.trim().to_string();
        resolve_backend(&backends, &backend_ref)?;
        Ok(Self {
            backends,
            backend_ref,
        })
    }

    pub fn backend_ref(&self) -> &str {
        &self.backend_ref
    }

    fn resolved(&self) -> Result<BackendResolved<'_>> {
        resolve_backend(&self.backends, &self.backend_ref)
    }

    pub fn list(&self, task: &str, fingerprint: &str) -> Result<Manifest> {
        let task = safe_component("task id", task)?;
        let fingerprint = safe_component("fingerprint", fingerprint)?;
        match self.resolved()? {
            BackendResolved::Http(name, cfg) => list_http_demos(&name, cfg, &task, &fingerprint),
            BackendResolved::S3(name, cfg) => list_s3_demos(&name, cfg, &task, &fingerprint),
        }
    }

    pub fn download_one(&self, task: &str, fingerprint: &str, id: &str) -> Result<Demo> {
        let task = safe_component("task id", task)?;
        let fingerprint = safe_component("fingerprint", fingerprint)?;
        let id = safe_component("demo id", id)?;
        debug!("downloading demo {task}/{fingerprint}/{id} via {}", self.backend_ref);
        let demo = match self.resolved()? {
            BackendResolved::Http(name, cfg) => {
                download_http_demo(&name, cfg, &task, &fingerprint, &id)?
            }
            BackendResolved::S3(name, cfg) => {
                download_s3_demo(&name, cfg, &task, &fingerprint, &id)?
            }
        };
        if demo.id() != id {
            return Err(StoreError::invalid_demo(
                format!("{task}/{fingerprint}/{id}{DEMO_FILE_SUFFIX}"),
                format!("embedded id '{}' does not match requested id", demo.id()),
            ));
        }
        Ok(demo)
    }

    pub fn download(&self, task: &str, fingerprint: &str, ids: &[String]) -> Result<Vec<Demo>> {
        ids.iter()
            .map(|id| self.download_one(task, fingerprint, id))
            .collect()
    }

    pub fn probe(&self, task: &str, fingerprint: &str, id: &str) -> Result<bool> {
        let task = safe_component("task id", task)?;
        let fingerprint = safe_component("fingerprint", fingerprint)?;
        let id = safe_component("demo id", id)?;
        match self.resolved()? {
            BackendResolved::Http(name, cfg) => probe_http_demo(&name, cfg, &task, &fingerprint, &id),
            BackendResolved::S3(name, cfg) => probe_s3_demo(&name, cfg, &task, &fingerprint, &id),
        }
    }

    /// Write-through push of one demo. Existing remote ids are a conflict and
    /// are rejected before any body is transferred.
    pub fn upload(&self, task: &str, fingerprint: &str, demo: &Demo) -> Result<()> {
        demo.metadata.validate()?;
        let task = safe_component("task id", task)?;
        let fingerprint = safe_component("fingerprint", fingerprint)?;
        if self.probe(&task, &fingerprint, demo.id())? {
            return Err(StoreError::UploadRejected {
                id: demo.id().to_string(),
                reason: "demo already exists remotely".to_string(),
            });
        }
        debug!(
            "uploading demo {task}/{fingerprint}/{} via {}",
            demo.id(),
            self.backend_ref
        );
        match self.resolved()? {
            BackendResolved::Http(name, cfg) => upload_http_demo(&name, cfg, &task, &fingerprint, demo),
            BackendResolved::S3(name, cfg) => upload_s3_demo(&name, cfg, &task, &fingerprint, demo),
        }
    }
}

pub(crate) fn resolve_env_ref(env_key: Option<&str>) -> Option<String> {
    env_key
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|k| std::env::var(k).ok())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn resolve_string_field(literal: Option<&str>, env_key: Option<&str>) -> Option<String> {
    let direct = literal
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned);
    direct.or_else(|| resolve_env_ref(env_key))
}

pub(crate) fn resolve_required_string_field(
    cfg_path: &str,
    literal: Option<&str>,
    env_key: Option<&str>,
) -> Result<String> {
    resolve_string_field(literal, env_key).ok_or_else(|| {
        if let Some(k) = env_key.map(str::trim).filter(|s| !s.is_empty()) {
            StoreError::config(format!("{cfg_path} is empty (also checked env var '{k}')"))
        } else {
            StoreError::config(format!("{cfg_path} is empty"))
        }
    })
}

fn resolve_http_base_url(cfg_name: &str, cfg: &HttpBackendConfig) -> Result<String> {
    resolve_required_string_field(
        &format!("store.backends.http.{cfg_name}.base_url"),
        Some(cfg.base_url.as_str()),
        cfg.base_url_env.as_deref(),
    )
}

fn resolve_http_token(cfg: &HttpBackendConfig) -> Option<String> {
    resolve_string_field(cfg.token.as_deref(), cfg.token_env.as_deref())
}

fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StoreError::remote(format!("failed to build HTTP client: {e}")))
}

fn http_object_url(base: &str, task: &str, fingerprint: &str, id: &str) -> String {
    format!(
        "{}/{task}/{fingerprint}/{id}{DEMO_FILE_SUFFIX}",
        base.trim_end_matches('/')
    )
}

fn list_http_demos(
    cfg_name: &str,
    cfg: &HttpBackendConfig,
    task: &str,
    fingerprint: &str,
) -> Result<Manifest> {
    let base = resolve_http_base_url(cfg_name, cfg)?;
    let token = resolve_http_token(cfg);
    let client = http_client(HTTP_QUERY_TIMEOUT_SECS)?;
    let url = format!(
        "{}/{task}/{fingerprint}/?list=1",
        base.trim_end_matches('/')
    );
    let mut req = client.get(url);
    if let Some(t) = token.as_deref() {
        req = req.bearer_auth(t);
    }
    let res = req
        .send()
        .map_err(|e| StoreError::remote(format!("HTTP list failed: {e}")))?;
    if res.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(Manifest::default());
    }
    if !res.status().is_success() {
        return Err(StoreError::remote(format!(
            "HTTP list failed with status {}",
            res.status()
        )));
    }
    let v: serde_json::Value = res
        .json()
        .map_err(|e| StoreError::remote(format!("HTTP list JSON parse failed: {e}")))?;
    let mut names = Vec::<String>::new();
    match v {
        serde_json::Value::Array(arr) => {
            for e in arr {
                if let Some(s) = e.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                    names.push(s.to_string());
                }
            }
        }
        serde_json::Value::Object(map) => {
            if let Some(arr) = map.get("demos").and_then(|x| x.as_array()) {
                for e in arr {
                    if let Some(s) = e.as_str().map(str::trim).filter(|s| !s.is_empty()) {
                        names.push(s.to_string());
                    }
                }
            }
        }
        _ => {}
    }
    Ok(manifest_from_names(names))
}

fn download_http_demo(
    cfg_name: &str,
    cfg: &HttpBackendConfig,
    task: &str,
    fingerprint: &str,
    id: &str,
) -> Result<Demo> {
    let base = resolve_http_base_url(cfg_name, cfg)?;
    let token = resolve_http_token(cfg);
    let client = http_client(HTTP_TRANSFER_TIMEOUT_SECS)?;
    let url = http_object_url(&base, task, fingerprint, id);
    let mut req = client.get(&url);
    if let Some(t) = token.as_deref() {
        req = req.bearer_auth(t);
    }
    let res = req
        .send()
        .map_err(|e| StoreError::remote(format!("HTTP download failed: {e}")))?;
    if res.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(StoreError::DemoNotFound {
            task: task.to_string(),
            fingerprint: fingerprint.to_string(),
            id: id.to_string(),
        });
    }
    if !res.status().is_success() {
        return Err(StoreError::remote(format!(
            "HTTP download failed with status {}",
            res.status()
        )));
    }
    let body = res
        .text()
        .map_err(|e| StoreError::remote(format!("HTTP body read failed: {e}")))?;
    Demo::decode(&body, Path::new(&url))
}

fn probe_http_demo(
    cfg_name: &str,
    cfg: &HttpBackendConfig,
    task: &str,
    fingerprint: &str,
    id: &str,
) -> Result<bool> {
    let base = resolve_http_base_url(cfg_name, cfg)?;
    let token = resolve_http_token(cfg);
    let client = http_client(HTTP_QUERY_TIMEOUT_SECS)?;
    let url = http_object_url(&base, task, fingerprint, id);
    let mut req = client.head(url);
    if let Some(t) = token.as_deref() {
        req = req.bearer_auth(t);
    }
    let res = req
        .send()
        .map_err(|e| StoreError::remote(format!("HTTP probe failed: {e}")))?;
    if res.status().is_success() {
        return Ok(true);
    }
    if res.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(false);
    }
    Err(StoreError::remote(format!(
        "HTTP probe failed with status {}",
        res.status()
    )))
}

fn upload_http_demo(
    cfg_name: &str,
    cfg: &HttpBackendConfig,
    task: &str,
    fingerprint: &str,
    demo: &Demo,
) -> Result<()> {
    let base = resolve_http_base_url(cfg_name, cfg)?;
    let token = resolve_http_token(cfg);
    let client = http_client(HTTP_TRANSFER_TIMEOUT_SECS)?;
    let url = http_object_url(&base, task, fingerprint, demo.id());
    let mut req = client.put(url).body(demo.encode()?);
    if let Some(t) = token.as_deref() {
        req = req.bearer_auth(t);
    }
    let res = req
        .send()
        .map_err(|e| StoreError::remote(format!("HTTP upload failed: {e}")))?;
    if res.status().is_success() {
        return Ok(());
    }
    if matches!(
        res.status(),
        reqwest::StatusCode::CONFLICT | reqwest::StatusCode::PAYLOAD_TOO_LARGE
    ) {
        return Err(StoreError::UploadRejected {
            id: demo.id().to_string(),
            reason: format!("remote returned status {}", res.status()),
        });
    }
    Err(StoreError::remote(format!(
        "HTTP upload failed with status {}",
        res.status()
    )))
}

#[derive(Debug, Clone)]
struct S3ResolvedConfig {
    bucket: String,
    region: Option<String>,
    prefix: Option<String>,
    endpoint_url: Option<String>,
    profile: Option<String>,
    command_env: BTreeMap<String, String>,
}

fn resolve_s3_config(cfg_name: &str, cfg: &S3BackendConfig) -> Result<S3ResolvedConfig> {
    let bucket = resolve_required_string_field(
        &format!("store.backends.s3.{cfg_name}.bucket"),
        Some(cfg.bucket.as_str()),
        cfg.bucket_env.as_deref(),
    )?;
    let region = resolve_string_field(cfg.region.as_deref(), cfg.region_env.as_deref());
    let prefix = resolve_string_field(cfg.prefix.as_deref(), cfg.prefix_env.as_deref());
    let endpoint_url =
        resolve_string_field(cfg.endpoint_url.as_deref(), cfg.endpoint_url_env.as_deref());
    let profile = resolve_string_field(cfg.profile.as_deref(), cfg.profile_env.as_deref());

    let mut command_env = BTreeMap::<String, String>::new();
    for (dst, src) in [
        ("AWS_ACCESS_KEY_ID", cfg.aws_access_key_id_env.as_deref()),
        (
            "AWS_SECRET_ACCESS_KEY",
            cfg.aws_secret_access_key_env.as_deref(),
        ),
        ("AWS_SESSION_TOKEN", cfg.aws_session_token_env.as_deref()),
    ] {
        if let Some(v) = resolve_env_ref(src) {
            command_env.insert(dst.to_string(), v);
        }
    }

    Ok(S3ResolvedConfig {
        bucket,
        region,
        prefix,
        endpoint_url,
        profile,
        command_env,
    })
}

fn s3_entry_prefix(cfg: &S3ResolvedConfig, task: &str, fingerprint: &str) -> String {
    let mut key_prefix = String::new();
    if let Some(prefix) = cfg
        .prefix
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        key_prefix.push_str(prefix.trim_matches('/'));
        key_prefix.push('/');
    }
    key_prefix.push_str(task);
    key_prefix.push('/');
    key_prefix.push_str(fingerprint);
    key_prefix.push('/');
    key_prefix
}

fn s3_object_key(cfg: &S3ResolvedConfig, task: &str, fingerprint: &str, id: &str) -> String {
    format!(
        "{}{id}{DEMO_FILE_SUFFIX}",
        s3_entry_prefix(cfg, task, fingerprint)
    )
}

fn configure_s3_cli(cmd: &mut Command, cfg: &S3ResolvedConfig) {
    if let Some(profile) = cfg
        .profile
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        cmd.arg("--profile").arg(profile);
    }
    if let Some(region) = cfg
        .region
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        cmd.arg("--region").arg(region);
    }
    if let Some(endpoint) = cfg
        .endpoint_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        cmd.arg("--endpoint-url").arg(endpoint);
    }
    for (k, v) in &cfg.command_env {
        cmd.env(k, v);
    }
}

fn run_command_output(cmd: &mut Command) -> Result<Output> {
    cmd.output()
        .map_err(|e| StoreError::remote(format!("failed to run command {cmd:?}: {e}")))
}

fn command_summary(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    if !stdout.is_empty() {
        return stdout;
    }
    format!("status {}", out.status)
}

fn is_not_found_text(msg: &str) -> bool {
    let m = msg.to_ascii_lowercase();
    m.contains("not found")
        || m.contains("404")
        || m.contains("no such")
        || m.contains("does not exist")
        || m.contains("could not be found")
}

fn is_rejected_text(msg: &str) -> bool {
    let m = msg.to_ascii_lowercase();
    m.contains("quota") || m.contains("entitytoolarge") || m.contains("exceeded")
}

fn list_s3_demos(
    cfg_name: &str,
    cfg: &S3BackendConfig,
    task: &str,
    fingerprint: &str,
) -> Result<Manifest> {
    let resolved = resolve_s3_config(cfg_name, cfg)?;
    let prefix = s3_entry_prefix(&resolved, task, fingerprint);

    let mut cmd = Command::new("aws");
    configure_s3_cli(&mut cmd, &resolved);
    cmd.arg("s3api")
        .arg("list-objects-v2")
        .arg("--bucket")
        .arg(&resolved.bucket)
        .arg("--prefix")
        .arg(&prefix)
        .arg("--output")
        .arg("json");
    let out = run_command_output(&mut cmd)?;
    if !out.status.success() {
        let msg = command_summary(&out);
        if is_not_found_text(&msg) {
            return Ok(Manifest::default());
        }
        return Err(StoreError::remote(format!("S3 list failed: {msg}")));
    }
    let body = String::from_utf8_lossy(&out.stdout);
    if body.trim().is_empty() {
        return Ok(Manifest::default());
    }
    let v: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| StoreError::remote(format!("S3 list JSON parse failed: {e}")))?;
    let mut names = Vec::<String>::new();
    if let Some(arr) = v.get("Contents").and_then(|x| x.as_array()) {
        for item in arr {
            let Some(key) = item.get("Key").and_then(|x| x.as_str()) else {
                continue;
            };
            let Some(stripped) = key.strip_prefix(&prefix) else {
                continue;
            };
            if stripped.contains('/') {
                continue;
            }
            names.push(stripped.to_string());
        }
    }
    Ok(manifest_from_names(names))
}

fn download_s3_demo(
    cfg_name: &str,
    cfg: &S3BackendConfig,
    task: &str,
    fingerprint: &str,
    id: &str,
) -> Result<Demo> {
    let resolved = resolve_s3_config(cfg_name, cfg)?;
    let key = s3_object_key(&resolved, task, fingerprint, id);
    let staging = tempfile::tempdir()
        .map_err(|e| StoreError::io("failed to create staging dir".to_string(), e))?;
    let local = staging.path().join(format!("{id}{DEMO_FILE_SUFFIX}"));

    let mut cmd = Command::new("aws");
    configure_s3_cli(&mut cmd, &resolved);
    cmd.arg("s3")
        .arg("cp")
        .arg(format!("s3://{}/{key}", resolved.bucket))
        .arg(&local);
    let out = run_command_output(&mut cmd)?;
    if !out.status.success() {
        let msg = command_summary(&out);
        if is_not_found_text(&msg) {
            return Err(StoreError::DemoNotFound {
                task: task.to_string(),
                fingerprint: fingerprint.to_string(),
                id: id.to_string(),
            });
        }
        return Err(StoreError::remote(format!("S3 download failed: {msg}")));
    }
    read_demo_file(&local)
}

fn probe_s3_demo(
    cfg_name: &str,
    cfg: &S3BackendConfig,
    task: &str,
    fingerprint: &str,
    id: &str,
) -> Result<bool> {
    let resolved = resolve_s3_config(cfg_name, cfg)?;
    let key = s3_object_key(&resolved, task, fingerprint, id);
    let mut cmd = Command::new("aws");
    configure_s3_cli(&mut cmd, &resolved);
    cmd.arg("s3api")
        .arg("head-object")
        .arg("--bucket")
        .arg(&resolved.bucket)
        .arg("--key")
        .arg(&key);
    let out = run_command_output(&mut cmd)?;
    if out.status.success() {
        return Ok(true);
    }
    let msg = command_summary(&out);
    if is_not_found_text(&msg) {
        return Ok(false);
    }
    Err(StoreError::remote(format!("S3 probe failed: {msg}")))
}

fn upload_s3_demo(
    cfg_name: &str,
    cfg: &S3BackendConfig,
    task: &str,
    fingerprint: &str,
    demo: &Demo,
) -> Result<()> {
    let resolved = resolve_s3_config(cfg_name, cfg)?;
    let key = s3_object_key(&resolved, task, fingerprint, demo.id());
    let staging = tempfile::tempdir()
        .map_err(|e| StoreError::io("failed to create staging dir".to_string(), e))?;
    let local = staging.path().join(demo.metadata.file_name());
    write_demo_file(&local, demo)?;

    let mut cmd = Command::new("aws");
    configure_s3_cli(&mut cmd, &resolved);
    cmd.arg("s3")
        .arg("cp")
        .arg(&local)
        .arg(format!("s3://{}/{key}", resolved.bucket));
    let out = run_command_output(&mut cmd)?;
    if out.status.success() {
        return Ok(());
    }
    let msg = command_summary(&out);
    if is_rejected_text(&msg) {
        return Err(StoreError::UploadRejected {
            id: demo.id().to_string(),
            reason: msg,
        });
    }
    Err(StoreError::remote(format!("S3 upload failed: {msg}")))
}
