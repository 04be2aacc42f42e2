//! Registry of generated assets, keyed by stable backend identity.
//!
//! The backend reports outputs as (filename, subfolder, type) triples. That
//! triple is the identity; URLs are computed at read time from the current
//! base URL so records survive hostname changes. Each record carries full
//! provenance (the workflow document that was submitted, the backend history
//! snapshot) so any asset can be regenerated with overrides later.
//!
//! Records expire after a TTL. Expiry is lazy: reads drop expired records as
//! they encounter them, and `list` sweeps the whole map first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Time source for the registry. Injected so tests can drive expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Stable identity of a backend output file.
///
/// Equality is the whole triple. Two jobs writing the same filename in the
/// same subfolder and folder type produce the same identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetIdentity {
    pub filename: String,
    pub subfolder: String,
    /// Backend folder type: "output", "input", or "temp"
    pub folder_type: String,
}

impl AssetIdentity {
    pub fn new(
        filename: impl Into<String>,
        subfolder: impl Into<String>,
        folder_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            subfolder: subfolder.into(),
            folder_type: folder_type.into(),
        }
    }
}

/// Provenance record for one generated asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Surrogate key (UUID v4). Stable across re-registration of the same identity.
    pub asset_id: String,

    pub identity: AssetIdentity,

    /// Backend job id that produced this file
    pub prompt_id: String,

    /// Which workflow produced it (e.g. "generate_image")
    pub workflow_id: String,

    /// Full rendered workflow document as submitted to the backend
    pub submitted_workflow: serde_json::Value,

    /// Backend history snapshot for the producing job
    pub backend_history: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,

    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes_size: u64,

    /// Resolved parameter map used at render time, plus anything else the
    /// producing tool wants to remember
    pub metadata: serde_json::Value,
}

/// Input to [`AssetRegistry::register`]. The registry mints the id and
/// expiry itself.
#[derive(Clone, Debug)]
pub struct NewAsset {
    pub identity: AssetIdentity,
    pub prompt_id: String,
    pub workflow_id: String,
    pub submitted_workflow: serde_json::Value,
    pub backend_history: serde_json::Value,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes_size: Option<u64>,
    pub metadata: serde_json::Value,
}

impl NewAsset {
    pub fn new(
        identity: AssetIdentity,
        prompt_id: impl Into<String>,
        workflow_id: impl Into<String>,
        submitted_workflow: serde_json::Value,
        backend_history: serde_json::Value,
    ) -> Self {
        Self {
            identity,
            prompt_id: prompt_id.into(),
            workflow_id: workflow_id.into(),
            submitted_workflow,
            backend_history,
            mime_type: None,
            width: None,
            height: None,
            bytes_size: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Compute the view URL for an identity against a base URL.
///
/// Filename and subfolder are percent-encoded (spaces, `#`, nested `/`
/// subfolders all round-trip). The subfolder parameter is omitted when
/// empty. Folder type is a controlled vocabulary so it is emitted as-is.
pub fn compute_url(identity: &AssetIdentity, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let filename = urlencoding::encode(&identity.filename);
    if identity.subfolder.is_empty() {
        format!(
            "{}/view?filename={}&type={}",
            base, filename, identity.folder_type
        )
    } else {
        format!(
            "{}/view?filename={}&subfolder={}&type={}",
            base,
            filename,
            urlencoding::encode(&identity.subfolder),
            identity.folder_type
        )
    }
}

/// Both maps live under one mutex; there is no finer-grained locking.
struct Inner {
    /// asset_id -> record
    assets: HashMap<String, AssetRecord>,
    /// identity -> asset_id
    id_by_identity: HashMap<AssetIdentity, String>,
}

/// In-memory asset registry with TTL expiry.
pub struct AssetRegistry {
    inner: Mutex<Inner>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl AssetRegistry {
    /// New registry with the given TTL, using wall-clock time.
    pub fn new(ttl_hours: u64) -> Self {
        Self::with_clock(ttl_hours, Arc::new(SystemClock))
    }

    /// New registry with an injected clock (tests).
    pub fn with_clock(ttl_hours: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                assets: HashMap::new(),
                id_by_identity: HashMap::new(),
            }),
            ttl: chrono::Duration::hours(ttl_hours as i64),
            clock,
        }
    }

    /// Insert or refresh the record for an identity.
    ///
    /// Re-registering a live identity refreshes its provenance and expiry in
    /// place and returns the record under the SAME asset_id, regardless of
    /// which workflow produced it this time (last write wins). An expired
    /// record is dropped first and a fresh id is minted.
    pub fn register(&self, new: NewAsset) -> AssetRecord {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing_id) = inner.id_by_identity.get(&new.identity).cloned() {
            let expired = inner
                .assets
                .get(&existing_id)
                .map(|r| now > r.expires_at)
                .unwrap_or(true);
            if expired {
                inner.assets.remove(&existing_id);
                inner.id_by_identity.remove(&new.identity);
            } else {
                let record = inner
                    .assets
                    .get_mut(&existing_id)
                    .expect("identity index points at live record");
                record.prompt_id = new.prompt_id;
                record.workflow_id = new.workflow_id;
                record.submitted_workflow = new.submitted_workflow;
                record.backend_history = new.backend_history;
                if let Some(mime_type) = new.mime_type {
                    record.mime_type = mime_type;
                }
                record.width = new.width.or(record.width);
                record.height = new.height.or(record.height);
                if let Some(bytes_size) = new.bytes_size {
                    record.bytes_size = bytes_size;
                }
                if !new.metadata.is_null() {
                    record.metadata = new.metadata;
                }
                record.expires_at = now + self.ttl;
                tracing::debug!(asset_id = %existing_id, "refreshed existing asset record");
                return record.clone();
            }
        }

        let record = AssetRecord {
            asset_id: Uuid::new_v4().to_string(),
            identity: new.identity.clone(),
            prompt_id: new.prompt_id,
            workflow_id: new.workflow_id,
            submitted_workflow: new.submitted_workflow,
            backend_history: new.backend_history,
            created_at: now,
            expires_at: now + self.ttl,
            mime_type: new
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            width: new.width,
            height: new.height,
            bytes_size: new.bytes_size.unwrap_or(0),
            metadata: if new.metadata.is_null() {
                serde_json::json!({})
            } else {
                new.metadata
            },
        };

        inner
            .id_by_identity
            .insert(new.identity, record.asset_id.clone());
        inner.assets.insert(record.asset_id.clone(), record.clone());
        tracing::debug!(
            asset_id = %record.asset_id,
            workflow_id = %record.workflow_id,
            "registered asset"
        );
        record
    }

    /// Look up by surrogate id. Expired records are dropped and reported absent.
    pub fn get(&self, asset_id: &str) -> Option<AssetRecord> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        Self::get_live(&mut inner, asset_id, now)
    }

    /// Look up by identity triple. Same expiry laziness as [`Self::get`].
    pub fn find_by_identity(&self, identity: &AssetIdentity) -> Option<AssetRecord> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        let asset_id = inner.id_by_identity.get(identity).cloned()?;
        Self::get_live(&mut inner, &asset_id, now)
    }

    fn get_live(inner: &mut Inner, asset_id: &str, now: DateTime<Utc>) -> Option<AssetRecord> {
        let record = inner.assets.get(asset_id)?;
        if now > record.expires_at {
            let identity = record.identity.clone();
            inner.assets.remove(asset_id);
            inner.id_by_identity.remove(&identity);
            return None;
        }
        Some(record.clone())
    }

    /// Recent assets, newest first, truncated to `limit`, optionally
    /// filtered by workflow. Sweeps expired records first so none appear.
    pub fn list(&self, limit: usize, workflow_id: Option<&str>) -> Vec<AssetRecord> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        Self::sweep(&mut inner, now);

        let mut records: Vec<AssetRecord> = inner
            .assets
            .values()
            .filter(|r| workflow_id.is_none_or(|w| r.workflow_id == w))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        records
    }

    /// Drop every expired record now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock().unwrap();
        Self::sweep(&mut inner, now)
    }

    fn sweep(inner: &mut Inner, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = inner
            .assets
            .iter()
            .filter(|(_, r)| now > r.expires_at)
            .map(|(id, _)| id.clone())
            .collect();

        for asset_id in &expired {
            if let Some(record) = inner.assets.remove(asset_id) {
                inner.id_by_identity.remove(&record.identity);
            }
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "swept expired assets");
        }
        expired.len()
    }

    /// Number of live records (expired but unswept records still count).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Clock that tests can advance by hand.
    struct FakeClock {
        now: StdMutex<DateTime<Utc>>,
    }

    impl FakeClock {
        fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: StdMutex::new(start),
            }
        }

        fn advance(&self, duration: chrono::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += duration;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn start_time() -> DateTime<Utc> {
        "2024-01-15T12:00:00Z".parse().unwrap()
    }

    fn sample_asset(filename: &str, workflow_id: &str) -> NewAsset {
        NewAsset::new(
            AssetIdentity::new(filename, "", "output"),
            "prompt_123",
            workflow_id,
            json!({"3": {"class_type": "KSampler", "inputs": {"steps": 20}}}),
            json!({"status": "completed"}),
        )
    }

    #[test]
    fn test_register_and_get_round_trip() {
        let registry = AssetRegistry::new(24);
        let record = registry.register(sample_asset("out.png", "generate_image"));

        let fetched = registry.get(&record.asset_id).unwrap();
        assert_eq!(fetched.asset_id, record.asset_id);
        assert_eq!(fetched.identity.filename, "out.png");
        assert_eq!(fetched.workflow_id, "generate_image");
        assert_eq!(fetched.submitted_workflow["3"]["inputs"]["steps"], 20);
    }

    #[test]
    fn test_find_by_identity() {
        let registry = AssetRegistry::new(24);
        let record = registry.register(sample_asset("out.png", "generate_image"));

        let identity = AssetIdentity::new("out.png", "", "output");
        let found = registry.find_by_identity(&identity).unwrap();
        assert_eq!(found.asset_id, record.asset_id);

        let missing = AssetIdentity::new("other.png", "", "output");
        assert!(registry.find_by_identity(&missing).is_none());
    }

    #[test]
    fn test_get_unknown_id_returns_none() {
        let registry = AssetRegistry::new(24);
        assert!(registry.get("no-such-id").is_none());
    }

    #[test]
    fn test_reregister_same_identity_keeps_id_and_single_record() {
        let registry = AssetRegistry::new(24);
        let first = registry.register(sample_asset("out.png", "generate_image"));

        let mut again = sample_asset("out.png", "generate_image");
        again.prompt_id = "prompt_456".to_string();
        again.submitted_workflow = json!({"3": {"inputs": {"steps": 40}}});
        let second = registry.register(again);

        assert_eq!(second.asset_id, first.asset_id);
        assert_eq!(registry.len(), 1);

        let fetched = registry.get(&first.asset_id).unwrap();
        assert_eq!(fetched.prompt_id, "prompt_456");
        assert_eq!(fetched.submitted_workflow["3"]["inputs"]["steps"], 40);
    }

    #[test]
    fn test_reregister_different_workflow_last_write_wins() {
        let registry = AssetRegistry::new(24);
        let first = registry.register(sample_asset("out.png", "generate_image"));
        let second = registry.register(sample_asset("out.png", "regenerate"));

        assert_eq!(second.asset_id, first.asset_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&first.asset_id).unwrap().workflow_id, "regenerate");
    }

    #[test]
    fn test_expired_record_dropped_on_get() {
        let clock = Arc::new(FakeClock::new(start_time()));
        let registry = AssetRegistry::with_clock(24, clock.clone());
        let record = registry.register(sample_asset("out.png", "generate_image"));

        clock.advance(chrono::Duration::hours(23));
        assert!(registry.get(&record.asset_id).is_some());

        clock.advance(chrono::Duration::hours(2));
        assert!(registry.get(&record.asset_id).is_none());
        // Lazy removal actually removed it
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_expired_identity_gets_fresh_id() {
        let clock = Arc::new(FakeClock::new(start_time()));
        let registry = AssetRegistry::with_clock(24, clock.clone());
        let first = registry.register(sample_asset("out.png", "generate_image"));

        clock.advance(chrono::Duration::hours(25));
        let second = registry.register(sample_asset("out.png", "generate_image"));

        assert_ne!(second.asset_id, first.asset_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sweep_expired_counts() {
        let clock = Arc::new(FakeClock::new(start_time()));
        let registry = AssetRegistry::with_clock(24, clock.clone());
        registry.register(sample_asset("a.png", "generate_image"));
        registry.register(sample_asset("b.png", "generate_image"));

        clock.advance(chrono::Duration::hours(12));
        registry.register(sample_asset("c.png", "generate_image"));

        // a and b are past their expiry, c is not
        clock.advance(chrono::Duration::hours(13));
        assert_eq!(registry.sweep_expired(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sweep_expired(), 0);
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let clock = Arc::new(FakeClock::new(start_time()));
        let registry = AssetRegistry::with_clock(24, clock.clone());

        registry.register(sample_asset("a.png", "generate_image"));
        clock.advance(chrono::Duration::minutes(1));
        registry.register(sample_asset("b.png", "generate_audio"));
        clock.advance(chrono::Duration::minutes(1));
        registry.register(sample_asset("c.png", "generate_image"));

        let all = registry.list(10, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].identity.filename, "c.png");
        assert_eq!(all[2].identity.filename, "a.png");

        let limited = registry.list(2, None);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].identity.filename, "c.png");

        let images = registry.list(10, Some("generate_image"));
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|r| r.workflow_id == "generate_image"));

        assert!(registry.list(0, None).is_empty());
    }

    #[test]
    fn test_list_sweeps_expired() {
        let clock = Arc::new(FakeClock::new(start_time()));
        let registry = AssetRegistry::with_clock(24, clock.clone());
        registry.register(sample_asset("a.png", "generate_image"));

        clock.advance(chrono::Duration::hours(25));
        assert!(registry.list(10, None).is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_compute_url_basic() {
        let identity = AssetIdentity::new("out.png", "gens", "output");
        assert_eq!(
            compute_url(&identity, "http://localhost:8188"),
            "http://localhost:8188/view?filename=out.png&subfolder=gens&type=output"
        );
    }

    #[test]
    fn test_compute_url_empty_subfolder_omitted() {
        let identity = AssetIdentity::new("a b.png", "", "output");
        assert_eq!(
            compute_url(&identity, "http://localhost:8188"),
            "http://localhost:8188/view?filename=a%20b.png&type=output"
        );
    }

    #[test]
    fn test_compute_url_trailing_slash_and_special_chars() {
        let identity = AssetIdentity::new("img #1.png", "2024/01/15", "output");
        assert_eq!(
            compute_url(&identity, "http://gpubox:8188/"),
            "http://gpubox:8188/view?filename=img%20%231.png&subfolder=2024%2F01%2F15&type=output"
        );
    }

    #[test]
    fn test_compute_url_unicode() {
        let identity = AssetIdentity::new("café.png", "", "output");
        assert_eq!(
            compute_url(&identity, "http://localhost:8188"),
            "http://localhost:8188/view?filename=caf%C3%A9.png&type=output"
        );
    }

    #[test]
    fn test_url_never_stored() {
        // Same record, different base URLs: URL reflects the current base
        let registry = AssetRegistry::new(24);
        let record = registry.register(sample_asset("out.png", "generate_image"));

        let local = compute_url(&record.identity, "http://localhost:8188");
        let remote = compute_url(&record.identity, "http://gpubox:8188");
        assert!(local.starts_with("http://localhost:8188/view"));
        assert!(remote.starts_with("http://gpubox:8188/view"));
    }
}
