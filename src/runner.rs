// src/runner.rs
//! Cached run protocol.
//!
//! restore tracker -> run job -> save tracker, where the save happens only
//! when the job succeeded. A failed job also has its working-copy tracker
//! rolled back, so dedup state from a failed run is never committed.

use crate::cache::{CacheHit, CacheKey, FsCacheStore};
use crate::error::{PosterError, Result};
use crate::types::PostOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

const LOCK_FILE: &str = "run.lock";
/// A lock older than this was left behind by a run that never released it.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(2 * 60 * 60);

/// One unit of work that reads and updates the tracker at `tracker_path`.
#[async_trait]
pub trait PostJob: Send + Sync {
    async fn run(&self, tracker_path: &Path) -> Result<PostOutcome>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub restored_from: Option<CacheHit>,
    pub outcome: PostOutcome,
    pub saved_key: String,
}

/// Exclusive claim on a cache root, released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(cache_root: &Path) -> Result<Self> {
        Self::acquire_with_max_age(cache_root, STALE_LOCK_AGE)
    }

    /// Claim the cache root. An existing lock is taken over when it is older
    /// than `max_age` or its owning process is gone.
    pub fn acquire_with_max_age(cache_root: &Path, max_age: Duration) -> Result<Self> {
        std::fs::create_dir_all(cache_root)?;
        let path = cache_root.join(LOCK_FILE);
        let locked = || PosterError::Locked(path.display().to_string());

        let mut file = match create_lock_file(&path)? {
            Some(file) => file,
            None => {
                if !lock_is_stale(&path, max_age) {
                    return Err(locked());
                }
                warn!("Removing stale run lock {}", path.display());
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // Another run may have reclaimed it first
                create_lock_file(&path)?.ok_or_else(locked)?
            }
        };

        writeln!(
            file,
            "{} pid={} at={}",
            uuid::Uuid::new_v4(),
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;

        Ok(Self { path })
    }
}

fn create_lock_file(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Owner fields of a lock file line `"{uuid} pid={pid} at={rfc3339}"`.
#[derive(Debug, Default, PartialEq)]
struct LockOwner {
    pid: Option<u32>,
    taken_at: Option<DateTime<Utc>>,
}

fn parse_lock_owner(contents: &str) -> LockOwner {
    let mut owner = LockOwner::default();
    for field in contents.split_whitespace() {
        if let Some(pid) = field.strip_prefix("pid=") {
            owner.pid = pid.parse().ok();
        } else if let Some(at) = field.strip_prefix("at=") {
            owner.taken_at = DateTime::parse_from_rfc3339(at)
                .ok()
                .map(|t| t.with_timezone(&Utc));
        }
    }
    owner
}

fn lock_is_stale(path: &Path, max_age: Duration) -> bool {
    let owner = parse_lock_owner(&std::fs::read_to_string(path).unwrap_or_default());

    // Unreadable or half-written locks fall back to the file's mtime
    let taken_at = owner.taken_at.or_else(|| {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    });
    if let Some(taken_at) = taken_at {
        let too_old = (Utc::now() - taken_at)
            .to_std()
            .map(|age| age > max_age)
            .unwrap_or(false);
        if too_old {
            info!("Run lock {} was taken at {}", path.display(), taken_at.to_rfc3339());
            return true;
        }
    }

    match owner.pid {
        Some(pid) if !process_alive(pid) => {
            info!("Run lock {} belongs to exited process {}", path.display(), pid);
            true
        }
        _ => false,
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to release run lock {}: {}", self.path.display(), e);
        }
    }
}

/// Working-copy tracker as it was before the job ran.
enum Snapshot {
    Absent,
    Present(Vec<u8>),
}

impl Snapshot {
    fn take(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Snapshot::Present(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::Absent),
            Err(e) => Err(e.into()),
        }
    }

    fn put_back(self, path: &Path) -> Result<()> {
        match self {
            Snapshot::Present(bytes) => std::fs::write(path, bytes)?,
            Snapshot::Absent => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }
}

pub async fn run_with_cache(
    store: &FsCacheStore,
    key: &CacheKey,
    tracker_path: &Path,
    job: &dyn PostJob,
) -> Result<RunReport> {
    let _lock = RunLock::acquire(store.root())?;

    let restored_from = store.restore(key, tracker_path)?;
    let snapshot = Snapshot::take(tracker_path)?;

    let outcome = match job.run(tracker_path).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Job failed, tracker will not be saved: {}", e);
            if let Err(rollback) = snapshot.put_back(tracker_path) {
                warn!("Failed to roll back tracker {}: {}", tracker_path.display(), rollback);
            }
            return Err(e);
        }
    };

    if tracker_path.exists() {
        store.save(key, tracker_path)?;
    } else {
        info!("No tracker written this run; nothing to save");
    }

    Ok(RunReport {
        restored_from,
        outcome,
        saved_key: key.key.clone(),
    })
}
