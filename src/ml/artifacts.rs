//! Persisted model artifacts.
//!
//! A trained model lives on disk as three blobs: the vectorizer, the
//! classifier weights and the label encoder. Each blob is a bincode
//! [`Envelope`] carrying its kind, the id of the pair it belongs to and a
//! CRC32 of the payload, so a truncated, corrupt or mismatched file is
//! reported as [`AugurError::ArtifactLoad`] instead of being half-used.
//!
//! [`ArtifactSet`] serializes writers: in-process through a `RwLock` shared
//! by every set naming the same model file, across processes through a
//! `<model>.lock` file.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};
use crate::ml::classifier::IntentClassifier;
use crate::ml::features::FeatureEngineer;
use crate::util::fs::{ensure_parent, registered, write_atomic};

static SET_GUARDS: LazyLock<Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>> =
    LazyLock::new(Default::default);

/// What an artifact blob contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Vectorizer,
    Model,
    LabelEncoder,
}

/// On-disk wrapper around every artifact payload.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kind: ArtifactKind,
    pair_id: String,
    checksum: u32,
    payload: Vec<u8>,
}

/// Encode `value` as an artifact blob.
pub fn encode<T: Serialize>(kind: ArtifactKind, pair_id: &str, value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    let envelope = Envelope {
        kind,
        pair_id: pair_id.to_string(),
        checksum: crc32fast::hash(&payload),
        payload,
    };
    Ok(bincode::serialize(&envelope)?)
}

/// Decode an artifact blob read from `path`, returning its pair id and value.
pub fn decode<T: DeserializeOwned>(
    path: &Path,
    bytes: &[u8],
    expected: ArtifactKind,
) -> Result<(String, T)> {
    let envelope: Envelope = bincode::deserialize(bytes)
        .map_err(|e| AugurError::artifact_load(path, format!("unreadable envelope: {e}")))?;
    if envelope.kind != expected {
        return Err(AugurError::artifact_load(
            path,
            format!("expected {expected:?} artifact, found {:?}", envelope.kind),
        ));
    }
    if crc32fast::hash(&envelope.payload) != envelope.checksum {
        return Err(AugurError::artifact_load(path, "checksum mismatch"));
    }
    let value = bincode::deserialize(&envelope.payload)
        .map_err(|e| AugurError::artifact_load(path, format!("corrupt payload: {e}")))?;
    Ok((envelope.pair_id, value))
}

/// Encode and atomically write an artifact.
pub fn write_artifact<T: Serialize>(
    path: &Path,
    kind: ArtifactKind,
    pair_id: &str,
    value: &T,
) -> Result<()> {
    let bytes = encode(kind, pair_id, value)?;
    write_atomic(path, &bytes).map_err(|e| {
        AugurError::serialization(format!("cannot write {}: {e}", path.display()))
    })
}

/// Read and decode an artifact.
pub fn read_artifact<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<(String, T)> {
    let bytes = fs::read(path).map_err(|e| AugurError::artifact_load(path, e.to_string()))?;
    decode(path, &bytes, kind)
}

/// Locations of the three artifact blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub vectorizer: PathBuf,
    pub label_encoder: PathBuf,
}

impl ArtifactPaths {
    /// Default file names inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join("intent_model.bin"),
            vectorizer: dir.join("vectorizer.bin"),
            label_encoder: dir.join("label_encoder.bin"),
        }
    }

    /// Whether all three blobs are present.
    pub fn exist(&self) -> bool {
        self.model.exists() && self.vectorizer.exists() && self.label_encoder.exists()
    }

    /// Cross-process lock file guarding the set.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .model
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.model.with_file_name(name)
    }
}

/// A shared handle to one artifact set.
///
/// Every handle naming the same model file shares one lock, so trainers,
/// retrainers and predictors in a process never observe each other's
/// partial writes.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    paths: ArtifactPaths,
    guard: Arc<RwLock<()>>,
}

impl ArtifactSet {
    pub fn new(paths: ArtifactPaths) -> Self {
        let guard = registered(&SET_GUARDS, &paths.model);
        Self { paths, guard }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn exist(&self) -> bool {
        self.paths.exist()
    }

    /// Shared access for loaders.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.guard.read()
    }

    /// Exclusive access for publishers.
    ///
    /// Waits for other holders in this process. Fails with
    /// [`AugurError::LockFailed`] when the lock file exists, either because
    /// another process is writing or because a writer died without
    /// removing it.
    pub fn lock_exclusive(&self) -> Result<ArtifactWriteGuard<'_>> {
        let guard = self.guard.write();
        let lock_path = self.paths.lock_path();
        ensure_parent(&lock_path)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    let holder = fs::read_to_string(&lock_path).unwrap_or_default();
                    AugurError::lock_failed(format!(
                        "{} is held by process '{}'; if that process is no longer running, delete the file and retry",
                        lock_path.display(),
                        holder.trim()
                    ))
                } else {
                    AugurError::Io(e)
                }
            })?;
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            log::warn!("Could not record owner in {}: {e}", lock_path.display());
        }
        Ok(ArtifactWriteGuard {
            _guard: guard,
            paths: &self.paths,
            lock_path,
        })
    }

    /// Load the vectorizer and classifier pair, checking they belong together.
    pub fn load(&self) -> Result<(FeatureEngineer, IntentClassifier)> {
        let _read = self.read();
        load_pair(&self.paths)
    }
}

fn load_pair(paths: &ArtifactPaths) -> Result<(FeatureEngineer, IntentClassifier)> {
    let features = FeatureEngineer::from_artifact(&paths.vectorizer)?;
    let classifier = IntentClassifier::from_artifacts(&paths.model, &paths.label_encoder)?;
    check_pair(&features, &classifier, paths)?;
    log::info!(
        "Loaded artifacts {} / {} / {}",
        paths.model.display(),
        paths.vectorizer.display(),
        paths.label_encoder.display()
    );
    Ok((features, classifier))
}

/// Verify the classifier was trained on vectors from this vectorizer.
pub fn check_pair(
    features: &FeatureEngineer,
    classifier: &IntentClassifier,
    paths: &ArtifactPaths,
) -> Result<()> {
    if let (Some(bound), Some(fingerprint)) =
        (classifier.vectorizer_fingerprint(), features.fingerprint())
    {
        if bound != fingerprint {
            return Err(AugurError::artifact_load(
                &paths.vectorizer,
                "vectorizer does not match the classifier it is paired with",
            ));
        }
    }
    if classifier.n_features() != features.vector_dimensions() {
        return Err(AugurError::artifact_load(
            &paths.vectorizer,
            format!(
                "vectorizer produces {} features, classifier expects {}",
                features.vector_dimensions(),
                classifier.n_features()
            ),
        ));
    }
    Ok(())
}

/// Holds the artifact set exclusively until dropped.
pub struct ArtifactWriteGuard<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
    paths: &'a ArtifactPaths,
    lock_path: PathBuf,
}

impl ArtifactWriteGuard<'_> {
    pub fn paths(&self) -> &ArtifactPaths {
        self.paths
    }

    /// Load the pair through the held lock.
    pub fn load(&self) -> Result<(FeatureEngineer, IntentClassifier)> {
        load_pair(self.paths)
    }
}

impl Drop for ArtifactWriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            log::warn!("Failed to remove lock file {}: {e}", self.lock_path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_envelope_rejects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        write_artifact(&path, ArtifactKind::Model, "pair-1", &vec![1.5f64, 2.5]).unwrap();

        let (pair, value): (String, Vec<f64>) = read_artifact(&path, ArtifactKind::Model).unwrap();
        assert_eq!(pair, "pair-1");
        assert_eq!(value, vec![1.5, 2.5]);

        let wrong: Result<(String, Vec<f64>)> = read_artifact(&path, ArtifactKind::Vectorizer);
        assert!(wrong.unwrap_err().is_artifact_load());

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        let corrupt: Result<(String, Vec<f64>)> = read_artifact(&path, ArtifactKind::Model);
        assert!(corrupt.unwrap_err().is_artifact_load());

        fs::write(&path, &bytes[..4]).unwrap();
        let truncated: Result<(String, Vec<f64>)> = read_artifact(&path, ArtifactKind::Model);
        assert!(truncated.unwrap_err().is_artifact_load());
    }

    #[test]
    fn test_missing_artifact_is_load_failure() {
        let dir = TempDir::new().unwrap();
        let missing: Result<(String, u32)> =
            read_artifact(&dir.path().join("nope.bin"), ArtifactKind::Model);
        assert!(missing.unwrap_err().is_artifact_load());
    }

    #[test]
    fn test_exclusive_lock_file() {
        let dir = TempDir::new().unwrap();
        let set = ArtifactSet::new(ArtifactPaths::in_dir(dir.path().join("models")));
        let lock_path = set.paths().lock_path();

        {
            let guard = set.lock_exclusive().unwrap();
            assert!(lock_path.exists());
            assert_eq!(
                fs::read_to_string(&lock_path).unwrap().trim(),
                std::process::id().to_string()
            );
            assert_eq!(guard.paths(), set.paths());
        }
        assert!(!lock_path.exists());
        assert!(set.lock_exclusive().is_ok());
    }

    #[test]
    fn test_leftover_lock_file_names_itself() {
        let dir = TempDir::new().unwrap();
        let set = ArtifactSet::new(ArtifactPaths::in_dir(dir.path().join("models")));
        let lock_path = set.paths().lock_path();
        fs::create_dir_all(lock_path.parent().unwrap()).unwrap();
        fs::write(&lock_path, "4242\n").unwrap();

        match set.lock_exclusive() {
            Err(AugurError::LockFailed(msg)) => {
                assert!(msg.contains(&lock_path.display().to_string()));
                assert!(msg.contains("4242"));
                assert!(msg.contains("delete the file"));
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("lock acquired over a leftover lock file"),
        }
        assert!(lock_path.exists());

        fs::remove_file(&lock_path).unwrap();
        assert!(set.lock_exclusive().is_ok());
    }

    #[test]
    fn test_sets_on_same_files_wait_for_each_other() {
        let dir = TempDir::new().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path().join("models"));
        let first = ArtifactSet::new(paths.clone());
        let second = ArtifactSet::new(paths);
        let order = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            let guard = first.lock_exclusive().unwrap();
            let waiter = scope.spawn(|| {
                let _guard = second.lock_exclusive().unwrap();
                order.lock().push("second");
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            order.lock().push("first");
            drop(guard);
            waiter.join().unwrap();
        });

        assert_eq!(*order.lock(), vec!["first", "second"]);
    }
}
