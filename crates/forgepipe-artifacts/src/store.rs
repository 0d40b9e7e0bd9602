//! The Artifact Store: `put`/`get`/`exists`/`list`, with atomic single-artifact
//! writes (stage to a sibling `.partial` path, then rename into place) and
//! canonical-JSON serialization so two writers producing logically identical
//! JSON hash identically.

use camino::Utf8PathBuf;
use forgepipe_core::artifact::{ArtifactCategory, ArtifactRef};
use forgepipe_core::ids::BuildId;
use forgepipe_core::stage::StageKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::ArtifactError;

/// Filesystem-backed artifact store rooted at `/<work_root>/<build_id>/{specs,docs,code}/*`.
///
/// Per-artifact writes are serialized through an in-process lock keyed by
/// `(build_id, name)` so two concurrent writers for the *same* artifact never
/// race on the stage-then-rename sequence; writes to different artifacts
/// proceed fully concurrently.
pub struct ArtifactStore {
    work_root: Utf8PathBuf,
    write_locks: Mutex<HashMap<(BuildId, String), Arc<Mutex<()>>>>,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(work_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            work_root: work_root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn build_dir(&self, build_id: BuildId) -> Utf8PathBuf {
        self.work_root.join(build_id.to_string())
    }

    fn artifact_path(&self, build_id: BuildId, name: &str) -> Utf8PathBuf {
        let category = ArtifactCategory::classify(name);
        self.build_dir(build_id).join(category.dir_name()).join(name)
    }

    /// Write `bytes` as the artifact `name` for `build_id`, returning a
    /// pointer with its content hash. Produced by stage `produced_by`.
    pub async fn put(
        &self,
        build_id: BuildId,
        name: &str,
        produced_by: StageKey,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactError> {
        // Serialize access to this single artifact's stage-then-rename
        // sequence; unrelated artifacts are untouched by this lock.
        let _guard = self.acquire(build_id, name).await;

        let final_path = self.artifact_path(build_id, name);
        let partial_path = final_path.with_extension(format!(
            "{}.partial",
            final_path.extension().unwrap_or("")
        ));

        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ArtifactError::Write {
                    build_id: build_id.to_string(),
                    name: name.to_string(),
                    source,
                })?;
        }

        let content_hash = blake3::hash(&bytes).to_hex().to_string();
        let byte_len = bytes.len() as u64;

        tokio::fs::write(&partial_path, &bytes)
            .await
            .map_err(|source| ArtifactError::Write {
                build_id: build_id.to_string(),
                name: name.to_string(),
                source,
            })?;

        tokio::fs::rename(&partial_path, &final_path)
            .await
            .map_err(|source| ArtifactError::Write {
                build_id: build_id.to_string(),
                name: name.to_string(),
                source,
            })?;

        tracing::debug!(
            target: "forgepipe::artifacts",
            build_id = %build_id,
            name,
            stage = %produced_by,
            byte_len,
            "artifact written"
        );

        Ok(ArtifactRef {
            name: name.to_string(),
            category: ArtifactCategory::classify(name),
            produced_by_stage: produced_by,
            content_hash,
            byte_len,
        })
    }

    /// Convenience wrapper that serializes `value` with canonical JSON key
    /// ordering before writing, so two logically-identical artifacts hash
    /// identically regardless of field insertion order upstream.
    pub async fn put_json(
        &self,
        build_id: BuildId,
        name: &str,
        produced_by: StageKey,
        value: &serde_json::Value,
    ) -> Result<ArtifactRef, ArtifactError> {
        let canonical =
            serde_json_canonicalizer::to_vec(value).map_err(|source| ArtifactError::Serialize {
                build_id: build_id.to_string(),
                name: name.to_string(),
                source: serde_json::Error::io(std::io::Error::other(source.to_string())),
            })?;
        self.put(build_id, name, produced_by, canonical).await
    }

    pub async fn get(&self, build_id: BuildId, name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.artifact_path(build_id, name);
        tokio::fs::read(&path)
            .await
            .map_err(|_| ArtifactError::Missing {
                build_id: build_id.to_string(),
                name: name.to_string(),
            })
    }

    pub async fn exists(&self, build_id: BuildId, name: &str) -> bool {
        tokio::fs::metadata(self.artifact_path(build_id, name))
            .await
            .is_ok()
    }

    pub async fn list(&self, build_id: BuildId) -> Vec<String> {
        let mut out = Vec::new();
        for category in [ArtifactCategory::Specs, ArtifactCategory::Docs, ArtifactCategory::Code] {
            let dir = self.build_dir(build_id).join(category.dir_name());
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Some(name) = entry.file_name().to_str() {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    async fn acquire(&self, build_id: BuildId, name: &str) -> OwnedMutexGuard<()> {
        let key_lock = {
            let mut locks = self.write_locks.lock().await;
            locks
                .entry((build_id, name.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        key_lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (ArtifactStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (ArtifactStore::new(root), dir)
    }

    #[tokio::test]
    async fn put_then_get_roundtrips_bytes() {
        let (store, _dir) = store();
        let build_id = BuildId::new();
        let reference = store
            .put(build_id, "docs.md", StageKey::whole(2), b"# hello".to_vec())
            .await
            .unwrap();
        assert_eq!(reference.category, ArtifactCategory::Docs);

        let bytes = store.get(build_id, "docs.md").await.unwrap();
        assert_eq!(bytes, b"# hello");
    }

    #[tokio::test]
    async fn get_on_missing_artifact_is_a_distinct_error() {
        let (store, _dir) = store();
        let build_id = BuildId::new();
        let err = store.get(build_id, "nope.json").await.unwrap_err();
        assert!(matches!(err, ArtifactError::Missing { .. }));
    }

    #[tokio::test]
    async fn list_reflects_all_written_categories() {
        let (store, _dir) = store();
        let build_id = BuildId::new();
        store
            .put(build_id, "specs.json", StageKey::whole(1), b"{}".to_vec())
            .await
            .unwrap();
        store
            .put(build_id, "docs.md", StageKey::whole(2), b"#".to_vec())
            .await
            .unwrap();
        store
            .put(build_id, "main.rs", StageKey::whole(6), b"fn main() {}".to_vec())
            .await
            .unwrap();

        let mut names = store.list(build_id).await;
        names.sort();
        assert_eq!(names, vec!["docs.md", "main.rs", "specs.json"]);
    }

    #[tokio::test]
    async fn identical_json_values_produce_identical_hashes_regardless_of_key_order() {
        let (store, _dir) = store();
        let build_id = BuildId::new();
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});

        let ref_a = store
            .put_json(build_id, "specs_a.json", StageKey::whole(1), &a)
            .await
            .unwrap();
        let ref_b = store
            .put_json(build_id, "specs_b.json", StageKey::whole(1), &b)
            .await
            .unwrap();

        assert_eq!(ref_a.content_hash, ref_b.content_hash);
    }
}
