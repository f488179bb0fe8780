// crates/requiem-ledger/src/policy.rs
// ============================================================================
// Module: Policy Snapshot
// Description: Reads the active policy file and digests it for replay.
// Purpose: Implement spec §4.9's policy-capture step as the concrete
//          `PolicySnapshotSource` the invocation gate reads.
// Dependencies: requiem_core::hashing, requiem_registry::gate, std::fs
// ============================================================================

//! ## Overview
//! [`FilePolicySnapshotSource`] reads the first existing file on an ordered
//! lookup list and hashes its raw bytes; if none exist, it returns
//! [`requiem_core::hashing::no_policy_sentinel`]. The hash is recomputed on
//! every call rather than cached, so an operator editing the policy file
//! between invocations is observed on the very next call.

use std::path::Path;
use std::path::PathBuf;

use requiem_core::hashing::hash_bytes;
use requiem_core::hashing::no_policy_sentinel;
use requiem_registry::gate::PolicySnapshotSource;

/// Default, ordered lookup list.
const DEFAULT_POLICY_LOOKUP_PATHS: &[&str] = &["./policy/default.policy.json", "./policy.json"];

/// Reads the active policy file from an ordered lookup list.
#[derive(Debug, Clone)]
pub struct FilePolicySnapshotSource {
    lookup_paths: Vec<PathBuf>,
}

impl Default for FilePolicySnapshotSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FilePolicySnapshotSource {
    /// Creates a source reading [`DEFAULT_POLICY_LOOKUP_PATHS`].
    #[must_use]
    pub fn new() -> Self {
        Self { lookup_paths: DEFAULT_POLICY_LOOKUP_PATHS.iter().map(PathBuf::from).collect() }
    }

    /// Creates a source reading a caller-supplied lookup list, first match
    /// wins. Used by tests to avoid depending on the process's actual
    /// working directory.
    #[must_use]
    pub fn with_lookup_paths(lookup_paths: Vec<PathBuf>) -> Self {
        Self { lookup_paths }
    }

    /// Returns the first path in the lookup list that exists, if any.
    #[must_use]
    pub fn active_path(&self) -> Option<&Path> {
        self.lookup_paths.iter().find(|path| path.is_file()).map(PathBuf::as_path)
    }
}

impl PolicySnapshotSource for FilePolicySnapshotSource {
    fn policy_snapshot_hash(&self) -> String {
        for path in &self.lookup_paths {
            if let Ok(bytes) = std::fs::read(path) {
                return hash_bytes(&bytes);
            }
        }
        no_policy_sentinel()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;
    use std::time::UNIX_EPOCH;

    use super::FilePolicySnapshotSource;
    use requiem_core::hashing::hash_bytes;
    use requiem_core::hashing::no_policy_sentinel;

    #[test]
    fn missing_policy_files_return_sentinel() {
        let source = FilePolicySnapshotSource::with_lookup_paths(vec![
            "/nonexistent/requiem-ledger-test/a.json".into(),
            "/nonexistent/requiem-ledger-test/b.json".into(),
        ]);
        assert_eq!(source.policy_snapshot_hash(), no_policy_sentinel());
        assert!(source.active_path().is_none());
    }

    #[test]
    fn first_existing_file_on_the_list_wins() {
        let nonce = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
        let path = std::env::temp_dir().join(format!("requiem-ledger-policy-test-{nonce}.json"));
        std::fs::write(&path, b"{\"rule\":\"deny-all\"}").expect("write temp policy file");

        let source = FilePolicySnapshotSource::with_lookup_paths(vec![
            "/nonexistent/requiem-ledger-test/missing.json".into(),
            path.clone(),
        ]);
        let expected = hash_bytes(b"{\"rule\":\"deny-all\"}");
        assert_eq!(source.policy_snapshot_hash(), expected);
        assert_eq!(source.active_path(), Some(path.as_path()));

        std::fs::remove_file(&path).expect("cleanup temp policy file");
    }
}
