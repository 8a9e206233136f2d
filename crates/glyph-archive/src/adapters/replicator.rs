//! Remote replication adapters.
//!
//! Neither variant transfers bytes. `send_file` reports `false` and the
//! ingestion carries on regardless.

use std::path::Path;

use crate::ports::outbound::RemoteReplicator;

/// `storage.use_remote = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledReplicator;

impl RemoteReplicator for DisabledReplicator {
    fn send_file(&self, path: &Path) -> bool {
        tracing::debug!(path = %path.display(), "remote replication disabled; skipping");
        false
    }
}

/// `storage.use_remote = true`, with no transport behind it yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingReplicator;

impl RemoteReplicator for PendingReplicator {
    fn send_file(&self, path: &Path) -> bool {
        tracing::warn!(
            path = %path.display(),
            "remote replication requested but no transport is implemented"
        );
        false
    }
}

/// Replicator matching the `use_remote` switch.
pub fn replicator_for(use_remote: bool) -> Box<dyn RemoteReplicator> {
    if use_remote {
        Box::new(PendingReplicator)
    } else {
        Box::new(DisabledReplicator)
    }
}

impl<R: RemoteReplicator + ?Sized> RemoteReplicator for Box<R> {
    fn send_file(&self, path: &Path) -> bool {
        (**self).send_file(path)
    }
}
