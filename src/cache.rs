//! The last known document and how diff notifications move it forward.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::diff::{DiffSummary, extract_diff};
use crate::error::CibResult;
use crate::session::{ClusterSession, QueryRequest};
use crate::types::Document;

/// Holds the current document of one session.
///
/// The document is replaced as a whole: readers hold an `Arc` to a complete
/// revision and never see a patch half applied.
pub struct DocumentCache {
    session: Arc<dyn ClusterSession>,
    config: ClientConfig,
    current: RwLock<Option<Arc<Document>>>,
}

impl std::fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("client", &self.config.client_name)
            .field("version", &self.current().map(|doc| doc.version()))
            .finish()
    }
}

impl DocumentCache {
    pub fn new(session: Arc<dyn ClusterSession>, config: ClientConfig) -> Self {
        Self {
            session,
            config,
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Option<Arc<Document>> {
        self.current.read().clone()
    }

    /// Full query, decode and store. On failure the cached document, if any,
    /// is left as it was.
    pub fn initialize(&self) -> CibResult<Arc<Document>> {
        let request = QueryRequest::full().with_scope_local(self.config.scope_local);
        let raw = self.session.query(&request)?;
        let document = Arc::new(Document::from_shared(Arc::from(raw), &self.config.decode)?);
        info!(
            event = "Cache",
            phase = "Initialize",
            client = self.config.client_name,
            version = %document.version()
        );
        Ok(self.store(document))
    }

    /// Bring the cache up to date with a diff notification and return the new
    /// document.
    ///
    /// Without a cached base, or when the diff cannot be applied to it, the
    /// document is fetched again in full.
    pub fn on_notification(&self, envelope: &str) -> CibResult<Arc<Document>> {
        let diff = match extract_diff(envelope) {
            Ok(diff) => diff,
            Err(err) => {
                warn!(event = "Cache", phase = "Notification", error = %err, "unreadable notification, re-querying");
                return self.initialize();
            }
        };

        let Some(base) = self.current() else {
            debug!(event = "Cache", phase = "Notification", "no cached document, querying");
            return self.initialize();
        };

        match self.patch(&base, &diff) {
            Ok(document) => Ok(self.store(document)),
            Err(err) => {
                warn!(
                    event = "Cache",
                    phase = "Patch",
                    base = %base.version(),
                    error = %err,
                    "diff rejected, re-querying"
                );
                self.initialize()
            }
        }
    }

    fn patch(&self, base: &Document, diff: &str) -> CibResult<Arc<Document>> {
        if let Ok(summary) = DiffSummary::decode(diff) {
            debug!(
                event = "Cache",
                phase = "Patch",
                base = %base.version(),
                source = ?summary.source,
                target = ?summary.target,
                changes = summary.changes
            );
        }
        let patched = self.session.apply_patch(base.raw(), diff)?;
        let document = Document::from_shared(Arc::from(patched), &self.config.decode)?;
        Ok(Arc::new(document))
    }

    /// Replace the cached document unless the cache already holds a newer
    /// revision. Returns whichever document is current afterwards.
    fn store(&self, document: Arc<Document>) -> Arc<Document> {
        let mut current = self.current.write();
        if let Some(existing) = current.as_ref()
            && existing.version() > document.version()
        {
            debug!(
                event = "Cache",
                phase = "Store",
                cached = %existing.version(),
                offered = %document.version(),
                "keeping newer cached document"
            );
            return existing.clone();
        }
        *current = Some(document.clone());
        document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CibError;
    use crate::session::MemorySession;
    use crate::tests::{EnvelopeRecorder, capture_logs, revision};
    use crate::types::CibVersion;

    fn setup() -> (Arc<MemorySession>, Arc<EnvelopeRecorder>, DocumentCache) {
        let session = Arc::new(MemorySession::new(revision(0, &[])).unwrap());
        let recorder = EnvelopeRecorder::register(&session);
        let cache = DocumentCache::new(session.clone(), ClientConfig::default());
        (session, recorder, cache)
    }

    #[test]
    fn test_initialize() {
        let (_session, _recorder, cache) = setup();
        assert!(cache.current().is_none());

        let doc = cache.initialize().unwrap();
        assert_eq!(doc.version(), CibVersion::new(0, 1, 0));
        assert!(Arc::ptr_eq(&doc, &cache.current().unwrap()));
    }

    #[test]
    fn test_initialize_failure_keeps_document() {
        let (session, _recorder, cache) = setup();
        let before = cache.initialize().unwrap();

        session.set_connected(false);
        assert_eq!(cache.initialize().unwrap_err(), CibError::not_connected_rc());
        assert!(Arc::ptr_eq(&before, &cache.current().unwrap()));
    }

    #[test]
    fn test_diff_applies_without_query() {
        let (session, recorder, cache) = setup();
        cache.initialize().unwrap();
        session.push_update(revision(1, &["n1"])).unwrap();

        let envelopes = recorder.drain(&session);
        let doc = cache.on_notification(&envelopes[0]).unwrap();
        assert_eq!(doc.version(), CibVersion::new(0, 1, 1));
        assert!(doc.node_state("n1").unwrap().is_member());
        assert_eq!(session.query_count(), 1);
    }

    #[test]
    fn test_notification_without_base_queries() {
        let (session, recorder, cache) = setup();
        session.push_update(revision(1, &["n1"])).unwrap();

        let envelopes = recorder.drain(&session);
        let doc = cache.on_notification(&envelopes[0]).unwrap();
        assert_eq!(doc.version(), CibVersion::new(0, 1, 1));
        assert_eq!(session.query_count(), 1);
    }

    #[test]
    fn test_rejected_diff_requeries() {
        let (session, recorder, cache) = setup();
        cache.initialize().unwrap();
        session.push_update(revision(1, &["n1"])).unwrap();
        session.drop_pending();
        session.push_update(revision(2, &["n1", "n2"])).unwrap();

        let envelopes = recorder.drain(&session);
        let (doc, logs) = capture_logs(|| cache.on_notification(&envelopes[0]));
        let doc = doc.unwrap();
        assert_eq!(doc.version(), CibVersion::new(0, 1, 2));
        assert_eq!(session.query_count(), 2);
        assert!(logs.contains("diff rejected"), "logs: {logs}");
    }

    #[test]
    fn test_rejected_diff_keeps_document_when_requery_fails() {
        let (session, recorder, cache) = setup();
        let before = cache.initialize().unwrap();
        session.push_update(revision(1, &["n1"])).unwrap();
        session.drop_pending();
        session.push_update(revision(2, &["n1", "n2"])).unwrap();
        session.set_connected(false);

        let envelopes = recorder.drain(&session);
        assert!(cache.on_notification(&envelopes[0]).is_err());
        assert!(Arc::ptr_eq(&before, &cache.current().unwrap()));
    }

    #[test]
    fn test_older_document_never_replaces_newer() {
        let (session, _recorder, cache) = setup();
        session.push_update(revision(2, &["n1", "n2"])).unwrap();
        let newer = cache.initialize().unwrap();
        assert_eq!(newer.version(), CibVersion::new(0, 1, 2));

        let stale = Arc::new(Document::decode(&revision(1, &["n1"])).unwrap());
        let (kept, logs) = capture_logs(|| cache.store(stale));
        assert!(Arc::ptr_eq(&kept, &newer));
        assert!(Arc::ptr_eq(&newer, &cache.current().unwrap()));
        assert!(logs.contains("keeping newer cached document"), "logs: {logs}");

        let same = Arc::new(Document::decode(&revision(2, &["n1", "n2"])).unwrap());
        assert!(Arc::ptr_eq(&cache.store(same.clone()), &same));
    }

    #[test]
    fn test_late_envelope_does_not_roll_back() {
        let (session, recorder, cache) = setup();
        session.push_update(revision(1, &["n1"])).unwrap();
        session.push_update(revision(2, &["n1", "n2"])).unwrap();
        let newer = cache.initialize().unwrap();

        // Both envelopes were queued before the query and arrive after it.
        for envelope in recorder.drain(&session) {
            let doc = cache.on_notification(&envelope).unwrap();
            assert!(doc.version() >= newer.version());
        }
        assert_eq!(cache.current().unwrap().version(), CibVersion::new(0, 1, 2));
    }

    #[test]
    fn test_unreadable_notification_requeries() {
        let (session, _recorder, cache) = setup();
        cache.initialize().unwrap();
        let doc = cache.on_notification("<notify/>").unwrap();
        assert_eq!(doc.version(), CibVersion::new(0, 1, 0));
        assert_eq!(session.query_count(), 2);
    }
}
