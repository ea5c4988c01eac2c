use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use itertools::Itertools;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use super::xpath::XPath;
use super::{ClusterSession, NotificationHandler, QueryRequest, RegistrationId, SessionProvider};
use crate::config::{ClientConfig, ConnectionOptions};
use crate::decode::{XmlStream, root_version};
use crate::diff::DiffSummary;
use crate::error::{CibError, CibResult};
use crate::types::CibVersion;

const SHADOW_DIR_ENV: &str = "CIB_shadow_dir";
const DEFAULT_SHADOW_DIR: &str = "/var/lib/pacemaker/cib";

enum Event {
    Diff(String),
    Destroy,
}

/// An event together with the handlers registered when it was raised.
struct Pending {
    event: Event,
    handlers: Vec<Arc<dyn NotificationHandler>>,
}

struct SessionState {
    current: String,
    version: CibVersion,
    revisions: HashMap<CibVersion, String>,
    handlers: BTreeMap<RegistrationId, Arc<dyn NotificationHandler>>,
    pending: VecDeque<Pending>,
    queries: usize,
    destroyed: bool,
    closed: bool,
}

impl SessionState {
    fn raise(&mut self, event: Event) {
        let handlers = self.handlers.values().cloned().collect();
        self.pending.push_back(Pending { event, handlers });
    }

    fn finished(&self) -> bool {
        self.closed || self.destroyed
    }
}

/// A CIB held in memory.
///
/// Every revision pushed through [`MemorySession::push_update`] is recorded by
/// version, so a diff between two known revisions can be applied exactly as
/// the cluster would. Events are queued and delivered either by
/// [`ClusterSession::run_event_loop`] or by [`MemorySession::dispatch_pending`].
pub struct MemorySession {
    state: Mutex<SessionState>,
    wakeup: Condvar,
    connected: AtomicBool,
    next_registration: AtomicU64,
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemorySession")
            .field("version", &state.version)
            .field("revisions", &state.revisions.len())
            .field("handlers", &state.handlers.len())
            .field("pending", &state.pending.len())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl MemorySession {
    /// Start from a full `cib` document. Its version must be readable.
    pub fn new(xml: impl Into<String>) -> CibResult<Self> {
        let current = xml.into();
        let version = root_version(&current)?;
        let revisions = HashMap::from([(version, current.clone())]);
        Ok(Self {
            state: Mutex::new(SessionState {
                current,
                version,
                revisions,
                handlers: BTreeMap::new(),
                pending: VecDeque::new(),
                queries: 0,
                destroyed: false,
                closed: false,
            }),
            wakeup: Condvar::new(),
            connected: AtomicBool::new(true),
            next_registration: AtomicU64::new(1),
        })
    }

    pub fn version(&self) -> CibVersion {
        self.state.lock().version
    }

    /// Replace the document with a new revision and raise the diff
    /// notification the cluster would send for it.
    pub fn push_update(&self, xml: impl Into<String>) -> CibResult<CibVersion> {
        let xml = xml.into();
        let target = root_version(&xml)?;
        let mut state = self.state.lock();
        let source = state.version;
        state.revisions.insert(target, xml.clone());
        state.current = xml;
        state.version = target;
        state.raise(Event::Diff(notification(source, target)));
        debug!(event = "Session", phase = "Update", %source, %target);
        self.wakeup.notify_all();
        Ok(target)
    }

    /// Queue a notification envelope as given.
    pub fn push_envelope(&self, envelope: impl Into<String>) {
        let mut state = self.state.lock();
        state.raise(Event::Diff(envelope.into()));
        self.wakeup.notify_all();
    }

    /// Discard queued events, as if the notifications were lost in transit.
    pub fn drop_pending(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }

    /// Tear the session down from the cluster side. Registered handlers
    /// receive `on_destroy` and are then forgotten.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }
        state.raise(Event::Destroy);
        state.handlers.clear();
        state.destroyed = true;
        self.wakeup.notify_all();
    }

    /// Toggle connectivity without raising events. Queries fail while
    /// disconnected.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Deliver every queued event on the calling thread. Returns how many were
    /// delivered.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            let Some(pending) = self.state.lock().pending.pop_front() else {
                break;
            };
            for handler in &pending.handlers {
                match &pending.event {
                    Event::Diff(envelope) => handler.on_diff(envelope),
                    Event::Destroy => handler.on_destroy(),
                }
            }
            delivered += 1;
        }
        delivered
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of queries answered so far.
    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().handlers.len()
    }
}

impl ClusterSession for MemorySession {
    fn query(&self, request: &QueryRequest) -> CibResult<String> {
        if !self.is_connected() {
            return Err(CibError::not_connected_rc());
        }
        let mut state = self.state.lock();
        state.queries += 1;

        let Some(path) = request.xpath.as_deref() else {
            if !request.no_children {
                return Ok(state.current.clone());
            }
            let mut stream = XmlStream::new(&state.current);
            let root = stream.root()?;
            return Ok(stream.self_closed(&root));
        };

        let mut found = XPath::parse(path)?.select(&state.current, request.no_children)?;
        debug!(event = "Session", phase = "Query", xpath = path, matches = found.len());
        match found.len() {
            0 => Err(CibError::no_such_object()),
            1 => Ok(found.remove(0)),
            _ => Ok(format!("<xpath-query>{}</xpath-query>", found.iter().join(""))),
        }
    }

    fn register_notifications(&self, handler: Arc<dyn NotificationHandler>) -> CibResult<RegistrationId> {
        if !self.is_connected() {
            return Err(CibError::not_connected_rc());
        }
        let id = RegistrationId(self.next_registration.fetch_add(1, Ordering::SeqCst));
        self.state.lock().handlers.insert(id, handler);
        debug!(event = "Session", phase = "Register", registration = %id);
        Ok(id)
    }

    fn unregister(&self, registration: RegistrationId) -> CibResult<()> {
        let removed = self.state.lock().handlers.remove(&registration).is_some();
        debug!(event = "Session", phase = "Unregister", %registration, removed);
        Ok(())
    }

    fn apply_patch(&self, base: &str, diff: &str) -> CibResult<String> {
        let base_version = root_version(base)?;
        let summary = DiffSummary::decode(diff)?;
        if !summary.applies_to(base_version) {
            debug!(
                event = "Session",
                phase = "Patch",
                base = %base_version,
                source = ?summary.source,
                "diff does not apply to base"
            );
            return Err(CibError::diff_failed());
        }
        let target = summary
            .target
            .ok_or_else(|| CibError::Patch("diff carries no target version".to_string()))?;
        self.state
            .lock()
            .revisions
            .get(&target)
            .cloned()
            .ok_or_else(|| CibError::Patch(format!("no revision {target} to patch to")))
    }

    fn run_event_loop(&self) -> CibResult<()> {
        loop {
            {
                let mut state = self.state.lock();
                while state.pending.is_empty() && !state.finished() {
                    self.wakeup.wait(&mut state);
                }
                if state.pending.is_empty() {
                    break;
                }
            }
            self.dispatch_pending();
        }
        debug!(event = "Session", phase = "EventLoop", "event loop finished");
        Ok(())
    }

    fn close(&self) -> CibResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        state.handlers.clear();
        self.wakeup.notify_all();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Opens `File` and `Shadow` connections by loading the document into a
/// [`MemorySession`].
#[derive(Debug, Clone)]
pub struct FileSessionProvider {
    shadow_dir: PathBuf,
}

impl Default for FileSessionProvider {
    fn default() -> Self {
        let shadow_dir = std::env::var_os(SHADOW_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHADOW_DIR));
        Self { shadow_dir }
    }
}

impl FileSessionProvider {
    pub fn new(shadow_dir: impl Into<PathBuf>) -> Self {
        Self {
            shadow_dir: shadow_dir.into(),
        }
    }

    /// Where a shadow copy named `name` is stored.
    pub fn shadow_path(&self, name: &str) -> PathBuf {
        self.shadow_dir.join(format!("shadow.{name}"))
    }
}

impl SessionProvider for FileSessionProvider {
    fn open(&self, options: &ConnectionOptions, config: &ClientConfig) -> CibResult<Arc<dyn ClusterSession>> {
        let path = match options {
            ConnectionOptions::File(path) => path.clone(),
            ConnectionOptions::Shadow(name) => self.shadow_path(name),
            ConnectionOptions::Local | ConnectionOptions::Remote { .. } => {
                return Err(CibError::not_supported());
            }
        };
        let xml = std::fs::read_to_string(&path)?;
        let session = MemorySession::new(xml)?;
        info!(
            event = "Session",
            phase = "Open",
            kind = options.kind(),
            client = config.client_name,
            path = %path.display(),
            version = %session.version()
        );
        Ok(Arc::new(session))
    }
}

fn version_attributes(version: CibVersion) -> String {
    format!(
        r#"admin_epoch="{}" epoch="{}" num_updates="{}""#,
        version.admin_epoch, version.epoch, version.num_updates
    )
}

/// The `cib_diff_notify` envelope for a move from `source` to `target`.
fn notification(source: CibVersion, target: CibVersion) -> String {
    format!(
        concat!(
            r#"<notify t="cib_notify" subt="cib_diff_notify" cib_op="cib_apply_diff" cib_rc="0">"#,
            r#"<cib_update_result><diff format="2"><version>"#,
            r#"<source {}/><target {}/>"#,
            r#"</version></diff></cib_update_result></notify>"#
        ),
        version_attributes(source),
        version_attributes(target)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::extract_diff;

    const V1: &str = r#"<cib admin_epoch="0" epoch="1" num_updates="0"><configuration/><status/></cib>"#;
    const V2: &str = r#"<cib admin_epoch="0" epoch="1" num_updates="1"><configuration/><status><node_state id="1" uname="n1"/></status></cib>"#;

    #[derive(Default)]
    struct Recorder {
        diffs: Mutex<Vec<String>>,
        destroyed: AtomicBool,
    }

    impl NotificationHandler for Recorder {
        fn on_diff(&self, envelope: &str) {
            self.diffs.lock().push(envelope.to_string());
        }

        fn on_destroy(&self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_push_update_notifies() {
        let session = MemorySession::new(V1).unwrap();
        let recorder = Arc::new(Recorder::default());
        session.register_notifications(recorder.clone()).unwrap();

        let target = session.push_update(V2).unwrap();
        assert_eq!(target, CibVersion::new(0, 1, 1));
        assert_eq!(session.dispatch_pending(), 1);

        let diffs = recorder.diffs.lock();
        let summary = DiffSummary::decode(&extract_diff(&diffs[0]).unwrap()).unwrap();
        assert_eq!(summary.source, Some(CibVersion::new(0, 1, 0)));
        assert_eq!(summary.target, Some(target));
    }

    #[test]
    fn test_apply_patch() {
        let session = MemorySession::new(V1).unwrap();
        session.push_update(V2).unwrap();
        let diff = extract_diff(&notification(CibVersion::new(0, 1, 0), CibVersion::new(0, 1, 1))).unwrap();

        assert_eq!(session.apply_patch(V1, &diff).unwrap(), V2);

        let err = session.apply_patch(V2, &diff).unwrap_err();
        assert_eq!(err, CibError::diff_failed());
    }

    #[test]
    fn test_patch_to_unknown_revision() {
        let session = MemorySession::new(V1).unwrap();
        let diff = extract_diff(&notification(CibVersion::new(0, 1, 0), CibVersion::new(0, 9, 0))).unwrap();
        assert!(matches!(session.apply_patch(V1, &diff), Err(CibError::Patch(_))));
    }

    #[test]
    fn test_queries() {
        let session = MemorySession::new(V2).unwrap();
        assert_eq!(session.query(&QueryRequest::full()).unwrap(), V2);
        assert_eq!(
            session.query(&QueryRequest::full().without_children()).unwrap(),
            r#"<cib admin_epoch="0" epoch="1" num_updates="1"/>"#
        );
        assert_eq!(
            session.query(&QueryRequest::xpath("//node_state[@uname='n1']")).unwrap(),
            r#"<node_state id="1" uname="n1"/>"#
        );
        assert_eq!(
            session.query(&QueryRequest::xpath("/cib/nodes")).unwrap_err(),
            CibError::no_such_object()
        );
        assert_eq!(
            session.query(&QueryRequest::xpath("/cib/*")).unwrap(),
            "<xpath-query><configuration/><status><node_state id=\"1\" uname=\"n1\"/></status></xpath-query>"
        );
        assert_eq!(session.query_count(), 5);
    }

    #[test]
    fn test_disconnect_raises_destroy() {
        let session = MemorySession::new(V1).unwrap();
        let recorder = Arc::new(Recorder::default());
        session.register_notifications(recorder.clone()).unwrap();

        session.disconnect();
        assert!(!session.is_connected());
        assert_eq!(session.registrations(), 0);
        session.run_event_loop().unwrap();

        assert!(recorder.destroyed.load(Ordering::SeqCst));
        assert_eq!(session.query(&QueryRequest::full()).unwrap_err(), CibError::not_connected_rc());
    }

    #[test]
    fn test_events_raised_before_unregister_are_delivered() {
        let session = MemorySession::new(V1).unwrap();
        let recorder = Arc::new(Recorder::default());
        let id = session.register_notifications(recorder.clone()).unwrap();

        session.push_update(V2).unwrap();
        session.unregister(id).unwrap();
        session.dispatch_pending();
        assert_eq!(recorder.diffs.lock().len(), 1);

        session.push_update(V1.replace("num_updates=\"0\"", "num_updates=\"2\"")).unwrap();
        session.dispatch_pending();
        assert_eq!(recorder.diffs.lock().len(), 1);
    }

    #[test]
    fn test_event_loop_stops_on_close() {
        let session = Arc::new(MemorySession::new(V1).unwrap());
        let recorder = Arc::new(Recorder::default());
        session.register_notifications(recorder.clone()).unwrap();

        let looping = session.clone();
        let handle = std::thread::spawn(move || looping.run_event_loop());
        session.push_update(V2).unwrap();
        while recorder.diffs.lock().is_empty() {
            std::thread::yield_now();
        }
        session.close().unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_file_provider() {
        let dir = std::env::temp_dir().join(format!("pacemaker-cib-shadow-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("shadow.staging"), V1).unwrap();

        let provider = FileSessionProvider::new(&dir);
        let config = ClientConfig::default();
        let session = provider
            .open(&ConnectionOptions::from_shadow("staging"), &config)
            .unwrap();
        assert_eq!(session.query(&QueryRequest::full()).unwrap(), V1);

        let Err(err) = provider.open(&ConnectionOptions::Local, &config) else {
            panic!("expected an error");
        };
        assert_eq!(err, CibError::not_supported());
        let Err(err) = provider.open(&ConnectionOptions::from_file(dir.join("missing.xml")), &config)
        else {
            panic!("expected an error");
        };
        assert!(matches!(err, CibError::Io(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
