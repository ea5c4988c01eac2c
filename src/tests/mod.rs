
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;

use crate::session::{ClusterSession, MemorySession, NotificationHandler};

pub(crate) const SIMPLE: &str = include_str!("../../testdata/simple.xml");
pub(crate) const STATUS: &str = include_str!("../../testdata/status.xml");
pub(crate) const CLUSTER: &str = include_str!("../../testdata/cluster.xml");

#[derive(Clone)]
struct SharedLogBuffer(Arc<Mutex<Vec<u8>>>);

struct SharedLogWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter(Arc::clone(&self.0))
    }
}

impl std::io::Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a debug-level subscriber scoped to this thread and return
/// its result with everything logged meanwhile.
pub(crate) fn capture_logs<F, R>(f: F) -> (R, String)
where
    F: FnOnce() -> R,
{
    let sink = SharedLogBuffer(Arc::new(Mutex::new(Vec::new())));
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(sink.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&sink.0.lock()).into_owned();
    (result, logs)
}

/// A small `cib` document at version `0:1:<num_updates>` with one online
/// member per name in `online`.
pub(crate) fn revision(num_updates: i32, online: &[&str]) -> String {
    let nodes = online
        .iter()
        .map(|name| format!(r#"<node id="{name}" uname="{name}"/>"#))
        .join("");
    let states = online
        .iter()
        .map(|name| {
            format!(
                r#"<node_state id="{name}" uname="{name}" in_ccm="true" crmd="online" join="member" expected="member"/>"#
            )
        })
        .join("");
    format!(
        r#"<cib admin_epoch="0" epoch="1" num_updates="{num_updates}" validate-with="pacemaker-3.9"><configuration><crm_config/><nodes>{nodes}</nodes><resources/><constraints/></configuration><status>{states}</status></cib>"#
    )
}

/// Records diff envelopes delivered by a session.
#[derive(Default)]
pub(crate) struct EnvelopeRecorder {
    envelopes: Mutex<Vec<String>>,
}

impl EnvelopeRecorder {
    pub fn register(session: &MemorySession) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        session
            .register_notifications(recorder.clone())
            .expect("register recorder");
        recorder
    }

    /// Deliver what the session has queued and hand back every envelope
    /// recorded so far.
    pub fn drain(&self, session: &MemorySession) -> Vec<String> {
        session.dispatch_pending();
        std::mem::take(&mut *self.envelopes.lock())
    }
}

impl NotificationHandler for EnvelopeRecorder {
    fn on_diff(&self, envelope: &str) {
        self.envelopes.lock().push(envelope.to_string());
    }

    fn on_destroy(&self) {}
}
