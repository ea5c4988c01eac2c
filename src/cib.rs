use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{Span, debug, info, info_span, warn};

use crate::cache::DocumentCache;
use crate::config::{ClientConfig, ConnectionOptions};
use crate::decode::root_version;
use crate::error::{CibError, CibResult};
use crate::session::{ClusterSession, QueryRequest, SessionProvider};
use crate::subscription::{CibEvent, Subscription, SubscriptionSlot, SubscriptionState};
use crate::types::{CibVersion, Document};

/// A client handle on one CIB session.
///
/// Owns the session, the cached document and at most one live subscription.
/// Every operation runs inside the handle's `cib` span. Dropping the handle
/// closes the session.
pub struct Cib {
    session: Arc<dyn ClusterSession>,
    config: ClientConfig,
    cache: Arc<DocumentCache>,
    subscription: Arc<SubscriptionSlot>,
    closed: AtomicBool,
    span: Span,
}

impl std::fmt::Debug for Cib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cib")
            .field("client", &self.config.client_name)
            .field("connection", &self.config.connection)
            .field("subscription", &self.subscription.state())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Cib {
    /// Sign on through `provider`.
    pub fn open<P>(provider: &P, options: &ConnectionOptions, config: ClientConfig) -> CibResult<Self>
    where
        P: SessionProvider + ?Sized,
    {
        let span = info_span!("cib", client = %config.client_name, connection = options.kind());
        let session = span.in_scope(|| {
            debug!(event = "Cib", phase = "Open", kind = %config.connection);
            provider.open(options, &config)
        })?;
        Ok(Self::build(session, config, span))
    }

    /// Wrap a session that is already open.
    pub fn with_session(session: Arc<dyn ClusterSession>, config: ClientConfig) -> Self {
        let span = info_span!("cib", client = %config.client_name, connection = "session");
        Self::build(session, config, span)
    }

    fn build(session: Arc<dyn ClusterSession>, config: ClientConfig, span: Span) -> Self {
        let cache = Arc::new(DocumentCache::new(session.clone(), config.clone()));
        Self {
            session,
            config,
            cache,
            subscription: Arc::new(SubscriptionSlot::default()),
            closed: AtomicBool::new(false),
            span,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn ClusterSession> {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CibResult<()> {
        if self.is_closed() {
            return Err(CibError::NotConnected);
        }
        Ok(())
    }

    fn run_query(&self, request: QueryRequest) -> CibResult<String> {
        let _entered = self.span.enter();
        self.ensure_open()?;
        let request = request.with_scope_local(self.config.scope_local);
        debug!(
            event = "Cib",
            phase = "Query",
            xpath = request.xpath.as_deref().unwrap_or("/"),
            no_children = request.no_children
        );
        self.session.query(&request)
    }

    /// The whole document as XML.
    pub fn query(&self) -> CibResult<String> {
        self.run_query(QueryRequest::full())
    }

    /// The `cib` element alone, which carries the version and quorum attributes.
    pub fn query_no_children(&self) -> CibResult<String> {
        self.run_query(QueryRequest::full().without_children())
    }

    pub fn query_xpath(&self, path: &str) -> CibResult<String> {
        self.run_query(QueryRequest::xpath(path))
    }

    pub fn query_xpath_no_children(&self, path: &str) -> CibResult<String> {
        self.run_query(QueryRequest::xpath(path).without_children())
    }

    /// The current version, without fetching the document.
    pub fn version(&self) -> CibResult<CibVersion> {
        let root = self.query_xpath_no_children("/cib")?;
        root_version(&root)
    }

    /// Fetch and decode the whole document, replacing the cached one.
    pub fn decode(&self) -> CibResult<Arc<Document>> {
        let _entered = self.span.enter();
        self.ensure_open()?;
        self.cache.initialize()
    }

    /// The cached document, fetched on first use.
    pub fn document(&self) -> CibResult<Arc<Document>> {
        match self.cache.current() {
            Some(document) => Ok(document),
            None => self.decode(),
        }
    }

    /// Follow changes to the document. `callback` runs on the event loop
    /// thread for every new revision and once if the connection is lost.
    ///
    /// A handle has at most one live subscription. Drop or unsubscribe the
    /// previous one first.
    pub fn subscribe<F>(&self, callback: F) -> CibResult<Subscription>
    where
        F: Fn(CibEvent, Option<Arc<Document>>) + Send + Sync + 'static,
    {
        let _entered = self.span.enter();
        self.ensure_open()?;
        Subscription::start(
            self.session.clone(),
            self.cache.clone(),
            self.subscription.clone(),
            Box::new(callback),
            self.span.clone(),
        )
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscription.state()
    }

    /// Deliver notifications on the calling thread until the session ends.
    pub fn run_event_loop(&self) -> CibResult<()> {
        let _entered = self.span.enter();
        self.ensure_open()?;
        self.session.run_event_loop()
    }

    /// Sign off. Closing twice is a no-op.
    pub fn close(&self) -> CibResult<()> {
        let _entered = self.span.enter();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(event = "Cib", phase = "Close");
        self.session.close()
    }
}

impl Drop for Cib {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(event = "Cib", phase = "Drop", error = %err, "sign-off failed");
        }
    }
}
