use crate::descriptor::FeedDescriptor;
use crate::lookup::find_all_posts_in_pages;
use crate::moderation::assert_some_posts_pass_moderation;
use crate::page::{ContinuationToken, FeedData, RawPage};
use crate::poller::{self, AppState};
use crate::selection::{SelectionCache, SelectionInputs};
use crate::sources::{create_source, SourceContext};
use crate::traits::FeedSource;
use crate::types::{FeedConfig, FeedError, FeedParams, Result};
use chrono::Utc;
use interfaces::defs::PostView;
use interfaces::moderation::Moderator;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Fetch state of a session. Only one fetch runs at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
    /// Last fetch failed; the next fetch retries the same cursor.
    Failed(String),
    /// The source returned no cursor.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched { items: usize },
    AlreadyInFlight,
    Exhausted,
}

#[derive(Default)]
struct SessionState {
    pages: Vec<Arc<RawPage>>,
    cache: SelectionCache,
    last_selection: Option<FeedData>,
    /// Page count at which look-ahead last fired.
    look_ahead_at: Option<usize>,
}

/// One pagination session over one source instance.
pub struct FeedSession {
    descriptor: FeedDescriptor,
    source: Arc<dyn FeedSource>,
    moderator: Arc<dyn Moderator>,
    config: FeedConfig,
    authenticated: bool,
    state: Mutex<SessionState>,
    status: watch::Sender<FetchStatus>,
}

impl FeedSession {
    pub fn new(
        descriptor: FeedDescriptor,
        params: &FeedParams,
        ctx: &SourceContext,
        moderator: Arc<dyn Moderator>,
    ) -> Result<Arc<Self>> {
        let source = create_source(&descriptor, params, ctx)?;
        let authenticated = ctx.client.session_did().is_some();
        Ok(Self::with_source(
            descriptor,
            source,
            moderator,
            ctx.config.clone(),
            authenticated,
        ))
    }

    pub fn with_source(
        descriptor: FeedDescriptor,
        source: Arc<dyn FeedSource>,
        moderator: Arc<dyn Moderator>,
        config: FeedConfig,
        authenticated: bool,
    ) -> Arc<Self> {
        info!(
            "Starting feed session for {} on {}",
            descriptor,
            source.source_name()
        );
        let (status, _) = watch::channel(FetchStatus::Idle);
        Arc::new(Self {
            descriptor,
            source,
            moderator,
            config,
            authenticated,
            state: Mutex::new(SessionState::default()),
            status,
        })
    }

    pub fn descriptor(&self) -> &FeedDescriptor {
        &self.descriptor
    }

    pub fn source(&self) -> &Arc<dyn FeedSource> {
        &self.source
    }

    pub fn status(&self) -> FetchStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchStatus> {
        self.status.subscribe()
    }

    pub fn pages(&self) -> Vec<Arc<RawPage>> {
        self.state.lock().pages.clone()
    }

    /// Token for the next page. `None` before the first page and after the
    /// last one.
    pub fn next_page_param(&self) -> Option<ContinuationToken> {
        self.state.lock().pages.last().and_then(|page| page.next_token())
    }

    pub fn has_next_page(&self) -> bool {
        match self.state.lock().pages.last() {
            None => true,
            Some(page) => page.cursor.is_some(),
        }
    }

    /// Fetch the page after the last stored one.
    pub async fn fetch_next_page(self: &Arc<Self>) -> Result<FetchOutcome> {
        let previous = match self.claim() {
            Ok(previous) => previous,
            Err(outcome) => return Ok(outcome),
        };

        let last_cursor = self.state.lock().pages.last().map(|page| page.cursor.clone());
        let cursor = match last_cursor {
            None => None,
            Some(Some(cursor)) => Some(cursor),
            Some(None) => {
                self.status.send_replace(FetchStatus::Exhausted);
                return Ok(FetchOutcome::Exhausted);
            }
        };
        debug!("Claimed fetch for {} (was {:?})", self.descriptor, previous);
        self.spawn_fetch(cursor).await
    }

    /// Fetch the page a token points at. The token must come from this
    /// session and point at the next unfetched page; `None` starts the
    /// session.
    pub async fn fetch_page(
        self: &Arc<Self>,
        token: Option<&ContinuationToken>,
    ) -> Result<FetchOutcome> {
        if let Some(token) = token {
            if !token.is_bound_to(&self.source) {
                return Err(FeedError::ForeignCursor);
            }
        }

        let previous = match self.claim() {
            Ok(previous) => previous,
            Err(outcome) => return Ok(outcome),
        };

        let expected = self.next_page_param().map(|next| next.cursor);
        let requested = token.map(|token| token.cursor.clone());
        let is_first = requested.is_none() && self.state.lock().pages.is_empty();
        if !is_first && (requested.is_none() || requested != expected) {
            self.status.send_replace(previous);
            return Err(FeedError::InvalidCursor {
                source_name: self.source.source_name(),
                cursor: requested.unwrap_or_default(),
            });
        }
        self.spawn_fetch(requested).await
    }

    /// Resolves once no fetch is in flight.
    pub async fn wait_until_settled(&self) {
        let mut rx = self.status.subscribe();
        if rx
            .wait_for(|status| *status != FetchStatus::Fetching)
            .await
            .is_err()
        {
            debug!("Status channel for {} closed", self.descriptor);
        }
    }

    /// Processed pages for the current raw pages. May start one background
    /// fetch when the result is too thin.
    pub fn select(self: &Arc<Self>, inputs: &SelectionInputs) -> FeedData {
        let (data, page_count) = {
            let mut state = self.state.lock();
            let pages = state.pages.clone();
            let data = state.cache.select(&pages, inputs, self.moderator.as_ref());
            state.last_selection = Some(data.clone());
            (data, pages.len())
        };
        self.maybe_look_ahead(&data, page_count);
        data
    }

    pub async fn poll_latest(&self, app_state: AppState) -> bool {
        let data = self.state.lock().last_selection.clone();
        match data {
            Some(data) => poller::poll_latest(&data, app_state).await,
            None => false,
        }
    }

    pub fn find_posts(&self, uri: &str) -> Vec<PostView> {
        let pages = self.pages();
        find_all_posts_in_pages(&pages, uri)
    }

    /// Atomically move to `Fetching`. Returns the replaced status, or the
    /// outcome to report when no fetch may start.
    fn claim(&self) -> std::result::Result<FetchStatus, FetchOutcome> {
        let mut result = Err(FetchOutcome::AlreadyInFlight);
        self.status.send_if_modified(|status| match status {
            FetchStatus::Fetching => false,
            FetchStatus::Exhausted => {
                result = Err(FetchOutcome::Exhausted);
                false
            }
            FetchStatus::Idle | FetchStatus::Failed(_) => {
                result = Ok(std::mem::replace(status, FetchStatus::Fetching));
                true
            }
        });
        result
    }

    async fn spawn_fetch(self: &Arc<Self>, cursor: Option<String>) -> Result<FetchOutcome> {
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move { session.fetch_and_store(cursor).await });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Fetch task for {} failed: {}", self.descriptor, e);
                self.status.send_replace(FetchStatus::Failed(e.to_string()));
                Err(FeedError::Join(e))
            }
        }
    }

    async fn fetch_and_store(&self, cursor: Option<String>) -> Result<FetchOutcome> {
        let limit = self.config.page_size;
        debug!(
            "Fetching {} from {} (cursor: {:?})",
            limit,
            self.source.source_name(),
            cursor
        );

        let response = match self.source.fetch(cursor.as_deref(), limit).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to fetch {}: {}", self.source.source_name(), e);
                self.status.send_replace(FetchStatus::Failed(e.to_string()));
                return Err(e);
            }
        };

        if !self.authenticated {
            if let Err(e) = assert_some_posts_pass_moderation(&response.feed, self.moderator.as_ref())
            {
                warn!("Rejecting page from {}: {}", self.source.source_name(), e);
                self.status.send_replace(FetchStatus::Failed(e.to_string()));
                return Err(e);
            }
        }

        let items = response.feed.len();
        let exhausted = response.cursor.is_none();
        let page_number = {
            let mut state = self.state.lock();
            state.pages.push(Arc::new(RawPage {
                source: self.source.clone(),
                cursor: response.cursor,
                feed: response.feed,
                fetched_at: Utc::now(),
            }));
            state.pages.len()
        };

        info!(
            "Stored page {} of {} with {} items{}",
            page_number,
            self.descriptor,
            items,
            if exhausted { " (end of feed)" } else { "" }
        );
        self.status.send_replace(if exhausted {
            FetchStatus::Exhausted
        } else {
            FetchStatus::Idle
        });
        Ok(FetchOutcome::Fetched { items })
    }

    fn maybe_look_ahead(self: &Arc<Self>, data: &FeedData, page_count: usize) {
        if page_count == 0
            || page_count >= self.config.max_look_ahead_pages
            || data.slice_count() >= self.config.page_size
            || !self.has_next_page()
        {
            return;
        }
        if matches!(
            self.status(),
            FetchStatus::Fetching | FetchStatus::Failed(_)
        ) {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.look_ahead_at == Some(page_count) {
                return;
            }
            state.look_ahead_at = Some(page_count);
        }

        let Ok(handle) = Handle::try_current() else {
            debug!("No runtime for look-ahead on {}", self.descriptor);
            return;
        };
        debug!(
            "Only {} slices across {} pages of {}, fetching ahead",
            data.slice_count(),
            page_count,
            self.descriptor
        );
        let session = Arc::clone(self);
        handle.spawn(async move {
            if let Err(e) = session.fetch_next_page().await {
                warn!("Look-ahead fetch for {} failed: {}", session.descriptor, e);
            }
        });
    }
}
