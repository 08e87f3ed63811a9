use crate::config::EngineConfig;
use crate::dispatch::{MutationDispatch, SetupState};
use crate::inbound;
use crate::markers::MarkerTable;
use crate::page::{Page, TimeUpdate};
use crate::painter;
use crate::reconciler::Reconciler;
use crate::site::Site;
use crate::tracker::{ActiveVideoTracker, PlaybackWatcher};
use bus::{StoreChannel, StoreReply};
use core_types::WatchedFact;
use dom::{DomError, NodeKey};

/// State every component reads; markers are the only thing they write.
pub(crate) struct Shared<S, C> {
    pub(crate) site: S,
    pub(crate) channel: C,
    pub(crate) config: EngineConfig,
    pub(crate) markers: MarkerTable,
}

impl<S: Site, C: StoreChannel> Shared<S, C> {
    pub(crate) fn reconciler(&mut self) -> Reconciler<'_, S> {
        Reconciler::new(&self.site, &self.config, &mut self.markers)
    }

    pub(crate) fn reconcile_and_flush(&mut self, doc: &mut dom::Document, root: NodeKey) {
        let mut reconciler = Reconciler::new(&self.site, &self.config, &mut self.markers);
        reconciler.reconcile_and_flush(doc, root, &self.channel);
    }
}

/// Keeps one page's thumbnails and active video in sync with the store.
///
/// Everything runs on the caller's thread: the host feeds mutation records
/// (`pump`), playback progress (`on_time_update`) and store messages
/// (`on_message`), and the engine answers with requests on its channel.
pub struct WatchSync<S: Site, C: StoreChannel> {
    shared: Shared<S, C>,
    tracker: ActiveVideoTracker,
    dispatch: Option<MutationDispatch>,
}

impl<S: Site, C: StoreChannel> WatchSync<S, C> {
    pub fn new(site: S, channel: C, config: EngineConfig) -> Self {
        Self {
            shared: Shared {
                site,
                channel,
                config,
                markers: MarkerTable::new(),
            },
            tracker: ActiveVideoTracker::new(),
            dispatch: None,
        }
    }

    /// Installs the mutation subscriptions. Calling it again is a no-op.
    pub fn start(&mut self, page: &mut Page) -> Result<(), DomError> {
        if self.dispatch.is_none() {
            self.dispatch = Some(MutationDispatch::install(&mut page.document)?);
            log::debug!(target: "watch_sync", "observing {}", page.location());
        }
        Ok(())
    }

    /// Delivers queued mutation records until the document is quiet.
    /// Returns the number of records delivered.
    pub fn pump(&mut self, page: &mut Page) -> usize {
        let Some(dispatch) = self.dispatch.as_mut() else {
            return 0;
        };
        let mut delivered = 0;
        for _ in 0..self.shared.config.max_delivery_rounds {
            let batches = page.document.take_records();
            if batches.is_empty() {
                return delivered;
            }
            for batch in batches {
                delivered += batch.records.len();
                dispatch.dispatch(&mut self.shared, &mut self.tracker, page, batch);
            }
        }
        if page.document.has_pending_records() {
            log::warn!(
                target: "watch_sync",
                "records still pending after {} delivery rounds",
                self.shared.config.max_delivery_rounds
            );
        }
        delivered
    }

    pub fn on_time_update(&mut self, page: &Page, update: TimeUpdate) {
        self.tracker.on_time_update(&mut self.shared, page, &update);
    }

    /// Returns the number of elements painted.
    pub fn on_message(&mut self, page: &mut Page, reply: StoreReply) -> usize {
        inbound::handle_reply(&mut self.shared, page, reply)
    }

    /// One reconciliation pass over `root`, outside any observer callback.
    pub fn reconcile(&mut self, page: &mut Page, root: NodeKey) {
        self.shared.reconcile_and_flush(&mut page.document, root);
    }

    pub fn track_active(&mut self, page: &mut Page) {
        self.tracker.track_active(&mut self.shared, page);
    }

    pub fn apply_fact(&mut self, page: &mut Page, fact: &WatchedFact) -> usize {
        painter::apply_fact(&mut page.document, &mut self.shared.markers, &self.shared.config, fact)
    }

    pub fn armed_watcher(&self) -> Option<&PlaybackWatcher> {
        self.tracker.armed()
    }

    pub fn setup_state(&self) -> Option<SetupState> {
        self.dispatch.as_ref().map(|d| d.setup_state())
    }

    pub fn markers(&self) -> &MarkerTable {
        &self.shared.markers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn channel(&self) -> &C {
        &self.shared.channel
    }
}
