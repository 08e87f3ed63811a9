//! Mutation dispatch.
//!
//! Three subscriptions with different scopes and lifetimes:
//! - setup: whole body, child list. Waits for the primary-info region, primes
//!   the page once, binds the title subscription, then disconnects for good
//!   (the site never removes that region once rendered).
//! - title: the title element, child list. New children mean the user moved
//!   to another video without a reload.
//! - links: whole body, `class`/`href` attributes and child list, for the
//!   life of the page. Flushes at most one lookup per callback.
//!
//! Callbacks of different subscriptions are not ordered relative to each
//! other; every path is idempotent so either may see a node first.

use crate::engine::Shared;
use crate::page::Page;
use crate::reconciler::{LookupBatch, Transition};
use crate::site::Site;
use crate::tracker::ActiveVideoTracker;
use bus::StoreChannel;
use dom::{Document, DomError, MutationBatch, MutationRecord, ObserveOptions, ObserverId};

const LINK_ATTRIBUTES: [&str; 2] = ["class", "href"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupState {
    /// Primary-info region not seen yet.
    Waiting,
    /// Page primed; the title element has not been rendered.
    AwaitingTitle,
    /// Title bound, setup subscription disconnected.
    Done,
}

pub struct MutationDispatch {
    setup: ObserverId,
    title: ObserverId,
    links: ObserverId,
    setup_state: SetupState,
}

impl MutationDispatch {
    pub fn install(doc: &mut Document) -> Result<Self, DomError> {
        let body = doc.body();

        let setup = doc.create_observer();
        doc.observe(setup, body, ObserveOptions::child_list().with_subtree())?;

        let title = doc.create_observer();

        let links = doc.create_observer();
        doc.observe(
            links,
            body,
            ObserveOptions::child_list()
                .with_attributes(&LINK_ATTRIBUTES)
                .with_subtree(),
        )?;

        Ok(Self {
            setup,
            title,
            links,
            setup_state: SetupState::Waiting,
        })
    }

    pub fn setup_state(&self) -> SetupState {
        self.setup_state
    }

    pub(crate) fn dispatch<S: Site, C: StoreChannel>(
        &mut self,
        shared: &mut Shared<S, C>,
        tracker: &mut ActiveVideoTracker,
        page: &mut Page,
        batch: MutationBatch,
    ) {
        if batch.observer == self.setup {
            self.on_setup(shared, tracker, page, &batch.records);
        } else if batch.observer == self.title {
            self.on_title(shared, tracker, page, &batch.records);
        } else if batch.observer == self.links {
            self.on_links(shared, page, &batch.records);
        } else {
            log::trace!(target: "watch_sync.dispatch", "records for foreign observer {:?}", batch.observer);
        }
    }

    fn on_setup<S: Site, C: StoreChannel>(
        &mut self,
        shared: &mut Shared<S, C>,
        tracker: &mut ActiveVideoTracker,
        page: &mut Page,
        records: &[MutationRecord],
    ) {
        if self.setup_state == SetupState::Waiting {
            let site = &shared.site;
            let doc = &page.document;
            if !records
                .iter()
                .any(|record| site.primary_info(doc, record.target()).is_some())
            {
                return;
            }
            log::debug!(target: "watch_sync.dispatch", "primary info rendered, priming page");
            let root = page.document.root();
            shared.reconcile_and_flush(&mut page.document, root);
            tracker.track_active(shared, page);
            self.setup_state = SetupState::AwaitingTitle;
        }

        if self.setup_state == SetupState::AwaitingTitle && self.bind_title(shared, &mut page.document) {
            page.document.disconnect(self.setup);
            self.setup_state = SetupState::Done;
        }
    }

    fn bind_title<S: Site, C: StoreChannel>(&self, shared: &Shared<S, C>, doc: &mut Document) -> bool {
        let Some(title) = shared
            .site
            .primary_info(doc, doc.root())
            .and_then(|info| shared.site.title_element(doc, info))
        else {
            log::debug!(target: "watch_sync.dispatch", "title not rendered yet");
            return false;
        };
        match doc.observe(self.title, title, ObserveOptions::child_list()) {
            Ok(()) => true,
            Err(err) => {
                log::debug!(target: "watch_sync.dispatch", "binding title failed: {err}");
                false
            }
        }
    }

    fn on_title<S: Site, C: StoreChannel>(
        &mut self,
        shared: &mut Shared<S, C>,
        tracker: &mut ActiveVideoTracker,
        page: &mut Page,
        records: &[MutationRecord],
    ) {
        let retitled = records
            .iter()
            .any(|record| matches!(record, MutationRecord::ChildList { added, .. } if !added.is_empty()));
        if retitled {
            log::debug!(target: "watch_sync.dispatch", "title replaced, re-tracking");
            tracker.track_active(shared, page);
        }
    }

    fn on_links<S: Site, C: StoreChannel>(
        &mut self,
        shared: &mut Shared<S, C>,
        page: &mut Page,
        records: &[MutationRecord],
    ) {
        let doc = &mut page.document;
        let mut batch = LookupBatch::new();
        let mut removals = false;
        {
            let mut reconciler = shared.reconciler();
            for record in records {
                match record {
                    MutationRecord::Attributes { target, .. } => {
                        if !doc.is_connected(*target) {
                            continue;
                        }
                        if let Transition::Changed(video) = reconciler.reconcile_element(doc, *target) {
                            batch.insert(video);
                        }
                    }
                    MutationRecord::ChildList { added, removed, .. } => {
                        removals |= !removed.is_empty();
                        for node in added {
                            if doc.is_connected(*node) {
                                reconciler.reconcile(doc, *node, &mut batch);
                            }
                        }
                    }
                }
            }
        }
        batch.flush(&shared.channel);
        if removals {
            let pruned = shared.markers.prune(doc);
            if pruned > 0 {
                log::trace!(target: "watch_sync.dispatch", "pruned {pruned} released markers");
            }
        }
    }
}
