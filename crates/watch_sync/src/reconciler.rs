//! Thumbnail reconciliation.
//!
//! A pass walks a subtree, labels every thumbnail with its current id and
//! collects the ids whose label changed into a `LookupBatch`. Elements whose
//! id did not change are never queried again, however often unrelated
//! attributes on them churn.

use crate::badge;
use crate::config::EngineConfig;
use crate::markers::MarkerTable;
use crate::site::Site;
use bus::{StoreChannel, StoreRequest};
use core_types::VideoId;
use dom::{Document, NodeKey};
use std::collections::BTreeSet;

/// Ids gathered during one pass or one observer callback.
#[derive(Debug, Default)]
pub struct LookupBatch {
    ids: BTreeSet<VideoId>,
}

impl LookupBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, video: VideoId) {
        self.ids.insert(video);
    }

    pub fn contains(&self, video: &VideoId) -> bool {
        self.ids.contains(video)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Posts one `query` carrying every id, or nothing for an empty batch.
    pub fn flush(self, channel: &impl StoreChannel) -> bool {
        if self.ids.is_empty() {
            return false;
        }
        log::debug!(target: "watch_sync.reconciler", "querying {} ids", self.ids.len());
        channel.post(StoreRequest::query(self.ids.into_iter().collect()));
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    NotThumbnail,
    Unchanged,
    Changed(VideoId),
}

pub struct Reconciler<'a, S: Site> {
    site: &'a S,
    config: &'a EngineConfig,
    markers: &'a mut MarkerTable,
}

impl<'a, S: Site> Reconciler<'a, S> {
    pub fn new(site: &'a S, config: &'a EngineConfig, markers: &'a mut MarkerTable) -> Self {
        Self {
            site,
            config,
            markers,
        }
    }

    /// One full pass over `root`, flushed as at most one request.
    pub fn reconcile_and_flush(&mut self, doc: &mut Document, root: NodeKey, channel: &impl StoreChannel) {
        let mut batch = LookupBatch::new();
        self.reconcile(doc, root, &mut batch);
        batch.flush(channel);
    }

    /// Labels every thumbnail in `root`'s subtree, adding changed ids to
    /// `batch`. Returns the number of elements whose label changed.
    pub fn reconcile(&mut self, doc: &mut Document, root: NodeKey, batch: &mut LookupBatch) -> usize {
        let site = self.site;
        let thumbnails = doc.query_all(root, |d, k| site.is_video_thumbnail(d, k));
        let mut changed = 0;
        for element in thumbnails {
            if let Transition::Changed(video) = self.reconcile_element(doc, element) {
                batch.insert(video);
                changed += 1;
            }
        }
        changed
    }

    pub fn reconcile_element(&mut self, doc: &mut Document, element: NodeKey) -> Transition {
        if !self.site.is_video_thumbnail(doc, element) {
            return Transition::NotThumbnail;
        }
        let Some(video) = self.site.extract_identifier(doc, element) else {
            return Transition::NotThumbnail;
        };

        if let Err(err) = badge::ensure_thumbnail_badge(doc, element, self.config) {
            log::debug!(target: "watch_sync.reconciler", "badge for {element:?} failed: {err}");
        }

        if !self.markers.relabel(element, &video) {
            return Transition::Unchanged;
        }
        if let Err(err) = doc.remove_class(element, &self.config.watched_class) {
            log::debug!(target: "watch_sync.reconciler", "clearing {element:?} failed: {err}");
        }
        log::trace!(target: "watch_sync.reconciler", "{element:?} now shows {video}");
        Transition::Changed(video)
    }
}
