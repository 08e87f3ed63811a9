//! Active-video tracking.
//!
//! At most one `PlaybackWatcher` is armed at a time. It is bound to the id
//! and player that were active when it was armed and goes through
//! `Armed → Fired → Retired`, or straight to `Retired` when a newer active
//! video supersedes it. A retired watcher is dropped, never re-armed.

use crate::badge;
use crate::config::EngineConfig;
use crate::engine::Shared;
use crate::page::{Page, TimeUpdate};
use crate::site::Site;
use bus::{StoreChannel, StoreRequest};
use core_types::{TimestampMs, VideoId};
use dom::NodeKey;

/// Seconds of playback after which a video counts as watched:
/// `min(floor, duration * ratio)`. `None` while the duration is unknown.
pub fn watched_threshold(duration: f64, config: &EngineConfig) -> Option<f64> {
    if duration.is_nan() {
        return None;
    }
    Some(config.watched_floor_secs.min(duration * config.watched_ratio))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Pending,
    /// Progress during an ad never counts.
    AdShowing,
    ThresholdReached,
}

#[derive(Debug)]
pub struct PlaybackWatcher {
    video: VideoId,
    player: NodeKey,
    ad_updates: u32,
}

impl PlaybackWatcher {
    pub fn arm(video: VideoId, player: NodeKey) -> Self {
        Self {
            video,
            player,
            ad_updates: 0,
        }
    }

    pub fn video(&self) -> &VideoId {
        &self.video
    }

    pub fn player(&self) -> NodeKey {
        self.player
    }

    /// Time updates swallowed because an ad was showing.
    pub fn ad_updates(&self) -> u32 {
        self.ad_updates
    }

    pub fn evaluate(&mut self, update: &TimeUpdate, ad_showing: bool, config: &EngineConfig) -> Progress {
        if ad_showing {
            self.ad_updates += 1;
            return Progress::AdShowing;
        }
        match watched_threshold(update.duration, config) {
            Some(threshold) if update.current_time > threshold => Progress::ThresholdReached,
            _ => Progress::Pending,
        }
    }
}

#[derive(Debug, Default)]
pub struct ActiveVideoTracker {
    watcher: Option<PlaybackWatcher>,
}

impl ActiveVideoTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> Option<&PlaybackWatcher> {
        self.watcher.as_ref()
    }

    pub(crate) fn track_active<S: Site, C: StoreChannel>(&mut self, shared: &mut Shared<S, C>, page: &mut Page) {
        let Some(video) = shared.site.active_identifier(page.location()) else {
            log::trace!(target: "watch_sync.tracker", "no active video at {}", page.location());
            self.retire("left the watch page");
            return;
        };

        let doc = &mut page.document;
        match shared.site.primary_info(doc, doc.root()) {
            Some(info) => {
                if let Err(err) = badge::ensure_header_badge(doc, info, &shared.config) {
                    log::debug!(target: "watch_sync.tracker", "header badge failed: {err}");
                }
                if shared.markers.relabel(info, &video) {
                    if let Err(err) = doc.remove_class(info, &shared.config.watched_class) {
                        log::debug!(target: "watch_sync.tracker", "clearing header failed: {err}");
                    }
                }
            }
            None => log::debug!(target: "watch_sync.tracker", "primary info not rendered yet"),
        }

        shared.channel.post(StoreRequest::query(vec![video.clone()]));

        self.retire("superseded");
        match shared.site.primary_player(doc) {
            Some(player) => {
                log::debug!(target: "watch_sync.tracker", "armed watcher for {video} on {player:?}");
                self.watcher = Some(PlaybackWatcher::arm(video, player));
            }
            None => log::debug!(target: "watch_sync.tracker", "no player for {video} yet"),
        }
    }

    pub(crate) fn on_time_update<S: Site, C: StoreChannel>(
        &mut self,
        shared: &mut Shared<S, C>,
        page: &Page,
        update: &TimeUpdate,
    ) {
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        if update.target != watcher.player() {
            return;
        }
        let ad_showing = shared.site.is_ad_showing(&page.document, watcher.player());
        if watcher.evaluate(update, ad_showing, &shared.config) != Progress::ThresholdReached {
            return;
        }
        let Some(watcher) = self.watcher.take() else {
            return;
        };

        // The user may have moved on between arming and crossing the threshold.
        if shared.site.active_identifier(page.location()).as_ref() != Some(watcher.video()) {
            log::debug!(
                target: "watch_sync.tracker",
                "{} no longer active, discarding watch",
                watcher.video()
            );
            return;
        }

        let video_title = shared.site.video_title(&page.document);
        log::info!(target: "watch_sync.tracker", "watched {} ({video_title})", watcher.video());
        shared.channel.post(StoreRequest::Watch {
            video_id: watcher.video,
            video_title,
            timestamp: TimestampMs::now(),
        });
    }

    fn retire(&mut self, reason: &str) {
        if let Some(old) = self.watcher.take() {
            log::debug!(target: "watch_sync.tracker", "retired watcher for {} ({reason})", old.video());
        }
    }
}
