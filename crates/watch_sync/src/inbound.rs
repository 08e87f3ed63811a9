use crate::badge;
use crate::engine::Shared;
use crate::page::Page;
use crate::painter;
use crate::site::Site;
use bus::{StoreChannel, StoreReply};
use core_types::WatchedFact;

/// Applies one store message to the page. Returns the number of elements
/// painted.
pub(crate) fn handle_reply<S: Site, C: StoreChannel>(
    shared: &mut Shared<S, C>,
    page: &mut Page,
    reply: StoreReply,
) -> usize {
    let doc = &mut page.document;
    match reply {
        StoreReply::QueryReply { result } => result
            .into_iter()
            .map(|(video, watched)| {
                painter::apply_fact(doc, &mut shared.markers, &shared.config, &WatchedFact::new(video, watched))
            })
            .sum(),
        StoreReply::UpdateWatched { video_id, watched } => painter::apply_fact(
            doc,
            &mut shared.markers,
            &shared.config,
            &WatchedFact::new(video_id, watched),
        ),
        StoreReply::HideProgressBar => {
            match badge::inject_progress_style(doc, &shared.config) {
                Ok(true) => log::debug!(target: "watch_sync.inbound", "resume bar hidden"),
                Ok(false) => {}
                Err(err) => log::debug!(target: "watch_sync.inbound", "hiding resume bar failed: {err}"),
            }
            0
        }
        StoreReply::Unknown => {
            log::trace!(target: "watch_sync.inbound", "ignoring unknown store message");
            0
        }
    }
}
