use crate::config::EngineConfig;
use crate::markers::MarkerTable;
use core_types::WatchedFact;
use dom::Document;

/// Paints `fact` onto every connected element labelled with its id, whoever
/// asked for it. Returns the number of elements painted.
pub fn apply_fact(
    doc: &mut Document,
    markers: &mut MarkerTable,
    config: &EngineConfig,
    fact: &WatchedFact,
) -> usize {
    let mut painted = 0;
    for element in markers.elements_for(&fact.video) {
        if !doc.is_connected(element) {
            continue;
        }
        let result = if fact.watched {
            doc.add_class(element, &config.watched_class)
        } else {
            doc.remove_class(element, &config.watched_class)
        };
        if let Err(err) = result {
            log::debug!(target: "watch_sync.painter", "painting {element:?} failed: {err}");
            continue;
        }
        markers.settle(element);
        painted += 1;
    }
    log::trace!(
        target: "watch_sync.painter",
        "{} watched={} on {painted} elements",
        fact.video,
        fact.watched
    );
    painted
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::VideoId;

    #[test]
    fn paints_every_match_and_skips_detached() {
        let mut doc = Document::new();
        let config = EngineConfig::default();
        let mut markers = MarkerTable::new();
        let video = VideoId::from("abc123xxxxx");
        let body = doc.body();

        let first = doc.create_element("a");
        let second = doc.create_element("a");
        let detached = doc.create_element("a");
        doc.append_child(body, first).unwrap();
        doc.append_child(body, second).unwrap();
        for el in [first, second, detached] {
            markers.relabel(el, &video);
        }

        let painted = apply_fact(&mut doc, &mut markers, &config, &WatchedFact::new(video.clone(), true));
        assert_eq!(painted, 2);
        assert!(doc.has_class(first, &config.watched_class));
        assert!(doc.has_class(second, &config.watched_class));
        assert!(!doc.has_class(detached, &config.watched_class));
        assert!(!markers.get(first).unwrap().dirty);
        assert!(markers.get(detached).unwrap().dirty);

        apply_fact(&mut doc, &mut markers, &config, &WatchedFact::new(video, false));
        assert!(!doc.has_class(first, &config.watched_class));
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let mut doc = Document::new();
        let config = EngineConfig::default();
        let mut markers = MarkerTable::new();
        let fact = WatchedFact::new(VideoId::from("ZZZZZZZZZZZ"), true);
        assert_eq!(apply_fact(&mut doc, &mut markers, &config, &fact), 0);
    }
}
