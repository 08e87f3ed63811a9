use core_types::VideoId;
use dom::{Document, NodeKey};
use std::collections::HashMap;

/// What the engine last learned about one rendered element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub video: VideoId,
    /// Set when the identifier changed; cleared once a fact has been painted.
    pub dirty: bool,
}

/// Per-element identifier records. The same id may label any number of
/// elements; each is painted on its own.
#[derive(Debug, Default)]
pub struct MarkerTable {
    marks: HashMap<NodeKey, Marker>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: NodeKey) -> Option<&Marker> {
        self.marks.get(&element)
    }

    pub fn video(&self, element: NodeKey) -> Option<&VideoId> {
        self.marks.get(&element).map(|m| &m.video)
    }

    /// Records `video` on `element`. Returns `true` when the marker was
    /// absent or carried another id.
    pub fn relabel(&mut self, element: NodeKey, video: &VideoId) -> bool {
        match self.marks.get_mut(&element) {
            Some(marker) if marker.video == *video => false,
            Some(marker) => {
                marker.video = video.clone();
                marker.dirty = true;
                true
            }
            None => {
                self.marks.insert(
                    element,
                    Marker {
                        video: video.clone(),
                        dirty: true,
                    },
                );
                true
            }
        }
    }

    /// Elements currently labelled with `video`.
    pub fn elements_for(&self, video: &VideoId) -> Vec<NodeKey> {
        let mut out: Vec<NodeKey> = self
            .marks
            .iter()
            .filter(|(_, m)| m.video == *video)
            .map(|(k, _)| *k)
            .collect();
        out.sort();
        out
    }

    pub fn settle(&mut self, element: NodeKey) {
        if let Some(marker) = self.marks.get_mut(&element) {
            marker.dirty = false;
        }
    }

    /// Forgets elements the document released. Returns how many went away.
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.marks.len();
        self.marks.retain(|key, _| doc.contains(*key));
        before - self.marks.len()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
