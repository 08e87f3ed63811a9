use dom::{Document, NodeKey};
use url::Url;

/// The host page: its live document and the current navigation location.
pub struct Page {
    pub document: Document,
    location: Url,
}

impl Page {
    pub fn new(location: Url) -> Self {
        Self {
            document: Document::new(),
            location,
        }
    }

    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(location)?))
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// In-page navigation: the location changes, the document stays.
    pub fn navigate(&mut self, location: &str) -> Result<(), url::ParseError> {
        self.location = self.location.join(location)?;
        Ok(())
    }
}

/// A playback progress event from a media element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeUpdate {
    pub target: NodeKey,
    pub current_time: f64,
    /// NaN until the media metadata is known.
    pub duration: f64,
}
