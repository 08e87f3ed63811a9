//! Site knowledge: which elements are thumbnails, where ids live, where the
//! player and its title are rendered.

pub mod markup;
mod youtube;

pub use youtube::YoutubeSite;

use core_types::VideoId;
use dom::{Document, NodeKey};
use url::Url;

pub trait Site {
    fn is_video_thumbnail(&self, doc: &Document, element: NodeKey) -> bool;

    /// Only meaningful for elements `is_video_thumbnail` accepts.
    fn extract_identifier(&self, doc: &Document, element: NodeKey) -> Option<VideoId>;

    /// The video bound to the primary player, derived from the location.
    fn active_identifier(&self, location: &Url) -> Option<VideoId>;

    /// The primary-video-info region within `scope`, inclusive.
    fn primary_info(&self, doc: &Document, scope: NodeKey) -> Option<NodeKey>;

    /// Element whose children are replaced when the playing video changes.
    fn title_element(&self, doc: &Document, info: NodeKey) -> Option<NodeKey>;

    fn video_title(&self, doc: &Document) -> String;

    /// The media element that emits playback progress.
    fn primary_player(&self, doc: &Document) -> Option<NodeKey>;

    fn is_ad_showing(&self, doc: &Document, player: NodeKey) -> bool;
}
