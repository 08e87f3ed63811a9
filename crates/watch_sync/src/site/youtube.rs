use core_types::{VIDEO_ID_LEN, VideoId};
use dom::{Document, NodeKey};
use memchr::memmem;
use url::Url;

use super::Site;

const WATCH_PATH: &str = "/watch";
const WATCH_MARKER: &str = "/watch?v=";
const WATCH_PREFIXES: [&str; 2] = ["/watch?v=", "https://www.youtube.com/watch?v="];

/// Grid thumbnails, end-card overlays and the post-playback video wall.
const THUMBNAIL_CLASSES: [&str; 3] = ["ytd-thumbnail", "ytp-ce-covering-overlay", "ytp-videowall-still"];

const PRIMARY_INFO_TAG: &str = "ytd-video-primary-info-renderer";
const TITLE_CLASS: &str = "title";
const TITLE_TEXT_TAG: &str = "yt-formatted-string";
const PLAYER_ID: &str = "movie_player";
const AD_SHOWING_CLASS: &str = "ad-showing";

#[derive(Clone, Copy, Debug, Default)]
pub struct YoutubeSite;

impl YoutubeSite {
    fn title_block(doc: &Document, info: NodeKey) -> Option<NodeKey> {
        doc.query_first(info, |d, k| d.has_class(k, TITLE_CLASS))
    }
}

impl Site for YoutubeSite {
    fn is_video_thumbnail(&self, doc: &Document, element: NodeKey) -> bool {
        let Some(href) = doc.attribute(element, "href") else {
            return false;
        };
        if !WATCH_PREFIXES.iter().any(|prefix| href.starts_with(prefix)) {
            return false;
        }
        THUMBNAIL_CLASSES.iter().any(|class| doc.has_class(element, class))
    }

    fn extract_identifier(&self, doc: &Document, element: NodeKey) -> Option<VideoId> {
        let href = doc.attribute(element, "href")?;
        let start = memmem::find(href.as_bytes(), WATCH_MARKER.as_bytes())? + WATCH_MARKER.len();
        let id: String = href[start..].chars().take(VIDEO_ID_LEN).collect();
        if id.is_empty() {
            return None;
        }
        Some(VideoId::from(id))
    }

    fn active_identifier(&self, location: &Url) -> Option<VideoId> {
        if location.path() != WATCH_PATH {
            return None;
        }
        location
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .map(VideoId::from)
    }

    fn primary_info(&self, doc: &Document, scope: NodeKey) -> Option<NodeKey> {
        doc.query_first(scope, |d, k| d.tag_name(k) == Some(PRIMARY_INFO_TAG))
    }

    fn title_element(&self, doc: &Document, info: NodeKey) -> Option<NodeKey> {
        let block = Self::title_block(doc, info)?;
        doc.query_first(block, |d, k| d.tag_name(k) == Some(TITLE_TEXT_TAG))
    }

    fn video_title(&self, doc: &Document) -> String {
        self.primary_info(doc, doc.root())
            .and_then(|info| Self::title_block(doc, info))
            .map(|block| doc.text_content(block).trim().to_string())
            .unwrap_or_default()
    }

    fn primary_player(&self, doc: &Document) -> Option<NodeKey> {
        doc.query_first(doc.root(), |d, k| d.tag_name(k) == Some("video"))
    }

    fn is_ad_showing(&self, doc: &Document, player: NodeKey) -> bool {
        doc.closest(player, |d, k| d.element_id(k) == Some(PLAYER_ID))
            .is_some_and(|container| doc.has_class(container, AD_SHOWING_CLASS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(doc: &mut Document, class: &str, href: &str) -> NodeKey {
        let a = doc.create_element("a");
        doc.set_attribute(a, "class", class).unwrap();
        doc.set_attribute(a, "href", href).unwrap();
        a
    }

    #[test]
    fn thumbnails_need_watch_href_and_known_class() {
        let mut doc = Document::new();
        let site = YoutubeSite;
        let grid = link(&mut doc, "yt-simple-endpoint ytd-thumbnail", "/watch?v=AAAAAAAAAAA");
        let end_card = link(
            &mut doc,
            "ytp-ce-covering-overlay",
            "https://www.youtube.com/watch?v=BBBBBBBBBBB&t=3",
        );
        let wall = link(&mut doc, "ytp-videowall-still", "/watch?v=CCCCCCCCCCC");
        let channel = link(&mut doc, "ytd-thumbnail", "/channel/UC123");
        let plain = link(&mut doc, "yt-simple-endpoint", "/watch?v=DDDDDDDDDDD");

        assert!(site.is_video_thumbnail(&doc, grid));
        assert!(site.is_video_thumbnail(&doc, end_card));
        assert!(site.is_video_thumbnail(&doc, wall));
        assert!(!site.is_video_thumbnail(&doc, channel));
        assert!(!site.is_video_thumbnail(&doc, plain));
    }

    #[test]
    fn identifier_is_the_eleven_characters_after_the_marker() {
        let mut doc = Document::new();
        let site = YoutubeSite;
        let a = link(
            &mut doc,
            "ytd-thumbnail",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1&index=2",
        );
        assert_eq!(site.extract_identifier(&doc, a), Some(VideoId::from("dQw4w9WgXcQ")));

        let empty = link(&mut doc, "ytd-thumbnail", "/watch?v=");
        assert_eq!(site.extract_identifier(&doc, empty), None);
    }

    #[test]
    fn active_identifier_only_on_watch_pages() {
        let site = YoutubeSite;
        let watch = Url::parse("https://www.youtube.com/watch?v=AAAAAAAAAAA&t=42s").unwrap();
        let home = Url::parse("https://www.youtube.com/?v=AAAAAAAAAAA").unwrap();
        let no_param = Url::parse("https://www.youtube.com/watch?list=PL1").unwrap();

        assert_eq!(site.active_identifier(&watch), Some(VideoId::from("AAAAAAAAAAA")));
        assert_eq!(site.active_identifier(&home), None);
        assert_eq!(site.active_identifier(&no_param), None);
    }

    #[test]
    fn ad_detection_reads_the_player_container() {
        let mut doc = Document::new();
        let site = YoutubeSite;
        let player = doc.create_element("div");
        doc.set_attribute(player, "id", "movie_player").unwrap();
        let video = doc.create_element("video");
        doc.append_child(player, video).unwrap();

        assert!(!site.is_ad_showing(&doc, video));
        doc.add_class(player, "ad-showing").unwrap();
        assert!(site.is_ad_showing(&doc, video));
    }
}
