//! The site's own markup, for hosts that need to render a page: the demo
//! driver, tests and benches. The engine never calls these.

use dom::{Document, DomError, NodeKey};

#[derive(Clone, Copy, Debug)]
pub struct ThumbnailNodes {
    pub container: NodeKey,
    pub link: NodeKey,
}

/// A grid thumbnail: `<ytd-thumbnail><a class=".. ytd-thumbnail" href>`.
/// The container is returned detached.
pub fn grid_thumbnail(doc: &mut Document, href: &str) -> Result<ThumbnailNodes, DomError> {
    let container = doc.create_element("ytd-thumbnail");
    let link = doc.create_element("a");
    doc.set_attribute(link, "id", "thumbnail")?;
    doc.set_attribute(link, "class", "yt-simple-endpoint inline-block style-scope ytd-thumbnail")?;
    doc.set_attribute(link, "href", href)?;
    let img = doc.create_element("img");
    doc.append_child(link, img)?;
    doc.append_child(container, link)?;
    Ok(ThumbnailNodes { container, link })
}

/// An end-card overlay link shown over the player near the end of a video.
pub fn end_card(doc: &mut Document, href: &str) -> Result<NodeKey, DomError> {
    let link = doc.create_element("a");
    doc.set_attribute(link, "class", "ytp-ce-covering-overlay")?;
    doc.set_attribute(link, "href", href)?;
    Ok(link)
}

#[derive(Clone, Copy, Debug)]
pub struct WatchPageNodes {
    pub player: NodeKey,
    pub video: NodeKey,
    pub info: NodeKey,
    pub title_text: NodeKey,
}

/// The player, then the primary-info region with its title, both appended
/// to `<body>`.
pub fn watch_page(doc: &mut Document, title: &str) -> Result<WatchPageNodes, DomError> {
    let body = doc.body();

    let player = doc.create_element("div");
    doc.set_attribute(player, "id", "movie_player")?;
    doc.set_attribute(player, "class", "html5-video-player")?;
    let video = doc.create_element("video");
    doc.set_attribute(video, "class", "video-stream html5-main-video")?;
    doc.append_child(player, video)?;
    doc.append_child(body, player)?;

    let info = doc.create_element("ytd-video-primary-info-renderer");
    let heading = doc.create_element("h1");
    doc.set_attribute(heading, "class", "title style-scope ytd-video-primary-info-renderer")?;
    let title_text = doc.create_element("yt-formatted-string");
    doc.set_text_content(title_text, title)?;
    doc.append_child(heading, title_text)?;
    doc.append_child(info, heading)?;
    doc.append_child(body, info)?;

    Ok(WatchPageNodes {
        player,
        video,
        info,
        title_text,
    })
}

/// What the site does when the user picks another video in-page.
pub fn retitle(doc: &mut Document, nodes: &WatchPageNodes, title: &str) -> Result<(), DomError> {
    doc.set_text_content(nodes.title_text, title)
}

pub fn set_ad_showing(doc: &mut Document, nodes: &WatchPageNodes, showing: bool) -> Result<(), DomError> {
    if showing {
        doc.add_class(nodes.player, "ad-showing")?;
    } else {
        doc.remove_class(nodes.player, "ad-showing")?;
    }
    Ok(())
}
