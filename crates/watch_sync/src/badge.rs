//! Badge and stylesheet construction. Every function here is idempotent and
//! reports whether it changed the document.

use crate::config::EngineConfig;
use dom::{Document, DomError, NodeKey};

pub fn ensure_thumbnail_badge(
    doc: &mut Document,
    element: NodeKey,
    config: &EngineConfig,
) -> Result<bool, DomError> {
    if find_badge(doc, element, config).is_some() {
        return Ok(false);
    }
    let badge = create_badge(doc, config)?;
    doc.append_child(element, badge)?;
    Ok(true)
}

pub fn ensure_header_badge(
    doc: &mut Document,
    info: NodeKey,
    config: &EngineConfig,
) -> Result<bool, DomError> {
    if doc.style(info, "position") != Some("relative") {
        doc.set_style(info, "position", "relative")?;
    }
    let id = config.header_badge_id.as_str();
    if doc
        .query_first(info, |d, k| d.element_id(k) == Some(id))
        .is_some()
    {
        return Ok(false);
    }
    let badge = create_badge(doc, config)?;
    doc.set_attribute(badge, "id", id)?;
    doc.set_style(badge, "left", "auto")?;
    doc.set_style(badge, "right", "0px")?;
    doc.append_child(info, badge)?;
    Ok(true)
}

/// Appends the stylesheet that hides the site's own resume bar.
pub fn inject_progress_style(doc: &mut Document, config: &EngineConfig) -> Result<bool, DomError> {
    if doc.element_by_id(&config.progress_style_id).is_some() {
        return Ok(false);
    }
    let style = doc.create_element("style");
    doc.set_attribute(style, "id", &config.progress_style_id)?;
    doc.set_text_content(style, &config.hide_progress_css)?;
    let head = doc.head();
    doc.append_child(head, style)?;
    Ok(true)
}

pub fn find_badge(doc: &Document, element: NodeKey, config: &EngineConfig) -> Option<NodeKey> {
    let class = config.badge_class.as_str();
    doc.query_first(element, |d, k| k != element && d.has_class(k, class))
}

fn create_badge(doc: &mut Document, config: &EngineConfig) -> Result<NodeKey, DomError> {
    let badge = doc.create_element("div");
    doc.set_attribute(badge, "class", &config.badge_class)?;
    doc.set_text_content(badge, &config.badge_text)?;
    Ok(badge)
}
