//! Arena-backed live document.
//!
//! Nodes are addressed by `NodeKey` and never move. Removing a node detaches
//! it (it stays addressable and may be re-inserted); `release` drops a
//! detached subtree from the arena for good. Every structural and attribute
//! write queues mutation records for the observers covering the changed node.

use crate::error::DomError;
use crate::mutation::{MutationBatch, MutationRecord, ObserveOptions, ObserverId, ObserverRegistry};
use crate::types::{NodeKey, NodeKind, NodeRecord};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Document {
    nodes: HashMap<NodeKey, NodeRecord>,
    root: NodeKey,
    head: NodeKey,
    body: NodeKey,
    next_key: u32,
    observers: ObserverRegistry,
}

impl Document {
    /// An empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: HashMap::new(),
            root: NodeKey::INVALID,
            head: NodeKey::INVALID,
            body: NodeKey::INVALID,
            next_key: 1,
            observers: ObserverRegistry::default(),
        };
        doc.root = doc.insert_record(NodeKind::Document);
        let html = doc.create_element("html");
        doc.head = doc.create_element("head");
        doc.body = doc.create_element("body");
        doc.link(doc.root, html, None);
        doc.link(html, doc.head, None);
        doc.link(html, doc.body, None);
        doc
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn head(&self) -> NodeKey {
        self.head
    }

    pub fn body(&self) -> NodeKey {
        self.body
    }

    pub fn create_element(&mut self, name: &str) -> NodeKey {
        self.insert_record(element_kind(name))
    }

    pub fn create_text(&mut self, text: &str) -> NodeKey {
        self.insert_record(NodeKind::Text {
            text: text.to_string(),
        })
    }

    fn insert_record(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        self.nodes.insert(key, NodeRecord::new(kind));
        key
    }

    // -- Tree mutation ---

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        self.insert_child(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: NodeKey,
    ) -> Result<(), DomError> {
        self.insert_child(parent, child, Some(before))
    }

    fn insert_child(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: Option<NodeKey>,
    ) -> Result<(), DomError> {
        if !self.node(parent)?.allows_children() {
            return Err(DomError::InvalidParent(parent));
        }
        if matches!(self.node(child)?.kind, NodeKind::Document) {
            return Err(DomError::InvalidParent(child));
        }
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(DomError::CycleDetected { parent, child });
        }
        if let Some(before) = before {
            if self.node(before)?.parent != Some(parent) || before == child {
                return Err(DomError::InvalidSibling { parent, before });
            }
        }
        // Moving an attached node removes it from its old parent first.
        self.remove(child)?;
        self.link(parent, child, before);
        self.emit(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    fn link(&mut self, parent: NodeKey, child: NodeKey, before: Option<NodeKey>) {
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            let pos = before
                .and_then(|b| parent_node.children.iter().position(|k| *k == b))
                .unwrap_or(parent_node.children.len());
            parent_node.children.insert(pos, child);
        }
        if let Some(child_node) = self.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }
    }

    /// Detaches `key` from its parent. Detaching a parentless node is a no-op.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), DomError> {
        let Some(parent) = self.node(key)?.parent else {
            return Ok(());
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|k| *k != key);
        }
        if let Some(node) = self.nodes.get_mut(&key) {
            node.parent = None;
        }
        self.emit(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![key],
        });
        Ok(())
    }

    /// Drops a detached subtree from the arena. Its keys are never reused.
    pub fn release(&mut self, key: NodeKey) -> Result<(), DomError> {
        if self.node(key)?.parent.is_some() || key == self.root {
            return Err(DomError::InvalidParent(key));
        }
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Replaces all children of `key` with a single text node.
    pub fn set_text_content(&mut self, key: NodeKey, text: &str) -> Result<(), DomError> {
        if !self.node(key)?.allows_children() {
            return self.set_text(key, text);
        }
        let removed = std::mem::take(&mut self.node_mut(key)?.children);
        for child in &removed {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
            }
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_key = self.create_text(text);
            self.link(key, text_key, None);
            added.push(text_key);
        }
        if !added.is_empty() || !removed.is_empty() {
            self.emit(MutationRecord::ChildList {
                target: key,
                added,
                removed,
            });
        }
        Ok(())
    }

    pub(crate) fn set_text(&mut self, key: NodeKey, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(key)?.kind {
            NodeKind::Text { text: existing } => {
                existing.clear();
                existing.push_str(text);
                Ok(())
            }
            _ => Err(DomError::WrongNodeKind(key)),
        }
    }

    // -- Attributes ---

    pub fn set_attribute(&mut self, key: NodeKey, name: &str, value: &str) -> Result<(), DomError> {
        let old_value = match &mut self.node_mut(key)?.kind {
            NodeKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                    Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
                    None => {
                        attributes.push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
                        None
                    }
                }
            }
            _ => return Err(DomError::WrongNodeKind(key)),
        };
        self.emit(MutationRecord::Attributes {
            target: key,
            name: Arc::from(name.to_ascii_lowercase()),
            old_value,
        });
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&mut self, key: NodeKey, name: &str) -> Result<bool, DomError> {
        let old_value = match &mut self.node_mut(key)?.kind {
            NodeKind::Element { attributes, .. } => {
                let Some(pos) = attributes.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
                else {
                    return Ok(false);
                };
                attributes.remove(pos).1
            }
            _ => return Err(DomError::WrongNodeKind(key)),
        };
        self.emit(MutationRecord::Attributes {
            target: key,
            name: Arc::from(name.to_ascii_lowercase()),
            old_value: Some(old_value),
        });
        Ok(true)
    }

    pub fn attribute(&self, key: NodeKey, name: &str) -> Option<&str> {
        self.nodes.get(&key).and_then(|node| node.attribute(name))
    }

    pub fn has_class(&self, key: NodeKey, class: &str) -> bool {
        self.attribute(key, "class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
    }

    /// Adds a class token. Writes (and notifies) only when the token was missing.
    pub fn add_class(&mut self, key: NodeKey, class: &str) -> Result<bool, DomError> {
        if self.has_class(key, class) {
            return Ok(false);
        }
        let mut value = self.attribute(key, "class").unwrap_or_default().trim().to_string();
        if !value.is_empty() {
            value.push(' ');
        }
        value.push_str(class);
        self.set_attribute(key, "class", &value)?;
        Ok(true)
    }

    /// Removes a class token. Writes (and notifies) only when the token was present.
    pub fn remove_class(&mut self, key: NodeKey, class: &str) -> Result<bool, DomError> {
        if !self.has_class(key, class) {
            return Ok(false);
        }
        let value = self
            .attribute(key, "class")
            .unwrap_or_default()
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(key, "class", &value)?;
        Ok(true)
    }

    /// Sets one inline style property, keeping the others.
    pub fn set_style(&mut self, key: NodeKey, property: &str, value: &str) -> Result<(), DomError> {
        let mut declarations: Vec<(String, String)> = self
            .attribute(key, "style")
            .unwrap_or_default()
            .split(';')
            .filter_map(|decl| {
                let (name, val) = decl.split_once(':')?;
                Some((name.trim().to_string(), val.trim().to_string()))
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();
        match declarations.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(property)) {
            Some((_, existing)) => *existing = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        let style = declarations
            .iter()
            .map(|(name, val)| format!("{name}: {val}"))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attribute(key, "style", &style)
    }

    pub fn style(&self, key: NodeKey, property: &str) -> Option<&str> {
        self.attribute(key, "style")?
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, val)| val.trim())
    }

    // -- Inspection ---

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Whether `key` is live and reachable from the document root.
    pub fn is_connected(&self, key: NodeKey) -> bool {
        self.contains(key) && (key == self.root || self.ancestors(key).last() == Some(&self.root))
    }

    pub fn is_element(&self, key: NodeKey) -> bool {
        matches!(
            self.nodes.get(&key).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    pub fn tag_name(&self, key: NodeKey) -> Option<&str> {
        match &self.nodes.get(&key)?.kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn element_id(&self, key: NodeKey) -> Option<&str> {
        self.attribute(key, "id")
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&key)?.parent
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes
            .get(&key)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Ancestors of `key`, nearest first, excluding `key` itself.
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.parent(key);
        while let Some(k) = current {
            out.push(k);
            current = self.parent(k);
        }
        out
    }

    pub fn text_content(&self, key: NodeKey) -> String {
        let mut out = String::new();
        for k in self.descendants(key) {
            if let Some(NodeKind::Text { text }) = self.nodes.get(&k).map(|n| &n.kind) {
                out.push_str(text);
            }
        }
        out
    }

    /// Pre-order traversal of `root` and everything below it.
    pub fn descendants(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        if !self.contains(root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Elements in `root`'s subtree (inclusive) matching `pred`, in document order.
    pub fn query_all(&self, root: NodeKey, pred: impl Fn(&Document, NodeKey) -> bool) -> Vec<NodeKey> {
        self.descendants(root)
            .into_iter()
            .filter(|k| self.is_element(*k) && pred(self, *k))
            .collect()
    }

    pub fn query_first(
        &self,
        root: NodeKey,
        pred: impl Fn(&Document, NodeKey) -> bool,
    ) -> Option<NodeKey> {
        self.descendants(root)
            .into_iter()
            .find(|k| self.is_element(*k) && pred(self, *k))
    }

    /// Nearest inclusive ancestor element matching `pred`.
    pub fn closest(&self, key: NodeKey, pred: impl Fn(&Document, NodeKey) -> bool) -> Option<NodeKey> {
        std::iter::once(key)
            .chain(self.ancestors(key))
            .find(|k| self.is_element(*k) && pred(self, *k))
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeKey> {
        self.query_first(self.root, |doc, k| doc.element_id(k) == Some(id))
    }

    // -- Observers ---

    pub fn create_observer(&mut self) -> ObserverId {
        self.observers.create()
    }

    pub fn observe(
        &mut self,
        observer: ObserverId,
        target: NodeKey,
        options: ObserveOptions,
    ) -> Result<(), DomError> {
        self.node(target)?;
        if !self.observers.observe(observer, target, options) {
            return Err(DomError::UnknownObserver(observer));
        }
        log::trace!(target: "dom.observer", "observer {observer:?} observing {target:?}");
        Ok(())
    }

    pub fn disconnect(&mut self, observer: ObserverId) {
        log::trace!(target: "dom.observer", "observer {observer:?} disconnected");
        self.observers.disconnect(observer);
    }

    pub fn is_observing(&self, observer: ObserverId) -> bool {
        self.observers.is_observing(observer)
    }

    pub fn has_observer(&self, observer: ObserverId) -> bool {
        self.observers.contains(observer)
    }

    pub fn has_pending_records(&self) -> bool {
        self.observers.has_pending()
    }

    /// Hands out every queued record, one batch per observer.
    pub fn take_records(&mut self) -> Vec<MutationBatch> {
        self.observers.take()
    }

    fn emit(&mut self, record: MutationRecord) {
        let target = record.target();
        let mut path = vec![target];
        path.extend(self.ancestors(target));
        self.observers.queue(&record, &path);
    }

    fn node(&self, key: NodeKey) -> Result<&NodeRecord, DomError> {
        if key == NodeKey::INVALID {
            return Err(DomError::InvalidKey(key));
        }
        self.nodes.get(&key).ok_or(DomError::MissingKey(key))
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut NodeRecord, DomError> {
        if key == NodeKey::INVALID {
            return Err(DomError::InvalidKey(key));
        }
        self.nodes.get_mut(&key).ok_or(DomError::MissingKey(key))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn element_kind(name: &str) -> NodeKind {
    NodeKind::Element {
        name: Arc::from(name.to_ascii_lowercase()),
        attributes: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn div_with_class(doc: &mut Document, class: &str) -> NodeKey {
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", class).unwrap();
        div
    }

    #[test]
    fn skeleton_is_connected() {
        let doc = Document::new();
        assert!(doc.is_connected(doc.body()));
        assert!(doc.is_connected(doc.head()));
        assert_eq!(doc.tag_name(doc.body()), Some("body"));
    }

    #[test]
    fn detached_nodes_are_live_but_not_connected() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        assert!(doc.contains(div));
        assert!(!doc.is_connected(div));

        let body = doc.body();
        doc.append_child(body, div).unwrap();
        assert!(doc.is_connected(div));

        doc.remove(div).unwrap();
        assert!(!doc.is_connected(div));
        doc.release(div).unwrap();
        assert!(!doc.contains(div));
    }

    #[test]
    fn keys_are_never_reused_after_release() {
        let mut doc = Document::new();
        let first = doc.create_element("div");
        doc.release(first).unwrap();
        let second = doc.create_text("x");
        assert!(second > first);
        assert_eq!(doc.remove(first), Err(DomError::MissingKey(first)));
        assert_eq!(
            doc.set_attribute(NodeKey::INVALID, "id", "x"),
            Err(DomError::InvalidKey(NodeKey::INVALID))
        );
    }

    #[test]
    fn release_requires_detached_node() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let body = doc.body();
        doc.append_child(body, div).unwrap();
        assert_eq!(doc.release(div), Err(DomError::InvalidParent(div)));
    }

    #[test]
    fn append_rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert_eq!(
            doc.append_child(inner, outer),
            Err(DomError::CycleDetected {
                parent: inner,
                child: outer
            })
        );
    }

    #[test]
    fn text_nodes_cannot_have_children() {
        let mut doc = Document::new();
        let text = doc.create_text("hi");
        let div = doc.create_element("div");
        assert_eq!(doc.append_child(text, div), Err(DomError::InvalidParent(text)));
    }

    #[test]
    fn insert_before_orders_children() {
        let mut doc = Document::new();
        let list = doc.create_element("ul");
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        doc.append_child(list, b).unwrap();
        doc.insert_before(list, a, b).unwrap();
        assert_eq!(doc.children(list), &[a, b]);
    }

    #[test]
    fn class_tokens_are_edited_in_place() {
        let mut doc = Document::new();
        let div = div_with_class(&mut doc, "one two");
        assert!(doc.add_class(div, "three").unwrap());
        assert!(!doc.add_class(div, "two").unwrap());
        assert!(doc.remove_class(div, "one").unwrap());
        assert_eq!(doc.attribute(div, "class"), Some("two three"));
        assert!(!doc.has_class(div, "one"));
    }

    #[test]
    fn style_properties_merge() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_style(div, "left", "auto").unwrap();
        doc.set_style(div, "right", "0px").unwrap();
        doc.set_style(div, "left", "1px").unwrap();
        assert_eq!(doc.style(div, "left"), Some("1px"));
        assert_eq!(doc.style(div, "right"), Some("0px"));
    }

    #[test]
    fn text_content_replaces_children() {
        let mut doc = Document::new();
        let title = doc.create_element("h1");
        let span = doc.create_element("span");
        doc.append_child(title, span).unwrap();
        doc.set_text_content(title, "New title").unwrap();
        assert_eq!(doc.children(title).len(), 1);
        assert_eq!(doc.text_content(title), "New title");
        assert_eq!(doc.parent(span), None);
    }

    #[test]
    fn queries_include_the_root_and_keep_document_order() {
        let mut doc = Document::new();
        let outer = div_with_class(&mut doc, "hit");
        let a = div_with_class(&mut doc, "hit");
        let b = div_with_class(&mut doc, "miss");
        doc.append_child(outer, a).unwrap();
        doc.append_child(outer, b).unwrap();

        let hits = doc.query_all(outer, |d, k| d.has_class(k, "hit"));
        assert_eq!(hits, vec![outer, a]);
        assert_eq!(doc.closest(a, |d, k| d.has_class(k, "hit")), Some(a));
        assert_eq!(doc.closest(b, |d, k| d.has_class(k, "hit")), Some(outer));
    }

    #[test]
    fn subtree_observer_sees_child_list_and_filtered_attributes() {
        let mut doc = Document::new();
        let observer = doc.create_observer();
        let body = doc.body();
        doc.observe(
            observer,
            body,
            ObserveOptions::child_list()
                .with_attributes(&["class", "href"])
                .with_subtree(),
        )
        .unwrap();

        let link = doc.create_element("a");
        doc.append_child(body, link).unwrap();
        doc.set_attribute(link, "href", "/watch?v=AAAAAAAAAAA").unwrap();
        doc.set_attribute(link, "title", "ignored").unwrap();

        let batches = doc.take_records();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].records,
            vec![
                MutationRecord::ChildList {
                    target: body,
                    added: vec![link],
                    removed: Vec::new(),
                },
                MutationRecord::Attributes {
                    target: link,
                    name: Arc::from("href"),
                    old_value: None,
                },
            ]
        );
        assert!(!doc.has_pending_records());
    }

    #[test]
    fn detached_subtrees_do_not_notify_document_observers() {
        let mut doc = Document::new();
        let observer = doc.create_observer();
        let root = doc.root();
        doc.observe(observer, root, ObserveOptions::default().with_attributes(&[]).with_subtree())
            .unwrap();

        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "x").unwrap();
        assert!(!doc.has_pending_records());
    }

    #[test]
    fn observe_unknown_target_fails() {
        let mut doc = Document::new();
        let observer = doc.create_observer();
        assert_eq!(
            doc.observe(observer, NodeKey(9999), ObserveOptions::child_list()),
            Err(DomError::MissingKey(NodeKey(9999)))
        );
    }
}
