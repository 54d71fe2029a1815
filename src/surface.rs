//! Off-screen rendering surface
//!
//! A [`Document`] stands in for the host page. Captures attach a
//! [`Container`] positioned far outside the viewport, render it, and detach
//! it again. Attachment is represented by an [`AttachedContainer`] guard that
//! detaches on drop, so a container can never outlive the capture that
//! created it, whichever way the capture exits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::config::Color;

/// Width of the email body in CSS pixels
pub const EMAIL_WIDTH: u32 = 600;
/// Padding around the email body in CSS pixels
pub const CONTAINER_PADDING: u32 = 20;
/// Horizontal offset that keeps the container out of the viewport
pub const OFFSCREEN_LEFT: i32 = -9999;

/// Box styling of an off-screen container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStyle {
    pub left: i32,
    pub top: i32,
    /// Content width (padding excluded)
    pub width: u32,
    pub padding: u32,
    pub background: Color,
}

impl ContainerStyle {
    /// The standard email preview box: 600px wide, padded, out of view
    pub fn email(background: Color) -> Self {
        Self {
            left: OFFSCREEN_LEFT,
            top: 0,
            width: EMAIL_WIDTH,
            padding: CONTAINER_PADDING,
            background,
        }
    }

    /// Full box width including padding
    pub fn outer_width(&self) -> u32 {
        self.width + self.padding * 2
    }

    pub fn to_css(&self) -> String {
        format!(
            "position: absolute; left: {}px; top: {}px; width: {}px; padding: {}px; background-color: {};",
            self.left, self.top, self.width, self.padding, self.background
        )
    }
}

/// An element holding markup to be rendered
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub style: ContainerStyle,
    pub content: String,
}

impl Container {
    pub fn new(style: ContainerStyle, content: impl Into<String>) -> Self {
        Self {
            style,
            content: content.into(),
        }
    }

    /// Standalone page reproducing this container, used by browser backends
    pub fn to_page_html(&self) -> String {
        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\
             <body style=\"margin: 0;\"><div id=\"mailpreview-capture\" style=\"{}\">{}</div></body></html>",
            self.style.to_css(),
            self.content
        )
    }
}

type ContainerId = u64;

#[derive(Default)]
struct DocumentInner {
    next_id: AtomicU64,
    attached: Mutex<BTreeMap<ContainerId, Container>>,
}

/// Host document that containers are attached to while they render
///
/// Cloning yields another handle to the same document.
#[derive(Clone, Default)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn attached(&self) -> MutexGuard<'_, BTreeMap<ContainerId, Container>> {
        // A poisoned lock only means a panic happened mid-update of a plain map
        self.inner
            .attached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach `container`; it stays attached until the guard is dropped
    pub fn attach(&self, container: Container) -> AttachedContainer {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.attached().insert(id, container);
        debug!("Attached off-screen container #{}", id);
        AttachedContainer {
            document: self.clone(),
            id,
            detached: false,
        }
    }

    /// Number of containers currently attached
    pub fn attached_count(&self) -> usize {
        self.attached().len()
    }

    fn detach(&self, id: ContainerId) -> Option<Container> {
        let removed = self.attached().remove(&id);
        if removed.is_some() {
            debug!("Detached off-screen container #{}", id);
        }
        removed
    }
}

/// A container attached to a [`Document`]; detaches on drop
pub struct AttachedContainer {
    document: Document,
    id: ContainerId,
    detached: bool,
}

impl AttachedContainer {
    /// Copy of the container as currently attached
    pub fn snapshot(&self) -> Option<Container> {
        self.document.attached().get(&self.id).cloned()
    }

    /// Replace the container's markup
    pub fn set_content(&self, content: impl Into<String>) {
        if let Some(c) = self.document.attached().get_mut(&self.id) {
            c.content = content.into();
        }
    }

    /// Detach now, returning the container
    pub fn detach(mut self) -> Option<Container> {
        self.detached = true;
        self.document.detach(self.id)
    }
}

impl Drop for AttachedContainer {
    fn drop(&mut self) {
        if !self.detached {
            self.document.detach(self.id);
        }
    }
}
