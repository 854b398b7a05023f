//! The overlay manager owns every history overlay on the page, keyed by
//! revision window, plus the notion of which one is current.
//!
//! Overlays are created lazily the first time a window is shown and live as
//! long as the manager.  A newly created overlay stays hidden until its
//! history has arrived and been rendered; showing an empty "Loading..."
//! overlay first would make the page jump around once the real content (and
//! the scroll to the highlighted entry) lands.
//!
//! The manager does no I/O.  `show` hands back a `FetchRequest` when a window
//! needs loading and whoever runs the event loop reports the outcome through
//! `complete`.  Rendering output goes to a `Surface`.

use std::collections::HashMap;
use std::fmt::Display;

use chrono::{TimeZone, Utc};

use crate::file_format::vcs_history::HistoryResponse;
use crate::loader::{FetchError, WindowKey};
use crate::placement::{place, Placement, Rect, Size, Viewport};
use crate::render::{entry_anchor, render_error, render_history};

/// What the manager renders into.  In a browser this is the DOM; the CLI
/// prints to stdout and the tests record calls.
pub trait Surface {
    /// Natural size of `html` once laid out.
    fn measure(&mut self, key: &WindowKey, html: &str) -> Size;
    fn show(&mut self, overlay: &Overlay);
    fn hide(&mut self, key: &WindowKey);
}

/// A pointer dwell on a revision link, as reported to the manager.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Trigger {
    pub repository: String,
    pub revision: u64,
    /// Bounding box of the revision link, viewport relative.
    pub anchor: Rect,
    /// Scroll position and window size at the time of the dwell.
    pub viewport: Viewport,
}

#[derive(Clone, Debug)]
pub enum OverlayContent {
    /// The request for the window is in flight.
    Loading,
    Loaded(HistoryResponse),
    /// The request failed; the string is shown to the user.
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct Overlay {
    pub key: WindowKey,
    pub anchor: Rect,
    pub viewport: Viewport,
    pub placement: Placement,
    /// The revision whose trigger most recently asked for this overlay.
    pub highlighted: u64,
    pub content: OverlayContent,
    /// Rendered content; empty while loading.
    pub html: String,
    pub visible: bool,
}

impl Overlay {
    pub fn is_loading(&self) -> bool {
        matches!(self.content, OverlayContent::Loading)
    }

    /// Element id the overlay should scroll into view.
    pub fn scroll_target(&self) -> String {
        entry_anchor(self.highlighted)
    }
}

/// Ask for `count` revisions starting at `key.first_revision`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchRequest {
    pub key: WindowKey,
    pub count: u64,
}

fn render_content<Tz>(content: &OverlayContent, highlighted: u64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match content {
        OverlayContent::Loading => String::new(),
        OverlayContent::Loaded(history) => render_history(history, Some(highlighted), tz),
        OverlayContent::Failed(message) => render_error(message),
    }
}

pub struct OverlayManager<S, Tz = Utc> {
    surface: S,
    tz: Tz,
    window_size: u64,
    initial_size: Size,
    overlays: HashMap<WindowKey, Overlay>,
    current: Option<WindowKey>,
}

impl<S, Tz> OverlayManager<S, Tz>
where
    S: Surface,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    /// `initial_size` is the guess we position a not yet loaded overlay with.
    pub fn new(surface: S, tz: Tz, window_size: u64, initial_size: Size) -> Self {
        OverlayManager {
            surface,
            tz,
            window_size: window_size.max(1),
            initial_size,
            overlays: HashMap::new(),
            current: None,
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    pub fn key_for(&self, repository: &str, revision: u64) -> WindowKey {
        WindowKey::for_revision(repository, revision, self.window_size)
    }

    pub fn current(&self) -> Option<&WindowKey> {
        self.current.as_ref()
    }

    pub fn overlay(&self, key: &WindowKey) -> Option<&Overlay> {
        self.overlays.get(key)
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Make the overlay for `trigger`'s window current, hiding whatever was
    /// current before.  Returns a request when the window has never been
    /// loaded; the overlay then becomes visible from `complete`.
    pub fn show(&mut self, trigger: &Trigger) -> Option<FetchRequest> {
        let key = self.key_for(&trigger.repository, trigger.revision);
        if self.current.as_ref().map_or(false, |cur| *cur != key) {
            self.hide();
        }
        self.current = Some(key.clone());

        if !self.overlays.contains_key(&key) {
            let overlay = Overlay {
                key: key.clone(),
                anchor: trigger.anchor,
                viewport: trigger.viewport,
                placement: place(trigger.anchor, self.initial_size, trigger.viewport),
                highlighted: trigger.revision,
                content: OverlayContent::Loading,
                html: String::new(),
                visible: false,
            };
            self.overlays.insert(key.clone(), overlay);
            tracing::info!("{}: loading for r{}", key, trigger.revision);
            return Some(FetchRequest {
                key,
                count: self.window_size,
            });
        }

        let initial_size = self.initial_size;
        let tz = &self.tz;
        let surface = &mut self.surface;
        let overlay = match self.overlays.get_mut(&key) {
            Some(overlay) => overlay,
            None => return None,
        };
        overlay.anchor = trigger.anchor;
        overlay.viewport = trigger.viewport;
        overlay.highlighted = trigger.revision;
        if overlay.is_loading() {
            tracing::debug!("{}: still loading, r{} will be highlighted", key, trigger.revision);
            return None;
        }

        overlay.html = render_content(&overlay.content, overlay.highlighted, tz);
        let natural = surface.measure(&key, &overlay.html);
        // Same guess-then-fit path as the first show, so an overlay comes
        // back with the geometry it had at the same anchor.
        overlay.placement =
            place(overlay.anchor, initial_size, overlay.viewport).fit_content(natural);
        overlay.visible = true;
        tracing::debug!("{}: showing cached overlay for r{}", key, trigger.revision);
        surface.show(overlay);
        None
    }

    /// Hide the current overlay, if any.  It stays cached.
    pub fn hide(&mut self) {
        let key = match self.current.take() {
            Some(key) => key,
            None => return,
        };
        if let Some(overlay) = self.overlays.get_mut(&key) {
            if overlay.visible {
                overlay.visible = false;
                self.surface.hide(&key);
            }
        }
    }

    /// Record the outcome of a `FetchRequest`.  The overlay is rendered either
    /// way and becomes visible if it is still the current one.
    pub fn complete(&mut self, key: &WindowKey, result: Result<HistoryResponse, FetchError>) {
        let is_current = self.current.as_ref() == Some(key);
        let tz = &self.tz;
        let surface = &mut self.surface;
        let overlay = match self.overlays.get_mut(key) {
            Some(overlay) => overlay,
            None => {
                tracing::debug!("{}: completion for unknown overlay", key);
                return;
            }
        };

        overlay.content = match result {
            Ok(history) => {
                tracing::info!("{}: loaded {} commits", key, history.commits.len());
                OverlayContent::Loaded(history)
            }
            Err(e) => {
                tracing::warn!("{}: {}", key, e);
                OverlayContent::Failed(e.to_string())
            }
        };
        overlay.html = render_content(&overlay.content, overlay.highlighted, tz);
        let natural = surface.measure(key, &overlay.html);
        overlay.placement = overlay.placement.fit_content(natural);

        if is_current {
            overlay.visible = true;
            surface.show(overlay);
        }
    }
}
