//! Viewport-relative placement for the history overlay.
//!
//! Placement is a two phase negotiation.  We have to position the overlay
//! before its content has loaded, so `place` works from a guessed size and
//! records how much room there is to grow.  Once the content has been
//! rendered and measured, `Placement::fit_content` shrinks the overlay to the
//! content and, when the content turns out taller than the budget, slides it
//! upward into whatever room `place` found above it.
//!
//! Anchor rectangles are in viewport coordinates (what the browser's
//! `getBoundingClientRect` reports) while placements are in document
//! coordinates, so the scroll offsets get folded in here.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Size { width, height }
    }
}

/// The visible part of the document: scroll offsets plus the size of the
/// window.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_left: i32,
    pub scroll_top: i32,
    pub width: i32,
    pub height: i32,
}

/// Which side of the anchor the overlay ended up on vertically.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalSide {
    /// Top edge flush with the anchor's bottom edge.
    Below,
    /// Bottom edge flush with the anchor's top edge.
    Above,
    /// Neither side had enough room; the top is pinned to the scroll top.
    Clamped,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalSide {
    Right,
    Left,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Document x coordinate of the overlay's left edge.
    pub x: i32,
    /// Document y coordinate of the overlay's top edge.
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Widest the overlay may get without leaving the viewport.
    pub max_width: i32,
    /// Tallest the overlay may get at its current `y`.
    pub max_height: i32,
    /// Additional vertical room we can claim by sliding the overlay upward,
    /// i.e. the distance from the viewport top to `y`.  Zero once clamped.
    pub max_up: i32,
    pub vertical: VerticalSide,
    pub horizontal: HorizontalSide,
}

/// Phase 1: position an overlay of (guessed) size `needed` next to `anchor`.
pub fn place(anchor: Rect, needed: Size, viewport: Viewport) -> Placement {
    let space_above = anchor.top.max(0);
    let space_below = (viewport.height - anchor.bottom).max(0);
    let space_right = (viewport.width - anchor.right).max(0);

    let (vertical, top, max_height, max_up) = if needed.height <= space_below {
        (VerticalSide::Below, anchor.bottom, space_below, anchor.bottom.max(0))
    } else if needed.height <= space_above {
        // Below didn't fit, so above is necessarily the roomier side.
        let top = anchor.top - needed.height;
        (VerticalSide::Above, top, needed.height, top)
    } else {
        (VerticalSide::Clamped, 0, viewport.height.max(0), 0)
    };

    // A left placement may not grow back over the anchor it moved away from.
    let (horizontal, left, max_width) = if needed.width <= space_right {
        (HorizontalSide::Right, anchor.right, space_right)
    } else if anchor.left >= needed.width {
        (HorizontalSide::Left, anchor.left - needed.width, needed.width)
    } else {
        (HorizontalSide::Left, 0, needed.width.min(viewport.width).max(0))
    };

    Placement {
        x: viewport.scroll_left + left,
        y: viewport.scroll_top + top,
        width: needed.width.min(max_width),
        height: needed.height.min(max_height),
        max_width,
        max_height,
        max_up,
        vertical,
        horizontal,
    }
}

impl Placement {
    /// Phase 2: re-clamp to the measured content size.
    pub fn fit_content(&self, content: Size) -> Placement {
        let mut fitted = *self;
        fitted.width = content.width.min(self.max_width).max(0);

        // Content taller than the budget claims room above by sliding up.
        let slide = (content.height - self.max_height).max(0).min(self.max_up);
        fitted.max_height = self.max_height + slide;
        fitted.max_up = self.max_up - slide;
        fitted.height = content.height.min(fitted.max_height).max(0);

        match self.vertical {
            VerticalSide::Above => {
                // Keep the bottom edge glued to the anchor.
                fitted.y = self.y + self.max_height - fitted.height;
            }
            VerticalSide::Below | VerticalSide::Clamped => {
                fitted.y = self.y - slide;
            }
        }
        fitted
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}
