// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    /// Converts a page-space box into the space the user currently sees.
    pub fn to_viewport(&self, rect: Rect) -> Rect {
        rect.translate(-self.scroll_x, -self.scroll_y)
    }

    pub fn to_page(&self, point: Point) -> Point {
        Point::new(point.x + self.scroll_x, point.y + self.scroll_y)
    }

    /// Scrolls the minimum distance needed to show `rect` in full.
    pub fn scroll_into_view(&mut self, rect: Rect) {
        if rect.y < self.scroll_y {
            self.scroll_y = rect.y;
        } else if rect.bottom() > self.scroll_y + self.height {
            self.scroll_y = (rect.bottom() - self.height).max(0.0);
        }

        if rect.x < self.scroll_x {
            self.scroll_x = rect.x;
        } else if rect.right() > self.scroll_x + self.width {
            self.scroll_x = (rect.right() - self.width).max(0.0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Below,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WidthPolicy {
    /// Overlay is exactly as wide as its cell.
    MatchCell,
    Fixed(f64),
}

/// Where an overlay lands, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub side: Side,
}

impl Placement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width, self.height)
    }
}

/// Anchors an overlay of `height` to `target`, a box in viewport coordinates.
///
/// Below is preferred. The overlay flips above only when it does not fit
/// below and does fit above.
pub fn place_overlay(
    target: Rect,
    height: f64,
    viewport: &Viewport,
    width: WidthPolicy,
) -> Placement {
    let space_below = viewport.height - target.bottom();
    let space_above = target.y;
    let side = if space_below < height && space_above >= height {
        Side::Above
    } else {
        Side::Below
    };

    let top = match side {
        Side::Below => target.bottom(),
        Side::Above => target.y - height,
    } + viewport.scroll_y;

    let width = match width {
        WidthPolicy::MatchCell => target.width,
        WidthPolicy::Fixed(width) => width,
    };

    Placement {
        top,
        left: target.x + viewport.scroll_x,
        width,
        height,
        side,
    }
}
