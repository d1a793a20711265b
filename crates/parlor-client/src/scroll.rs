//! Scroll position tracking for the message list.

/// Vertical scroll adjustment as reported by the toolkit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Adjustment {
    pub value: f64,
    pub upper: f64,
    pub page_size: f64,
}

/// What changed after a scroll or resize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollChange {
    /// The view just reached the last page.
    pub became_bottomed: bool,
    /// The view is at the very top.
    pub at_top: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    bottomed: bool,
}

impl Default for ScrollState {
    // An empty list is at the bottom.
    fn default() -> Self {
        Self {
            bottomed: true,
        }
    }
}

impl ScrollState {
    pub fn is_bottomed(&self) -> bool {
        self.bottomed
    }

    pub fn on_scroll(&mut self, adj: Adjustment) -> ScrollChange {
        let was_bottomed = self.bottomed;
        // Within the last page.
        self.bottomed = adj.upper - (adj.value + adj.page_size) <= adj.page_size;

        ScrollChange {
            became_bottomed: self.bottomed && !was_bottomed,
            at_top: adj.value <= 0.0,
        }
    }

    /// Size changes move the page without a scroll event.
    pub fn on_resize(&mut self, adj: Adjustment) -> ScrollChange {
        self.on_scroll(adj)
    }
}
