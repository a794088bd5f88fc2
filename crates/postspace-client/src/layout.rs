//! Board layout: plot on the left, detail pane on the right.

/// Narrowest the detail pane may get.
pub const MIN_RIGHT_PANE_PX: f64 = 200.0;
/// Widest the detail pane may get, as a share of the total width.
pub const MAX_RIGHT_PANE_RATIO: f64 = 0.5;
/// Left pane share before the user touches the divider.
pub const DEFAULT_LEFT_PERCENT: f64 = 70.0;

/// Two panes separated by a draggable divider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPane {
    total_width: f64,
    left_percent: f64,
}

impl SplitPane {
    pub fn new(total_width: f64) -> Self {
        let mut pane = Self {
            total_width: total_width.max(0.0),
            left_percent: DEFAULT_LEFT_PERCENT,
        };
        pane.set_right_width(pane.right_width());
        pane
    }

    pub fn total_width(&self) -> f64 {
        self.total_width
    }

    pub fn left_percent(&self) -> f64 {
        self.left_percent
    }

    pub fn left_width(&self) -> f64 {
        self.total_width * self.left_percent / 100.0
    }

    pub fn right_width(&self) -> f64 {
        self.total_width - self.left_width()
    }

    /// Divider dragged to `x` pixels from the left edge.
    pub fn drag_divider_to(&mut self, x: f64) {
        self.set_right_width(self.total_width - x);
    }

    /// Container resized. The right pane keeps its share, re-clamped to
    /// the new width.
    pub fn resize(&mut self, total_width: f64) {
        let share = 1.0 - self.left_percent / 100.0;
        self.total_width = total_width.max(0.0);
        self.set_right_width(self.total_width * share);
    }

    fn set_right_width(&mut self, requested: f64) {
        if self.total_width <= 0.0 {
            self.left_percent = DEFAULT_LEFT_PERCENT;
            return;
        }
        // The minimum wins over the ratio cap on narrow screens.
        let right = requested
            .min(self.total_width * MAX_RIGHT_PANE_RATIO)
            .max(MIN_RIGHT_PANE_PX)
            .min(self.total_width);
        self.left_percent = (self.total_width - right) / self.total_width * 100.0;
    }
}
