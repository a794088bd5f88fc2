//! Pointer state machine for the plot.
//!
//! The pointer is always in exactly one [`PointerState`]. Selection is a
//! separate single slot: it survives hovering, dragging and clicks on
//! empty space, and is only replaced by a click on another point or
//! cleared explicitly.
//!
//! Hit testing is not done here. Callers pass the point under the
//! pointer (if any) with every event.

use postspace_shared::PostId;

/// Movement, in pixels, after which a press turns into a camera drag.
pub const DRAG_THRESHOLD_PX: f64 = 4.0;

pub const EMISSIVE_NONE: u32 = 0x000000;
pub const EMISSIVE_HOVER: u32 = 0x444444;
pub const EMISSIVE_SELECTED: u32 = 0x888800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Orbits when dragged.
    Primary,
    /// Pans when dragged.
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerState {
    Idle,
    Hovering(PostId),
    Pressed {
        button: PointerButton,
        origin: (f64, f64),
        last: (f64, f64),
        hovered: Option<PostId>,
    },
    DraggingCamera {
        button: PointerButton,
        last: (f64, f64),
    },
}

/// Camera motion requested by a drag, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraGesture {
    Orbit { dx: f64, dy: f64 },
    Pan { dx: f64, dy: f64 },
}

/// Side effects of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    HoverChanged(Option<PostId>),
    Selected(PostId),
    Camera(CameraGesture),
}

#[derive(Debug, Clone)]
pub struct Interaction {
    state: PointerState,
    selected: Option<PostId>,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction {
    pub fn new() -> Self {
        Self {
            state: PointerState::Idle,
            selected: None,
        }
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn selected(&self) -> Option<PostId> {
        self.selected
    }

    pub fn hovered(&self) -> Option<PostId> {
        match self.state {
            PointerState::Hovering(id) => Some(id),
            PointerState::Pressed { hovered, .. } => hovered,
            _ => None,
        }
    }

    /// Emissive highlight for a point. Selection outranks hover.
    pub fn emissive_for(&self, id: PostId) -> u32 {
        if self.selected == Some(id) {
            EMISSIVE_SELECTED
        } else if self.hovered() == Some(id) {
            EMISSIVE_HOVER
        } else {
            EMISSIVE_NONE
        }
    }

    pub fn pointer_move(&mut self, pos: (f64, f64), hit: Option<PostId>) -> Vec<Effect> {
        match self.state {
            PointerState::Idle | PointerState::Hovering(_) => {
                let before = self.hovered();
                self.state = match hit {
                    Some(id) => PointerState::Hovering(id),
                    None => PointerState::Idle,
                };
                if before != hit {
                    vec![Effect::HoverChanged(hit)]
                } else {
                    Vec::new()
                }
            }
            PointerState::Pressed {
                button,
                origin,
                hovered,
                ..
            } => {
                let (dx, dy) = (pos.0 - origin.0, pos.1 - origin.1);
                if (dx * dx + dy * dy).sqrt() <= DRAG_THRESHOLD_PX {
                    self.state = PointerState::Pressed {
                        button,
                        origin,
                        last: pos,
                        hovered,
                    };
                    return Vec::new();
                }

                self.state = PointerState::DraggingCamera { button, last: pos };
                let mut effects = Vec::new();
                if hovered.is_some() {
                    effects.push(Effect::HoverChanged(None));
                }
                effects.push(Effect::Camera(gesture(button, dx, dy)));
                effects
            }
            PointerState::DraggingCamera { button, last } => {
                self.state = PointerState::DraggingCamera { button, last: pos };
                vec![Effect::Camera(gesture(button, pos.0 - last.0, pos.1 - last.1))]
            }
        }
    }

    pub fn pointer_down(&mut self, pos: (f64, f64), button: PointerButton) {
        let hovered = self.hovered();
        self.state = PointerState::Pressed {
            button,
            origin: pos,
            last: pos,
            hovered,
        };
    }

    /// Release. A press that never became a drag selects the point under
    /// the pointer; over empty space it does nothing.
    pub fn pointer_up(&mut self, pos: (f64, f64), hit: Option<PostId>) -> Vec<Effect> {
        let was_click = matches!(self.state, PointerState::Pressed { .. });
        let before = self.hovered();
        self.state = match hit {
            Some(id) => PointerState::Hovering(id),
            None => PointerState::Idle,
        };

        let mut effects = Vec::new();
        if before != hit {
            effects.push(Effect::HoverChanged(hit));
        }
        if was_click {
            if let Some(id) = hit {
                self.selected = Some(id);
                effects.push(Effect::Selected(id));
            } else {
                tracing::trace!(x = pos.0, y = pos.1, "click on empty space");
            }
        }
        effects
    }

    /// Pointer left the surface. Any press or drag is abandoned.
    pub fn pointer_leave(&mut self) -> Vec<Effect> {
        let before = self.hovered();
        self.state = PointerState::Idle;
        if before.is_some() {
            vec![Effect::HoverChanged(None)]
        } else {
            Vec::new()
        }
    }

    /// Returns the selection that was cleared, if any.
    pub fn clear_selection(&mut self) -> Option<PostId> {
        self.selected.take()
    }

    /// Drop hover and pointer state after the point set changed, and keep
    /// the selection only if `still_plotted` says its point survived.
    pub fn reset_for_reload(&mut self, still_plotted: impl Fn(PostId) -> bool) -> Option<PostId> {
        self.state = PointerState::Idle;
        match self.selected {
            Some(id) if !still_plotted(id) => self.selected.take(),
            _ => None,
        }
    }
}

fn gesture(button: PointerButton, dx: f64, dy: f64) -> CameraGesture {
    match button {
        PointerButton::Primary => CameraGesture::Orbit { dx, dy },
        PointerButton::Secondary => CameraGesture::Pan { dx, dy },
    }
}
