//! The drag-selection state machine.
//!
//! `Idle → Selecting → Finalized`, with `reset` returning to `Idle` from anywhere.
//! Anchor and current points are stored in backing-store space; the bounding box is
//! always their min/max, so drag direction never matters.

use crate::error::CropError;
use crate::pointer::{PointerEvent, PointerId, PointerPhase};
use crate::viewport::{CssBox, Point, Viewport};

/// Axis-aligned rectangle in backing-store space, not yet clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self {
            x,
            y,
            w: a.x.max(b.x) - x,
            h: a.y.max(b.y) - y,
        }
    }

    /// Clamps to `[0, width] × [0, height]` and snaps to whole pixels.
    pub fn clamp_to(&self, width: u32, height: u32) -> PixelRect {
        let snap = |v: f32, max: u32| -> u32 {
            if v.is_nan() {
                0
            } else {
                v.round().clamp(0.0, max as f32) as u32
            }
        };
        let x0 = snap(self.x, width);
        let y0 = snap(self.y, height);
        let x1 = snap(self.x + self.w, width);
        let y1 = snap(self.y + self.h, height);

        PixelRect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// Integer rectangle guaranteed to lie inside the canvas it was clamped against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionState {
    Idle,
    Selecting {
        pointer: PointerId,
        anchor: Point,
        current: Point,
        /// Layout the gesture started under.
        css_box: CssBox,
    },
    Finalized {
        anchor: Point,
        current: Point,
    },
}

/// What an event did to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    /// Layout was not ready; the event was dropped.
    NotReady,
    Started,
    Moved,
    Finalized,
    Cancelled,
}

impl Transition {
    pub fn needs_redraw(self) -> bool {
        !matches!(self, Transition::Ignored | Transition::NotReady)
    }
}

#[derive(Debug)]
pub struct SelectionController {
    state: SelectionState,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, SelectionState::Selecting { .. })
    }

    pub fn reset(&mut self) {
        if self.state != SelectionState::Idle {
            log::debug!("selection reset from {:?}", self.state);
        }
        self.state = SelectionState::Idle;
    }

    /// The rectangle to draw on the canvas, if any.
    pub fn overlay(&self) -> Option<BoundingBox> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Selecting { anchor, current, .. }
            | SelectionState::Finalized { anchor, current } => {
                Some(BoundingBox::from_corners(anchor, current))
            }
        }
    }

    /// The frozen rectangle; only available once the gesture has ended.
    pub fn finalized(&self) -> Result<BoundingBox, CropError> {
        match self.state {
            SelectionState::Finalized { anchor, current } => {
                Ok(BoundingBox::from_corners(anchor, current))
            }
            _ => Err(CropError::NoSelection),
        }
    }

    /// Advances the state machine. Scale factors are derived from `css_box` on every
    /// call; a gesture whose layout changes underneath it is cancelled.
    pub fn handle(&mut self, event: PointerEvent, viewport: &Viewport, css_box: CssBox) -> Transition {
        if let SelectionState::Selecting { css_box: started, .. } = self.state {
            if !started.approx_eq(&css_box) {
                log::warn!(
                    "canvas layout changed mid-drag ({}x{} -> {}x{}), cancelling selection",
                    started.width,
                    started.height,
                    css_box.width,
                    css_box.height
                );
                self.state = SelectionState::Idle;
                return Transition::Cancelled;
            }
        }

        let Some(position) = viewport.to_backing_coords(event.position, css_box) else {
            log::debug!("pointer {:?} dropped, canvas layout not ready", event.phase);
            return Transition::NotReady;
        };

        match (self.state, event.phase) {
            (SelectionState::Idle | SelectionState::Finalized { .. }, PointerPhase::Down) => {
                self.state = SelectionState::Selecting {
                    pointer: event.pointer,
                    anchor: position,
                    current: position,
                    css_box,
                };
                log::debug!("selection started at ({:.1}, {:.1})", position.x, position.y);
                Transition::Started
            }
            (SelectionState::Selecting { pointer, anchor, .. }, phase) if pointer == event.pointer => {
                match phase {
                    // a repeated press from the same pointer restarts the drag
                    PointerPhase::Down => {
                        self.state = SelectionState::Selecting {
                            pointer,
                            anchor: position,
                            current: position,
                            css_box,
                        };
                        Transition::Started
                    }
                    PointerPhase::Move => {
                        self.state = SelectionState::Selecting {
                            pointer,
                            anchor,
                            current: position,
                            css_box,
                        };
                        Transition::Moved
                    }
                    PointerPhase::Up => {
                        self.state = SelectionState::Finalized {
                            anchor,
                            current: position,
                        };
                        log::debug!("selection finalized: {:?}", self.overlay());
                        Transition::Finalized
                    }
                    PointerPhase::Cancel => {
                        self.state = SelectionState::Idle;
                        Transition::Cancelled
                    }
                }
            }
            _ => Transition::Ignored,
        }
    }
}
