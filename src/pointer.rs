use eframe::egui;

use crate::viewport::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerId {
    Mouse,
    Touch(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// The platform aborted the gesture (e.g. a system swipe stole the touch).
    Cancel,
}

/// A pointer sample in CSS space, relative to the canvas box's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer: PointerId,
    pub phase: PointerPhase,
    pub position: Point,
}

impl PointerEvent {
    pub fn mouse(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            pointer: PointerId::Mouse,
            phase,
            position: Point::new(x, y),
        }
    }

    pub fn touch(id: u64, phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            pointer: PointerId::Touch(id),
            phase,
            position: Point::new(x, y),
        }
    }

    /// Translates a raw egui event over `canvas` (screen rect of the canvas box).
    ///
    /// Presses only count inside the canvas; moves and releases are reported wherever
    /// they happen so drags may end outside it.
    pub fn from_egui(event: &egui::Event, canvas: egui::Rect) -> Option<Self> {
        let relative = |pos: egui::Pos2| Point::new(pos.x - canvas.min.x, pos.y - canvas.min.y);

        match event {
            egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed,
                ..
            } => {
                if *pressed && !canvas.contains(*pos) {
                    return None;
                }
                let phase = if *pressed { PointerPhase::Down } else { PointerPhase::Up };
                Some(Self {
                    pointer: PointerId::Mouse,
                    phase,
                    position: relative(*pos),
                })
            }
            egui::Event::PointerMoved(pos) => Some(Self {
                pointer: PointerId::Mouse,
                phase: PointerPhase::Move,
                position: relative(*pos),
            }),
            egui::Event::Touch { id, phase, pos, .. } => {
                let phase = match phase {
                    egui::TouchPhase::Start => {
                        if !canvas.contains(*pos) {
                            return None;
                        }
                        PointerPhase::Down
                    }
                    egui::TouchPhase::Move => PointerPhase::Move,
                    egui::TouchPhase::End => PointerPhase::Up,
                    egui::TouchPhase::Cancel => PointerPhase::Cancel,
                };
                Some(Self {
                    pointer: PointerId::Touch(id.0),
                    phase,
                    position: relative(*pos),
                })
            }
            _ => None,
        }
    }
}

/// Which pointer, if any, is dragging on the canvas.
///
/// A press only counts when the host's hit test puts it on the canvas itself, not on a
/// popup or toast drawn above it. Moves and releases then follow the owning pointer
/// wherever they go.
#[derive(Debug, Default)]
pub struct CanvasGrab {
    owner: Option<PointerId>,
}

impl CanvasGrab {
    pub fn admit(&mut self, event: PointerEvent, on_canvas: bool) -> Option<PointerEvent> {
        match event.phase {
            PointerPhase::Down => {
                if !on_canvas {
                    return None;
                }
                match self.owner {
                    Some(owner) if owner != event.pointer => None,
                    _ => {
                        self.owner = Some(event.pointer);
                        Some(event)
                    }
                }
            }
            PointerPhase::Move => (self.owner == Some(event.pointer)).then_some(event),
            PointerPhase::Up | PointerPhase::Cancel => {
                if self.owner == Some(event.pointer) {
                    self.owner = None;
                    Some(event)
                } else {
                    None
                }
            }
        }
    }

    /// Forgets the owner, e.g. after the gesture was cancelled underneath it.
    pub fn release(&mut self) {
        self.owner = None;
    }

    pub fn is_held(&self) -> bool {
        self.owner.is_some()
    }
}
