// Touch-to-pointer translation.
// Converts raw touch input into the same synthetic pointer/drag event stream a
// mouse produces, so the reorder engine never needs to know where input came from.

use crate::modules::dom::{Document, ElementId, Point};

pub const DEFAULT_DRAG_THRESHOLD_PX: f64 = 5.0;
pub const DEFAULT_DRAG_OPACITY: f64 = 0.5;
pub const DEFAULT_DOUBLE_CLICK_MS: u64 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// One raw touch sample (the first changed touch of a touch event).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchInput {
    pub phase: TouchPhase,
    pub target: ElementId,
    pub client: Point,
    pub screen: Point,
    pub timestamp_ms: u64,
}

impl TouchInput {
    pub fn new(phase: TouchPhase, target: ElementId, client: Point, timestamp_ms: u64) -> Self {
        Self {
            phase,
            target,
            client,
            screen: client,
            timestamp_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticKind {
    PointerDown,
    PointerMove,
    PointerUp,
    Click,
    DoubleClick,
    DragStart,
    DragOver,
    Drop,
    DragEnd,
}

/// Event shape shared by native pointer input and translated touch input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticEvent {
    pub kind: SyntheticKind,
    pub target: ElementId,
    pub client: Point,
    pub screen: Point,
    pub timestamp_ms: u64,
}

impl SyntheticEvent {
    pub fn new(kind: SyntheticKind, target: ElementId, client: Point, timestamp_ms: u64) -> Self {
        Self {
            kind,
            target,
            client,
            screen: client,
            timestamp_ms,
        }
    }

    fn from_touch(kind: SyntheticKind, target: ElementId, input: &TouchInput) -> Self {
        Self {
            kind,
            target,
            client: input.client,
            screen: input.screen,
            timestamp_ms: input.timestamp_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TouchConfig {
    /// Movement along either axis needed before a drag starts.
    pub threshold_px: f64,
    /// Opacity applied to the dragged element while the finger is down.
    pub drag_opacity: f64,
    pub double_click_ms: u64,
    /// Classes that make an element (or its ancestor) a drop target, in
    /// addition to anything draggable.
    pub drop_target_classes: Vec<String>,
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            drag_opacity: DEFAULT_DRAG_OPACITY,
            double_click_ms: DEFAULT_DOUBLE_CLICK_MS,
            drop_target_classes: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchState {
    Idle,
    Tracking {
        origin: Point,
        /// Raw element the finger landed on; receives pointer and click events.
        target: ElementId,
        /// Closest draggable ancestor of `target`, if any.
        draggable: Option<ElementId>,
    },
    Dragging {
        target: ElementId,
        dragged: ElementId,
        drop_target: Option<ElementId>,
    },
}

#[derive(Debug)]
pub struct TouchTranslator {
    config: TouchConfig,
    state: TouchState,
    last_click_ms: Option<u64>,
}

impl Default for TouchTranslator {
    fn default() -> Self {
        Self::new(TouchConfig::default())
    }
}

impl TouchTranslator {
    pub fn new(config: TouchConfig) -> Self {
        Self {
            config,
            state: TouchState::Idle,
            last_click_ms: None,
        }
    }

    pub fn state(&self) -> TouchState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, TouchState::Dragging { .. })
    }

    pub fn config(&self) -> &TouchConfig {
        &self.config
    }

    /// Feeds one touch sample through the state machine and returns the
    /// synthetic events it produced, in dispatch order.
    pub fn handle(&mut self, doc: &mut Document, input: &TouchInput) -> Vec<SyntheticEvent> {
        let mut out = Vec::new();

        match (self.state, input.phase) {
            (TouchState::Idle, TouchPhase::Start) => {
                let draggable = doc.closest(input.target, |d, e| d.is_draggable(e));
                self.state = TouchState::Tracking {
                    origin: input.client,
                    target: input.target,
                    draggable,
                };
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerDown, input.target, input));
            }
            (_, TouchPhase::Start) => {
                log::debug!("[Touch] Ignoring touch start while a gesture is in progress");
            }
            (TouchState::Idle, _) => {}

            (
                TouchState::Tracking {
                    origin,
                    target,
                    draggable,
                },
                TouchPhase::Move,
            ) => {
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerMove, target, input));

                let dx = (input.client.x - origin.x).abs();
                let dy = (input.client.y - origin.y).abs();
                let past_threshold = dx > self.config.threshold_px || dy > self.config.threshold_px;

                if let (true, Some(dragged)) = (past_threshold, draggable) {
                    log::debug!("[Touch] Drag started on {:?}", dragged);
                    out.push(SyntheticEvent::from_touch(SyntheticKind::DragStart, dragged, input));
                    doc.set_opacity(dragged, Some(self.config.drag_opacity));
                    self.state = TouchState::Dragging {
                        target,
                        dragged,
                        drop_target: None,
                    };
                    self.track_drop_target(doc, input, &mut out);
                }
            }
            (TouchState::Dragging { target, .. }, TouchPhase::Move) => {
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerMove, target, input));
                self.track_drop_target(doc, input, &mut out);
            }

            (TouchState::Tracking { target, .. }, TouchPhase::End) => {
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerUp, target, input));
                out.push(SyntheticEvent::from_touch(SyntheticKind::Click, target, input));

                let now = input.timestamp_ms;
                let is_double = self
                    .last_click_ms
                    .is_some_and(|last| now.saturating_sub(last) < self.config.double_click_ms);
                if is_double {
                    out.push(SyntheticEvent::from_touch(SyntheticKind::DoubleClick, target, input));
                }
                self.last_click_ms = Some(now);
                self.state = TouchState::Idle;
            }
            (
                TouchState::Dragging {
                    target,
                    dragged,
                    drop_target,
                },
                TouchPhase::End,
            ) => {
                if let Some(drop) = drop_target {
                    out.push(SyntheticEvent::from_touch(SyntheticKind::Drop, drop, input));
                }
                out.push(SyntheticEvent::from_touch(SyntheticKind::DragEnd, dragged, input));
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerUp, target, input));
                doc.set_opacity(dragged, None);
                self.state = TouchState::Idle;
            }

            (TouchState::Tracking { target, .. }, TouchPhase::Cancel) => {
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerUp, target, input));
                self.state = TouchState::Idle;
            }
            (TouchState::Dragging { target, dragged, .. }, TouchPhase::Cancel) => {
                log::debug!("[Touch] Drag cancelled on {:?}", dragged);
                out.push(SyntheticEvent::from_touch(SyntheticKind::DragEnd, dragged, input));
                out.push(SyntheticEvent::from_touch(SyntheticKind::PointerUp, target, input));
                doc.set_opacity(dragged, None);
                self.state = TouchState::Idle;
            }
        }

        out
    }

    /// Updates the drop candidate under the finger, emitting `DragOver` when
    /// the finger enters a new accepted target.
    fn track_drop_target(&mut self, doc: &Document, input: &TouchInput, out: &mut Vec<SyntheticEvent>) {
        let config = &self.config;
        let TouchState::Dragging { drop_target, .. } = &mut self.state else {
            return;
        };
        let candidate = doc
            .element_from_point(input.client)
            .and_then(|hit| doc.closest(hit, |d, e| is_drop_target(config, d, e)));

        if candidate != *drop_target {
            *drop_target = candidate;
            if let Some(over) = candidate {
                out.push(SyntheticEvent::from_touch(SyntheticKind::DragOver, over, input));
            }
        }
    }
}

fn is_drop_target(config: &TouchConfig, doc: &Document, el: ElementId) -> bool {
    doc.is_draggable(el) || config.drop_target_classes.iter().any(|c| doc.has_class(el, c))
}
