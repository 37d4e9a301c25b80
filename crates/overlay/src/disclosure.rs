//! Per-marker open/closed state for the detail panel.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureState {
    #[default]
    Closed,
    Open,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureMode {
    /// Hover-driven; the marker is not focusable.
    #[default]
    Passive,
    /// Press/keyboard-driven; the marker is a focusable button.
    Interactive,
}

/// Where a press or a focus move landed, relative to one marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitRegion {
    Marker,
    Panel,
    PanelClose,
    Outside,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Auxiliary,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enter,
    Space,
    Other(String),
}

impl Key {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "enter" | "return" => Key::Enter,
            "space" | " " | "spacebar" => Key::Space,
            other => Key::Other(other.to_string()),
        }
    }

    fn activates(&self) -> bool {
        matches!(self, Key::Enter | Key::Space)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisclosureEvent {
    PointerEnter,
    PointerLeave,
    Press {
        region: HitRegion,
        #[serde(default)]
        button: PointerButton,
    },
    Key {
        key: Key,
        /// Whether the marker holds keyboard focus.
        #[serde(default = "focused_default")]
        focused: bool,
    },
    FocusLost {
        to: HitRegion,
    },
}

fn focused_default() -> bool {
    true
}

impl DisclosureEvent {
    pub fn press(region: HitRegion) -> Self {
        DisclosureEvent::Press {
            region,
            button: PointerButton::Primary,
        }
    }

    pub fn key(key: Key) -> Self {
        DisclosureEvent::Key { key, focused: true }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Disclosure {
    mode: DisclosureMode,
    state: DisclosureState,
}

impl Disclosure {
    pub fn new(mode: DisclosureMode) -> Self {
        Self {
            mode,
            state: DisclosureState::Closed,
        }
    }

    pub fn mode(&self) -> DisclosureMode {
        self.mode
    }

    pub fn state(&self) -> DisclosureState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DisclosureState::Open
    }

    pub fn focusable(&self) -> bool {
        self.mode == DisclosureMode::Interactive
    }

    /// Applies one event. Returns the new state when the event caused a transition.
    pub fn handle(&mut self, event: &DisclosureEvent) -> Option<DisclosureState> {
        let next = self.next_state(event)?;
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }

    /// Forces the panel closed, e.g. when the marker is torn down.
    pub fn close(&mut self) -> bool {
        let was_open = self.is_open();
        self.state = DisclosureState::Closed;
        was_open
    }

    fn toggled(&self) -> DisclosureState {
        match self.state {
            DisclosureState::Open => DisclosureState::Closed,
            DisclosureState::Closed => DisclosureState::Open,
        }
    }

    fn next_state(&self, event: &DisclosureEvent) -> Option<DisclosureState> {
        match self.mode {
            DisclosureMode::Passive => match event {
                DisclosureEvent::PointerEnter => Some(DisclosureState::Open),
                DisclosureEvent::PointerLeave => Some(DisclosureState::Closed),
                _ => None,
            },
            DisclosureMode::Interactive => match event {
                DisclosureEvent::Press { region, button } => match (region, button) {
                    (HitRegion::Marker, PointerButton::Primary) => Some(self.toggled()),
                    (HitRegion::PanelClose, PointerButton::Primary) => {
                        Some(DisclosureState::Closed)
                    }
                    (HitRegion::Outside, _) => Some(DisclosureState::Closed),
                    _ => None,
                },
                DisclosureEvent::Key { key, focused: true } if key.activates() => {
                    Some(self.toggled())
                }
                DisclosureEvent::FocusLost {
                    to: HitRegion::Outside,
                } => Some(DisclosureState::Closed),
                _ => None,
            },
        }
    }
}
