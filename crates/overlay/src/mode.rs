use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axemode_state_center::ActivationCenter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::OverlayError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Control,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ctrl" | "control" => Some(Modifier::Control),
            "alt" | "option" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "meta" | "cmd" | "super" => Some(Modifier::Meta),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Modifier::Control => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Meta => "meta",
        }
    }
}

/// A single key pressed with its modifier state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        match modifier {
            Modifier::Control => self.ctrl = true,
            Modifier::Alt => self.alt = true,
            Modifier::Shift => self.shift = true,
            Modifier::Meta => self.meta = true,
        }
        self
    }

    fn holds(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Control => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Meta => self.meta,
        }
    }
}

impl FromStr for KeyPress {
    type Err = OverlayError;

    /// Parses `ctrl+shift+a` style notation into a press; a bare key such as `a` has no
    /// modifiers held.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let mut rest = normalized.as_str();
        let mut held = Vec::new();
        while let Some((head, tail)) = rest.split_once('+') {
            match Modifier::parse(head.trim()) {
                Some(modifier) => {
                    held.push(modifier);
                    rest = tail;
                }
                None => break,
            }
        }
        let key = rest.trim();
        if key.is_empty() || Modifier::parse(key).is_some() {
            return Err(OverlayError::InvalidShortcut(raw.to_string()));
        }
        Ok(held
            .into_iter()
            .fold(KeyPress::new(key), |press, modifier| press.with(modifier)))
    }
}

/// Modifier plus designated key, e.g. `ctrl+.`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ShortcutChord {
    pub modifier: Modifier,
    pub key: String,
}

impl ShortcutChord {
    /// Exact match: the chord's modifier held, no other modifier, same key.
    pub fn matches(&self, press: &KeyPress) -> bool {
        let only_modifier = [
            Modifier::Control,
            Modifier::Alt,
            Modifier::Shift,
            Modifier::Meta,
        ]
        .into_iter()
        .all(|modifier| press.holds(modifier) == (modifier == self.modifier));
        only_modifier && press.key.eq_ignore_ascii_case(&self.key)
    }
}

impl FromStr for ShortcutChord {
    type Err = OverlayError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        // The key itself may be `+`, so split on the first separator only.
        let (modifier, key) = normalized
            .split_once('+')
            .ok_or_else(|| OverlayError::InvalidShortcut(raw.to_string()))?;
        let modifier = Modifier::parse(modifier.trim())
            .ok_or_else(|| OverlayError::InvalidShortcut(raw.to_string()))?;
        let key = key.trim();
        if key.is_empty() || Modifier::parse(key).is_some() {
            return Err(OverlayError::InvalidShortcut(raw.to_string()));
        }
        Ok(Self {
            modifier,
            key: key.to_string(),
        })
    }
}

impl fmt::Display for ShortcutChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.modifier.label(), self.key)
    }
}

/// Flips the interactive flag when the configured chord is pressed.
pub struct ModeToggle {
    chord: ShortcutChord,
    activation: Arc<ActivationCenter>,
}

impl ModeToggle {
    pub fn new(chord: ShortcutChord, activation: Arc<ActivationCenter>) -> Self {
        Self { chord, activation }
    }

    pub fn chord(&self) -> &ShortcutChord {
        &self.chord
    }

    /// Returns the new interactive value when the press matched the chord.
    pub fn handle_key(&self, press: &KeyPress) -> Option<bool> {
        if !self.chord.matches(press) {
            return None;
        }
        let interactive = self.activation.toggle_interactive();
        info!(target: "axemode.overlay", chord = %self.chord, interactive, "mode.toggled");
        Some(interactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axemode_state_center::ActivationFlags;

    #[test]
    fn parses_default_chord() {
        let chord: ShortcutChord = "Ctrl+.".parse().unwrap();
        assert_eq!(chord.modifier, Modifier::Control);
        assert_eq!(chord.key, ".");
        assert_eq!(chord.to_string(), "ctrl+.");

        let plus: ShortcutChord = "alt++".parse().unwrap();
        assert_eq!(plus.key, "+");
    }

    #[test]
    fn rejects_malformed_chords() {
        for raw in ["", ".", "ctrl+", "hyper+x", "ctrl+shift"] {
            assert!(raw.parse::<ShortcutChord>().is_err(), "{raw}");
        }
    }

    #[test]
    fn match_requires_exact_modifiers() {
        let chord: ShortcutChord = "ctrl+.".parse().unwrap();
        assert!(chord.matches(&KeyPress::new(".").with(Modifier::Control)));
        assert!(!chord.matches(&KeyPress::new(".")));
        assert!(!chord.matches(
            &KeyPress::new(".")
                .with(Modifier::Control)
                .with(Modifier::Shift)
        ));
        assert!(!chord.matches(&KeyPress::new(",").with(Modifier::Control)));
    }

    #[test]
    fn key_press_notation() {
        let bare: KeyPress = "a".parse().unwrap();
        assert_eq!(bare, KeyPress::new("a"));

        let chorded: KeyPress = "Ctrl+Shift+A".parse().unwrap();
        assert_eq!(
            chorded,
            KeyPress::new("a").with(Modifier::Control).with(Modifier::Shift)
        );

        let plus: KeyPress = "alt++".parse().unwrap();
        assert_eq!(plus, KeyPress::new("+").with(Modifier::Alt));

        for raw in ["", "ctrl+", "shift"] {
            assert!(raw.parse::<KeyPress>().is_err(), "{raw}");
        }
    }

    #[test]
    fn toggle_flips_interactive_flag() {
        let activation = Arc::new(ActivationCenter::new(ActivationFlags::default()));
        let toggle = ModeToggle::new("ctrl+.".parse().unwrap(), Arc::clone(&activation));
        let press: KeyPress = "ctrl+.".parse().unwrap();

        assert_eq!(toggle.handle_key(&press), Some(true));
        assert!(activation.current().interactive);
        assert_eq!(toggle.handle_key(&KeyPress::new("x")), None);
        assert_eq!(toggle.handle_key(&press), Some(false));
        assert!(!activation.current().interactive);
    }
}
