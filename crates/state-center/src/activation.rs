//! Activation flag container.
//!
//! The `disabled` and `interactive` flags are the only process-wide mutable state of the
//! overlay. They live here and are handed to the controller explicitly; observers get
//! notified through a `watch` channel so they always see the latest pair.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ActivationFlags {
    pub disabled: bool,
    pub interactive: bool,
}

impl ActivationFlags {
    pub fn new(disabled: bool, interactive: bool) -> Self {
        Self {
            disabled,
            interactive,
        }
    }

    /// Whether the overlay must be torn down and stay inert.
    pub fn suspended(self, suspend_while_interactive: bool) -> bool {
        self.disabled || (suspend_while_interactive && self.interactive)
    }
}

pub struct ActivationCenter {
    tx: watch::Sender<ActivationFlags>,
}

impl ActivationCenter {
    pub fn new(initial: ActivationFlags) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> ActivationFlags {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActivationFlags> {
        self.tx.subscribe()
    }

    /// Returns true when the flag actually changed.
    pub fn set_disabled(&self, disabled: bool) -> bool {
        self.update(|flags| flags.disabled = disabled)
    }

    pub fn set_interactive(&self, interactive: bool) -> bool {
        self.update(|flags| flags.interactive = interactive)
    }

    /// Flips `interactive` and returns its new value.
    pub fn toggle_interactive(&self) -> bool {
        self.update(|flags| flags.interactive = !flags.interactive);
        self.current().interactive
    }

    fn update(&self, apply: impl FnOnce(&mut ActivationFlags)) -> bool {
        let changed = self.tx.send_if_modified(|flags| {
            let before = *flags;
            apply(flags);
            *flags != before
        });
        if changed {
            let flags = self.current();
            debug!(
                target: "axemode.activation",
                disabled = flags.disabled,
                interactive = flags.interactive,
                "activation.flags.changed"
            );
        }
        changed
    }
}

impl Default for ActivationCenter {
    fn default() -> Self {
        Self::new(ActivationFlags::default())
    }
}
