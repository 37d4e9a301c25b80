pub mod config;
pub mod controller;
pub mod disclosure;
pub mod errors;
pub mod events;
pub mod geometry;
pub mod mode;
pub mod panel;
pub mod ports;
pub mod segment;
pub mod tracker;

pub use config::OverlayConfig;
pub use controller::{AxeMode, EntrySnapshot, OverlayDeps, OverlaySnapshot};
pub use disclosure::{
    Disclosure, DisclosureEvent, DisclosureMode, DisclosureState, HitRegion, Key, PointerButton,
};
pub use errors::{LookupError, OverlayError};
pub use geometry::{GeometrySource, ObservedGeometry, PollingGeometry};
pub use mode::{KeyPress, Modifier, ModeToggle, ShortcutChord};
pub use panel::{PanelSection, PanelView, FIX_ALL_LABEL, FIX_ANY_LABEL};
pub use ports::{ElementLookup, MarkerRole, NameResolver, OverlaySurface};
pub use segment::{segment, TargetViolations, ViolationsByTarget};
pub use tracker::PositionTracker;
