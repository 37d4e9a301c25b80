use std::sync::Arc;

use axemode_core_types::{MarkerId, Rect, SubtreeRef, TargetSelector};
use serde::Serialize;

use crate::errors::LookupError;
use crate::geometry::GeometrySource;
use crate::panel::PanelView;

/// How a marker presents itself to assistive technology.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRole {
    /// Hover-only affordance, not focusable.
    Decorative,
    /// Focusable button that opens its panel on press or Enter/Space.
    Button,
}

/// Resolves selectors against the host's live element tree.
pub trait ElementLookup: Send + Sync {
    fn resolve(
        &self,
        root: &SubtreeRef,
        selector: &TargetSelector,
    ) -> Result<Arc<dyn GeometrySource>, LookupError>;
}

/// Drawing surface for markers and detail panels, owned by the host.
///
/// A panel belongs to its marker. `anchor` is the marker's rectangle when the panel opens;
/// after that the host keeps the panel attached to the marker id, so each later
/// `position_marker` call for that marker re-anchors an open panel too.
pub trait OverlaySurface: Send + Sync {
    fn create_marker(&self, selector: &TargetSelector, role: MarkerRole) -> MarkerId;
    /// Moves the marker and any open panel anchored to it.
    fn position_marker(&self, marker: &MarkerId, rect: Rect);
    fn remove_marker(&self, marker: &MarkerId);
    fn show_panel(&self, marker: &MarkerId, panel: &PanelView, anchor: Rect);
    fn hide_panel(&self, marker: &MarkerId);
}

/// Optional human-readable naming of targets, used for panel titles.
pub trait NameResolver: Send + Sync {
    fn display_name(&self, selector: &TargetSelector) -> Option<String>;
}
