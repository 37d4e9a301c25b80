//! In-memory host: a fixed page layout plus a recording overlay surface.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axemode_core_types::{MarkerId, Rect, SubtreeRef, TargetSelector};
use axemode_overlay::{
    ElementLookup, GeometrySource, LookupError, MarkerRole, NameResolver, OverlaySurface,
    PanelView, PollingGeometry,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One element of a page fixture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementSpec {
    #[serde(flatten)]
    pub rect: Rect,
    /// Display name of the owning component, if known.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageFixture {
    #[serde(default)]
    pub elements: BTreeMap<String, ElementSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerView {
    pub marker: MarkerId,
    pub selector: TargetSelector,
    pub role: MarkerRole,
    pub rect: Rect,
}

pub struct InMemoryHost {
    elements: Arc<DashMap<String, ElementSpec>>,
    frame_interval: Duration,
    markers: Mutex<BTreeMap<String, MarkerView>>,
    panels: Mutex<BTreeMap<String, (PanelView, Rect)>>,
}

impl InMemoryHost {
    pub fn new(page: PageFixture, frame_interval: Duration) -> Self {
        let elements = DashMap::new();
        for (selector, spec) in page.elements {
            elements.insert(selector, spec);
        }
        Self {
            elements: Arc::new(elements),
            frame_interval,
            markers: Mutex::new(BTreeMap::new()),
            panels: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Moves or resizes an element; returns false when it does not exist.
    pub fn set_rect(&self, selector: &str, rect: Rect) -> bool {
        match self.elements.get_mut(selector) {
            Some(mut spec) => {
                spec.rect = rect;
                true
            }
            None => false,
        }
    }

    pub fn insert(&self, selector: &str, spec: ElementSpec) {
        self.elements.insert(selector.to_string(), spec);
    }

    pub fn remove(&self, selector: &str) -> bool {
        self.elements.remove(selector).is_some()
    }

    /// Markers currently drawn, ordered by marker id.
    pub fn markers(&self) -> Vec<MarkerView> {
        self.markers.lock().values().cloned().collect()
    }

    pub fn marker_for(&self, selector: &str) -> Option<MarkerView> {
        self.markers
            .lock()
            .values()
            .find(|view| view.selector.as_str() == selector)
            .cloned()
    }

    pub fn visible_panels(&self) -> Vec<PanelView> {
        self.panels.lock().values().map(|(panel, _)| panel.clone()).collect()
    }

    /// Rectangle the open panel for `selector` is anchored to.
    pub fn panel_anchor(&self, selector: &str) -> Option<Rect> {
        let marker = self.marker_for(selector)?.marker;
        self.panels.lock().get(&marker.0).map(|(_, anchor)| *anchor)
    }
}

impl ElementLookup for InMemoryHost {
    fn resolve(
        &self,
        _root: &SubtreeRef,
        selector: &TargetSelector,
    ) -> Result<Arc<dyn GeometrySource>, LookupError> {
        if selector.as_str().trim().is_empty() {
            return Err(LookupError::InvalidSelector(selector.to_string()));
        }
        let initial = self
            .elements
            .get(selector.as_str())
            .map(|spec| spec.rect)
            .ok_or_else(|| LookupError::NotFound(selector.clone()))?;

        let elements = Arc::clone(&self.elements);
        let key = selector.as_str().to_string();
        let geometry = PollingGeometry::spawn(initial, self.frame_interval, move || {
            elements.get(&key).map(|spec| spec.rect)
        });
        Ok(Arc::new(geometry))
    }
}

impl OverlaySurface for InMemoryHost {
    fn create_marker(&self, selector: &TargetSelector, role: MarkerRole) -> MarkerId {
        let marker = MarkerId::new();
        self.markers.lock().insert(
            marker.0.clone(),
            MarkerView {
                marker: marker.clone(),
                selector: selector.clone(),
                role,
                rect: Rect::default(),
            },
        );
        marker
    }

    fn position_marker(&self, marker: &MarkerId, rect: Rect) {
        if let Some(view) = self.markers.lock().get_mut(&marker.0) {
            trace!(target: "axemode.host", selector = %view.selector, %rect, "marker.positioned");
            view.rect = rect;
        }
        if let Some((_, anchor)) = self.panels.lock().get_mut(&marker.0) {
            *anchor = rect;
        }
    }

    fn remove_marker(&self, marker: &MarkerId) {
        self.markers.lock().remove(&marker.0);
        self.panels.lock().remove(&marker.0);
    }

    fn show_panel(&self, marker: &MarkerId, panel: &PanelView, anchor: Rect) {
        self.panels
            .lock()
            .insert(marker.0.clone(), (panel.clone(), anchor));
    }

    fn hide_panel(&self, marker: &MarkerId) {
        self.panels.lock().remove(&marker.0);
    }
}

impl NameResolver for InMemoryHost {
    fn display_name(&self, selector: &TargetSelector) -> Option<String> {
        self.elements
            .get(selector.as_str())
            .and_then(|spec| spec.name.clone())
    }
}
