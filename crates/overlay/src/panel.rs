//! Detail panel content for one target.

use std::fmt::Write as _;

use axemode_core_types::{Check, Impact, TargetSelector, Violation};
use serde::Serialize;

use crate::ports::NameResolver;

pub const FIX_ALL_LABEL: &str = "Fix all of the following:";
pub const FIX_ANY_LABEL: &str = "Fix any of the following:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelSection {
    pub violation_id: String,
    pub impact: Option<Impact>,
    pub help: String,
    pub help_url: String,
    pub fix_all: Vec<Check>,
    pub fix_any: Vec<Check>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub selector: TargetSelector,
    pub title: String,
    pub sections: Vec<PanelSection>,
}

impl PanelView {
    /// Builds the panel for `selector` from the violations affecting it, in their original
    /// order. Checks come from the violation's first node that lists the selector.
    pub fn build(
        selector: &TargetSelector,
        violations: &[Violation],
        names: Option<&dyn NameResolver>,
    ) -> Self {
        let title = names
            .and_then(|resolver| resolver.display_name(selector))
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| selector.to_string());

        let sections = violations
            .iter()
            .map(|violation| {
                let node = violation.node_for(selector);
                PanelSection {
                    violation_id: violation.id.clone(),
                    impact: violation.impact,
                    help: violation.help.clone(),
                    help_url: violation.help_url.clone(),
                    fix_all: node.map(|n| n.all.clone()).unwrap_or_default(),
                    fix_any: node.map(|n| n.any.clone()).unwrap_or_default(),
                }
            })
            .collect();

        Self {
            selector: selector.clone(),
            title,
            sections,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        for section in &self.sections {
            let impact = section.impact.map(Impact::label).unwrap_or("unknown");
            let _ = writeln!(out, "  [{impact}] {}", section.help);
            if !section.help_url.is_empty() {
                let _ = writeln!(out, "    {}", section.help_url);
            }
            render_group(&mut out, FIX_ALL_LABEL, &section.fix_all);
            render_group(&mut out, FIX_ANY_LABEL, &section.fix_any);
        }
        out
    }
}

fn render_group(out: &mut String, label: &str, checks: &[Check]) {
    if checks.is_empty() {
        return;
    }
    let _ = writeln!(out, "    {label}");
    for check in checks {
        let _ = writeln!(out, "      - {}", check.message);
    }
}
