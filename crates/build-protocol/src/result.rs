//! The outcome of a request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetResultCode {
    Success,
    Failure,
    Skipped,
}

/// A single output item produced by a target, modeled as an item-spec plus
/// arbitrary string metadata (mirroring MSBuild's item/metadata model, kept
/// deliberately generic since item evaluation itself is out of scope).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputItem {
    pub item_spec: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    pub code: TargetResultCode,
    pub items: Vec<OutputItem>,
    /// Set when `code == Failure` and an exception propagated from task
    /// execution (never populated for `Skipped`).
    pub exception_message: Option<String>,
}

impl TargetResult {
    pub fn success(items: Vec<OutputItem>) -> Self {
        TargetResult { code: TargetResultCode::Success, items, exception_message: None }
    }

    pub fn failure(exception_message: impl Into<String>) -> Self {
        TargetResult {
            code: TargetResultCode::Failure,
            items: Vec::new(),
            exception_message: Some(exception_message.into()),
        }
    }

    pub fn skipped() -> Self {
        TargetResult { code: TargetResultCode::Skipped, items: Vec::new(), exception_message: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallResultCode {
    Success,
    Failure,
}

/// The outcome of a `BuildRequest`.
///
/// Per the data model: a target may be present with code `Skipped` (not
/// executed) or absent entirely (did not run) — `per_target` is sparse by
/// design, never padded with placeholder entries for unreached targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub configuration_id: i32,
    pub per_target: BTreeMap<String, TargetResult>,
    pub overall_result: OverallResultCode,
    pub exception_message: Option<String>,
    /// Present only when `ProvideSubsetOfStateAfterBuild` was requested.
    pub project_state_subset: Option<BTreeMap<String, String>>,
}

impl BuildResult {
    pub fn new(configuration_id: i32) -> Self {
        BuildResult {
            configuration_id,
            per_target: BTreeMap::new(),
            overall_result: OverallResultCode::Success,
            exception_message: None,
            project_state_subset: None,
        }
    }

    /// A result is "complete" for a target set when every requested target
    /// has a `TargetResult` entry and the overall code is defined (which it
    /// always is by construction here; the definedness clause exists to
    /// mirror the spec's fast-path precondition explicitly).
    pub fn is_complete_for(&self, targets: &[String]) -> bool {
        targets.iter().all(|t| self.per_target.contains_key(t))
    }

    pub fn has_results_for_target(&self, target: &str) -> bool {
        self.per_target.contains_key(target)
    }

    /// Merges another result's per-target entries into this one. Later
    /// entries with the same target name overwrite earlier ones, per the
    /// results cache's merge-by-target rule.
    pub fn merge(&mut self, other: BuildResult) {
        for (name, result) in other.per_target {
            self.per_target.insert(name, result);
        }
        if other.overall_result == OverallResultCode::Failure {
            self.overall_result = OverallResultCode::Failure;
        }
        if other.exception_message.is_some() {
            self.exception_message = other.exception_message;
        }
    }

    /// Restricted copy carrying only the named top-level targets — used when
    /// serializing the results cache under full project isolation.
    pub fn restricted_to(&self, targets: &[String]) -> BuildResult {
        let mut restricted = self.clone();
        restricted.per_target.retain(|name, _| targets.contains(name));
        restricted
    }

    pub fn set_failed(&mut self, exception_message: impl Into<String>) {
        self.overall_result = OverallResultCode::Failure;
        self.exception_message = Some(exception_message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overwrites_same_target() {
        let mut a = BuildResult::new(1);
        a.per_target.insert("Build".into(), TargetResult::success(vec![]));
        let mut b = BuildResult::new(1);
        b.per_target.insert("Build".into(), TargetResult::failure("boom"));
        a.merge(b);
        assert_eq!(a.per_target["Build"].code, TargetResultCode::Failure);
    }

    #[test]
    fn restricted_to_drops_other_targets() {
        let mut r = BuildResult::new(1);
        r.per_target.insert("A".into(), TargetResult::success(vec![]));
        r.per_target.insert("B".into(), TargetResult::success(vec![]));
        let restricted = r.restricted_to(&["A".to_string()]);
        assert!(restricted.has_results_for_target("A"));
        assert!(!restricted.has_results_for_target("B"));
    }

    #[test]
    fn is_complete_for_requires_every_target_present() {
        let mut r = BuildResult::new(1);
        r.per_target.insert("A".into(), TargetResult::success(vec![]));
        assert!(r.is_complete_for(&["A".to_string()]));
        assert!(!r.is_complete_for(&["A".to_string(), "B".to_string()]));
    }
}
