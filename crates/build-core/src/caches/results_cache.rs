//! Per-configuration build results, including the override cache that
//! shadows entries without mutating the base results for the duration of a
//! full-isolation submission.

use std::collections::HashMap;

use build_protocol::BuildResult;

#[derive(Default)]
pub struct ResultsCache {
    base: HashMap<i32, BuildResult>,
    /// Present only while at least one full-isolation submission is active;
    /// reads check this first, writes under isolation go here instead of
    /// `base`.
    overrides: Option<HashMap<i32, BuildResult>>,
}

impl ResultsCache {
    pub fn new() -> Self {
        ResultsCache::default()
    }

    pub fn begin_override_scope(&mut self) {
        self.overrides.get_or_insert_with(HashMap::new);
    }

    /// Ends the override scope, discarding the shadow entries without
    /// merging them into `base` — per the isolation rule that an
    /// isolated submission's results never leak into the shared cache.
    pub fn end_override_scope(&mut self) {
        self.overrides = None;
    }

    pub fn get(&self, configuration_id: i32) -> Option<&BuildResult> {
        if let Some(overrides) = &self.overrides {
            if let Some(result) = overrides.get(&configuration_id) {
                return Some(result);
            }
        }
        self.base.get(&configuration_id)
    }

    pub fn has_results_for_target(&self, configuration_id: i32, target: &str) -> bool {
        self.get(configuration_id).map(|r| r.has_results_for_target(target)).unwrap_or(false)
    }

    /// Merges a freshly produced result into the cache, by target, per
    /// configuration. Writes go to the override map when an isolation scope
    /// is active, otherwise directly into `base`.
    pub fn add_or_merge(&mut self, result: BuildResult) {
        let table = self.overrides.as_mut().unwrap_or(&mut self.base);
        table
            .entry(result.configuration_id)
            .and_modify(|existing| existing.merge(result.clone()))
            .or_insert(result);
    }

    /// `skip-unsuccessful` replay: a previously failed target is never
    /// silently re-reported as up to date; callers must check
    /// `TargetResultCode::Failure` explicitly on the returned result rather
    /// than treating any cache hit as success.
    pub fn lookup_for_replay(&self, configuration_id: i32, targets: &[String]) -> Option<BuildResult> {
        let result = self.get(configuration_id)?;
        if result.is_complete_for(targets) {
            Some(result.restricted_to(targets))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.base.clear();
        self.overrides = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use build_protocol::{OutputItem, TargetResult};

    fn result_with(config_id: i32, target: &str) -> BuildResult {
        let mut r = BuildResult::new(config_id);
        r.per_target.insert(target.to_string(), TargetResult::success(vec![OutputItem::default()]));
        r
    }

    #[test]
    fn lookup_for_replay_requires_completeness() {
        let mut cache = ResultsCache::new();
        cache.add_or_merge(result_with(1, "Build"));
        assert!(cache.lookup_for_replay(1, &["Build".to_string()]).is_some());
        assert!(cache.lookup_for_replay(1, &["Build".to_string(), "Test".to_string()]).is_none());
    }

    #[test]
    fn override_scope_does_not_leak_into_base() {
        let mut cache = ResultsCache::new();
        cache.begin_override_scope();
        cache.add_or_merge(result_with(1, "Build"));
        assert!(cache.get(1).is_some());
        cache.end_override_scope();
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn merge_combines_targets_for_same_configuration() {
        let mut cache = ResultsCache::new();
        cache.add_or_merge(result_with(1, "Build"));
        cache.add_or_merge(result_with(1, "Test"));
        let merged = cache.get(1).unwrap();
        assert!(merged.has_results_for_target("Build"));
        assert!(merged.has_results_for_target("Test"));
    }
}
