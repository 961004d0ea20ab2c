//! Snapshot of the environment-variable knobs that change scheduling and
//! logging behavior, captured once at `BuildManager` construction so a
//! session's behavior cannot change mid-build if the process environment is
//! mutated by a task.

use std::collections::BTreeMap;
use std::env;

#[derive(Debug, Clone, Default)]
pub struct EnvironmentSnapshot {
    pub no_in_proc_node: bool,
    pub forward_properties_from_child: Option<Vec<String>>,
    pub forward_all_properties_from_child: bool,
    pub log_properties_and_items_after_evaluation: bool,
    pub force_all_tasks_out_of_proc: bool,
    pub node_connection_timeout_ms: Option<u64>,
    pub enable_cache: bool,
    pub debug_force_caching: bool,
    pub enable_all_property_functions: bool,
}

impl EnvironmentSnapshot {
    pub fn capture() -> Self {
        Self::from_vars(env::vars().collect())
    }

    /// Parses from an arbitrary map, primarily so tests can exercise the
    /// parsing rules without mutating the real process environment.
    pub fn from_vars(vars: BTreeMap<String, String>) -> Self {
        let flag = |name: &str| vars.get(name).map(|v| v == "1").unwrap_or(false);

        let forward_properties_from_child = vars
            .get("MSBuildForwardPropertiesFromChild")
            .map(|v| v.split(';').map(str::to_string).filter(|s| !s.is_empty()).collect());

        EnvironmentSnapshot {
            no_in_proc_node: flag("MSBUILDNOINPROCNODE"),
            forward_properties_from_child,
            forward_all_properties_from_child: vars.get("MsBuildForwardAllPropertiesFromChild").is_some_and(|v| !v.is_empty()),
            log_properties_and_items_after_evaluation: vars
                .get("MSBUILDLOGPROPERTIESANDITEMSAFTEREVALUATION")
                .map(|v| v != "0")
                .unwrap_or(true),
            force_all_tasks_out_of_proc: flag("MSBUILDFORCEALLTASKSOUTOFPROC"),
            node_connection_timeout_ms: vars.get("MSBUILDNODECONNECTIONTIMEOUT").and_then(|v| v.parse().ok()),
            enable_cache: flag("MSBUILDCACHE"),
            debug_force_caching: flag("MSBUILDDEBUGFORCECACHING"),
            enable_all_property_functions: flag("MSBUILDENABLEALLPROPERTYFUNCTIONS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn forward_list_splits_on_semicolon() {
        let snap = EnvironmentSnapshot::from_vars(vars(&[("MSBuildForwardPropertiesFromChild", "A;B;C")]));
        assert_eq!(snap.forward_properties_from_child, Some(vec!["A".into(), "B".into(), "C".into()]));
    }

    #[test]
    fn log_properties_defaults_true_absent_var() {
        let snap = EnvironmentSnapshot::from_vars(BTreeMap::new());
        assert!(snap.log_properties_and_items_after_evaluation);
    }

    #[test]
    fn forward_all_properties_accepts_any_non_empty_value() {
        let snap = EnvironmentSnapshot::from_vars(vars(&[("MsBuildForwardAllPropertiesFromChild", "true")]));
        assert!(snap.forward_all_properties_from_child);
        let snap = EnvironmentSnapshot::from_vars(BTreeMap::new());
        assert!(!snap.forward_all_properties_from_child);
    }

    #[test]
    fn connection_timeout_parsed_as_integer() {
        let snap = EnvironmentSnapshot::from_vars(vars(&[("MSBUILDNODECONNECTIONTIMEOUT", "900000")]));
        assert_eq!(snap.node_connection_timeout_ms, Some(900_000));
    }
}
