//! Identity of a unit of work: `(project, global properties, tools version)`.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A pinning preference for which kind of node a configuration should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeAffinity {
    #[default]
    Any,
    InProc,
    OutOfProc,
}

/// Case-insensitive, order-independent key used for the config cache's
/// secondary (semantic) lookup. Two configurations with equal keys would
/// produce identical evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConfigurationKey {
    project_path: String,
    tools_version: String,
    global_properties: Vec<(String, String)>,
}

impl ConfigurationKey {
    fn new(project_path: &Path, tools_version: &str, global_properties: &BTreeMap<String, String>) -> Self {
        let mut sorted: Vec<(String, String)> = global_properties
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        sorted.sort();
        ConfigurationKey {
            project_path: normalize_path_key(project_path),
            tools_version: tools_version.to_ascii_lowercase(),
            global_properties: sorted,
        }
    }
}

fn normalize_path_key(path: &Path) -> String {
    path.to_string_lossy().to_ascii_lowercase()
}

/// Identifies a `project + global-properties + tools-version` triple.
///
/// `id` is assigned exactly once: `id > 0` means authoritative (assigned by
/// the session's config cache), `id < 0` means generated by a worker node,
/// and `id == 0` means unassigned. Configurations with `id <= 0` cannot be
/// stored in the session's config cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequestConfiguration {
    id: i32,
    pub project_full_path: PathBuf,
    pub tools_version: String,
    pub global_properties: BTreeMap<String, String>,
    pub affinity: NodeAffinity,
    /// Whether this configuration may be swapped to disk by the config cache.
    /// Configurations materialized directly from a `ProjectInstance` default
    /// to `false`.
    pub is_cacheable: bool,
    /// `true` if this configuration was built by `TranslateEntireState`
    /// (serialize includes the full evaluated project state rather than
    /// just the identifying fields).
    pub translate_entire_state: bool,
}

impl BuildRequestConfiguration {
    /// Constructs a new, unassigned (`id == 0`) configuration.
    pub fn new(
        project_full_path: PathBuf,
        tools_version: impl Into<String>,
        global_properties: BTreeMap<String, String>,
        affinity: NodeAffinity,
    ) -> Self {
        BuildRequestConfiguration {
            id: 0,
            project_full_path,
            tools_version: tools_version.into(),
            global_properties,
            affinity,
            is_cacheable: true,
            translate_entire_state: false,
        }
    }

    /// Constructs a configuration directly from a materialized project
    /// instance. Defaults `is_cacheable` to `false`, per the data model.
    pub fn from_project_instance(
        project_full_path: PathBuf,
        tools_version: impl Into<String>,
        global_properties: BTreeMap<String, String>,
    ) -> Self {
        let mut config = Self::new(project_full_path, tools_version, global_properties, NodeAffinity::Any);
        config.is_cacheable = false;
        config.translate_entire_state = true;
        config
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn is_assigned(&self) -> bool {
        self.id != 0
    }

    /// Assigns the configuration's id. Fatal (panics) if the id was already
    /// assigned — assignment must be strictly one-time. Negative ids
    /// (worker-generated) and positive ids (session-authoritative) both go
    /// through this path.
    pub fn assign_id(&mut self, id: i32) {
        assert_ne!(id, 0, "cannot assign the unassigned sentinel id 0");
        assert_eq!(
            self.id, 0,
            "configuration id reassignment is a fatal invariant violation (had {}, attempted {})",
            self.id, id
        );
        self.id = id;
    }

    /// Produces a shallow clone carrying a fresh, unassigned id. This is the
    /// only sanctioned way to change a configuration's id after the fact.
    pub fn shallow_clone_with_new_id(&self) -> Self {
        let mut clone = self.clone();
        clone.id = 0;
        clone
    }

    fn key(&self) -> ConfigurationKey {
        ConfigurationKey::new(&self.project_full_path, &self.tools_version, &self.global_properties)
    }

    /// Applies the session's force-out-of-proc override: an explicit
    /// `InProc` affinity is silently promoted to `OutOfProc`.
    pub fn apply_force_out_of_proc(&mut self, force: bool) {
        if force && self.affinity == NodeAffinity::InProc {
            self.affinity = NodeAffinity::OutOfProc;
        } else if force {
            self.affinity = NodeAffinity::OutOfProc;
        }
    }
}

impl PartialEq for BuildRequestConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for BuildRequestConfiguration {}

impl Hash for BuildRequestConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn equal_regardless_of_property_order_and_case() {
        let a = BuildRequestConfiguration::new(
            PathBuf::from("/p/a.proj"),
            "Current",
            props(&[("A", "1"), ("B", "2")]),
            NodeAffinity::Any,
        );
        let b = BuildRequestConfiguration::new(
            PathBuf::from("/P/A.PROJ"),
            "current",
            props(&[("b", "2"), ("a", "1")]),
            NodeAffinity::Any,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn not_equal_on_differing_values() {
        let a = BuildRequestConfiguration::new(PathBuf::from("/p/a.proj"), "Current", props(&[("A", "1")]), NodeAffinity::Any);
        let b = BuildRequestConfiguration::new(PathBuf::from("/p/a.proj"), "Current", props(&[("A", "2")]), NodeAffinity::Any);
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "reassignment")]
    fn reassigning_id_panics() {
        let mut c = BuildRequestConfiguration::new(PathBuf::from("/p.proj"), "Current", props(&[]), NodeAffinity::Any);
        c.assign_id(1);
        c.assign_id(2);
    }

    #[test]
    fn shallow_clone_resets_id() {
        let mut c = BuildRequestConfiguration::new(PathBuf::from("/p.proj"), "Current", props(&[]), NodeAffinity::Any);
        c.assign_id(5);
        let clone = c.shallow_clone_with_new_id();
        assert_eq!(clone.id(), 0);
        assert!(!clone.is_assigned());
    }

    #[test]
    fn from_project_instance_defaults_not_cacheable() {
        let c = BuildRequestConfiguration::from_project_instance(PathBuf::from("/p.proj"), "Current", props(&[]));
        assert!(!c.is_cacheable);
        assert!(c.translate_entire_state);
    }

    #[test]
    fn explicit_inproc_promoted_under_force_oop() {
        let mut c = BuildRequestConfiguration::new(PathBuf::from("/p.proj"), "Current", props(&[]), NodeAffinity::InProc);
        c.apply_force_out_of_proc(true);
        assert_eq!(c.affinity, NodeAffinity::OutOfProc);
    }
}
