//! The externally supplied description of a submission.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::configuration::NodeAffinity;

bitflags::bitflags! {
    /// Flags governing how a submission is built and how its result is reported.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BuildRequestFlags: u8 {
        const PROVIDE_SUBSET_OF_STATE_AFTER_BUILD = 0b0001;
        const REPLACE_EXISTING_PROJECT_INSTANCE    = 0b0010;
        const IGNORE_EXISTING_PROJECT_STATE        = 0b0100;
    }
}

impl Default for BuildRequestFlags {
    fn default() -> Self {
        BuildRequestFlags::empty()
    }
}

/// Optional filter describing which subset of post-build project state the
/// caller wants back with the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestedProjectState {
    pub property_filters: Option<Vec<String>>,
    /// item-type -> optional metadata-name list; `None` list means "all metadata".
    pub item_filters: Option<BTreeMap<String, Option<Vec<String>>>>,
}

/// Host-supplied hints that travel with a submission: affinity preference
/// and an optional pinned node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostServices {
    pub affinity: Option<NodeAffinity>,
    pub pinned_node_id: Option<i32>,
}

/// The externally supplied description of a build submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequestData {
    pub project_full_path: PathBuf,
    pub global_properties: BTreeMap<String, String>,
    pub tools_version: Option<String>,
    /// Empty means "project's default targets".
    pub targets: Vec<String>,
    pub host_services: HostServices,
    pub flags: BuildRequestFlags,
    pub requested_project_state: Option<RequestedProjectState>,
}

impl BuildRequestData {
    pub fn new(project_full_path: PathBuf, global_properties: BTreeMap<String, String>) -> Self {
        BuildRequestData {
            project_full_path,
            global_properties,
            tools_version: None,
            targets: Vec::new(),
            host_services: HostServices::default(),
            flags: BuildRequestFlags::empty(),
            requested_project_state: None,
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    /// Normalizes the project path to absolute, per Section 6's ingestion rule.
    pub fn normalize_path(&mut self, base_dir: &std::path::Path) {
        if self.project_full_path.is_relative() {
            self.project_full_path = base_dir.join(&self.project_full_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_normalized_to_absolute() {
        let mut data = BuildRequestData::new(PathBuf::from("a.proj"), BTreeMap::new());
        data.normalize_path(std::path::Path::new("/root/work"));
        assert_eq!(data.project_full_path, PathBuf::from("/root/work/a.proj"));
    }

    #[test]
    fn absolute_path_untouched() {
        let mut data = BuildRequestData::new(PathBuf::from("/abs/a.proj"), BTreeMap::new());
        data.normalize_path(std::path::Path::new("/root/work"));
        assert_eq!(data.project_full_path, PathBuf::from("/abs/a.proj"));
    }
}
