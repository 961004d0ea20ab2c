use std::collections::BTreeMap;
use std::path::PathBuf;

/// A host-evaluated project's post-evaluation state, handed in directly
/// rather than produced by this crate. Carries just enough to build a
/// `BuildRequestConfiguration` via `from_project_instance` and to answer
/// `GetProjectInstanceForBuild`-style queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInstance {
    pub full_path: PathBuf,
    pub tools_version: String,
    pub global_properties: BTreeMap<String, String>,
    pub default_targets: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl ProjectInstance {
    pub fn new(full_path: PathBuf, tools_version: impl Into<String>) -> Self {
        ProjectInstance {
            full_path,
            tools_version: tools_version.into(),
            global_properties: BTreeMap::new(),
            default_targets: Vec::new(),
            properties: BTreeMap::new(),
        }
    }
}
