//! Owns every live `BuildRequestConfiguration` for a session.
//!
//! Two lookup paths mirror the data model: by assigned id (the fast path
//! everything after the first reference into a project uses) and by the
//! semantic `(project, global properties, tools version)` key (used the
//! first time a project is referenced, and by the scheduler's co-submission
//! collapse check). Configurations that are not cacheable (built directly
//! from a `ProjectInstance`, or explicitly excluded) never enter the disk
//! swap path.

use std::collections::HashMap;
use std::path::PathBuf;

use build_protocol::BuildRequestConfiguration;

/// A process-unique directory name for this session's disk-swapped
/// configurations, so two overlapping build processes never collide.
fn swap_subdir(session_id: u64) -> String {
    format!("msbuild-nodes-{}-{}", std::process::id(), session_id)
}

pub struct ConfigCache {
    by_id: HashMap<i32, BuildRequestConfiguration>,
    /// Ids currently swapped to disk, keyed the same as `by_id`; looking one
    /// of these up transparently reloads it and removes the marker.
    swapped_to_disk: HashMap<i32, PathBuf>,
    next_id: i32,
    swap_dir: PathBuf,
}

impl ConfigCache {
    pub fn new(session_id: u64, base_swap_dir: PathBuf) -> Self {
        ConfigCache {
            by_id: HashMap::new(),
            swapped_to_disk: HashMap::new(),
            next_id: 1,
            swap_dir: base_swap_dir.join(swap_subdir(session_id)),
        }
    }

    /// Inserts a configuration, assigning it a fresh authoritative id if it
    /// doesn't already have one. Returns the id it now has.
    pub fn add_or_get_existing(&mut self, mut config: BuildRequestConfiguration) -> i32 {
        if let Some(existing) = self.by_id.values().find(|c| **c == config) {
            return existing.id();
        }
        if !config.is_assigned() {
            let id = self.next_id;
            self.next_id += 1;
            config.assign_id(id);
        }
        let id = config.id();
        self.by_id.insert(id, config);
        id
    }

    pub fn get(&mut self, id: i32) -> Option<&BuildRequestConfiguration> {
        if self.swapped_to_disk.contains_key(&id) {
            self.reload_from_disk(id);
        }
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut BuildRequestConfiguration> {
        if self.swapped_to_disk.contains_key(&id) {
            self.reload_from_disk(id);
        }
        self.by_id.get_mut(&id)
    }

    pub fn find_by_semantic_key(&self, config: &BuildRequestConfiguration) -> Option<i32> {
        self.by_id.values().find(|c| *c == config).map(|c| c.id())
    }

    /// Swaps a configuration to disk, freeing its in-memory slot. Only
    /// cacheable configurations may be swapped; non-cacheable ones are
    /// silently retained in memory (mirrors the data model's restriction).
    pub fn swap_to_disk(&mut self, id: i32) -> std::io::Result<()> {
        let Some(config) = self.by_id.get(&id) else { return Ok(()) };
        if !config.is_cacheable {
            return Ok(());
        }
        std::fs::create_dir_all(&self.swap_dir)?;
        let path = self.swap_dir.join(format!("{id}.json"));
        let json = serde_json::to_vec(config).expect("configuration is always serializable");
        std::fs::write(&path, json)?;
        self.by_id.remove(&id);
        self.swapped_to_disk.insert(id, path);
        Ok(())
    }

    fn reload_from_disk(&mut self, id: i32) {
        let Some(path) = self.swapped_to_disk.remove(&id) else { return };
        let bytes = std::fs::read(&path).expect("swapped configuration file must still exist");
        let config: BuildRequestConfiguration =
            serde_json::from_slice(&bytes).expect("swapped configuration must deserialize");
        self.by_id.insert(id, config);
        let _ = std::fs::remove_file(&path);
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.swapped_to_disk.clear();
        let _ = std::fs::remove_dir_all(&self.swap_dir);
        self.next_id = 1;
    }

    pub fn len(&self) -> usize {
        self.by_id.len() + self.swapped_to_disk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use build_protocol::NodeAffinity;
    use std::collections::BTreeMap;

    fn config(path: &str) -> BuildRequestConfiguration {
        BuildRequestConfiguration::new(PathBuf::from(path), "Current", BTreeMap::new(), NodeAffinity::Any)
    }

    #[test]
    fn second_insert_of_equal_config_returns_same_id() {
        let mut cache = ConfigCache::new(1, std::env::temp_dir());
        let id_a = cache.add_or_get_existing(config("/p.proj"));
        let id_b = cache.add_or_get_existing(config("/p.proj"));
        assert_eq!(id_a, id_b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn swap_then_get_transparently_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ConfigCache::new(1, dir.path().to_path_buf());
        let id = cache.add_or_get_existing(config("/p.proj"));
        cache.swap_to_disk(id).unwrap();
        assert!(cache.swapped_to_disk.contains_key(&id));
        let reloaded = cache.get(id).unwrap();
        assert_eq!(reloaded.id(), id);
        assert!(!cache.swapped_to_disk.contains_key(&id));
    }

    #[test]
    fn non_cacheable_config_is_not_swapped() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ConfigCache::new(1, dir.path().to_path_buf());
        let mut c = config("/p.proj");
        c.is_cacheable = false;
        let id = cache.add_or_get_existing(c);
        cache.swap_to_disk(id).unwrap();
        assert!(cache.by_id.contains_key(&id));
        assert!(!cache.swapped_to_disk.contains_key(&id));
    }
}
