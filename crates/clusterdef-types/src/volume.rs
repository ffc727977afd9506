//! Volume settings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named volume attached to a machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSettings {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fstype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mountable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_at_launch: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl VolumeSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn size_gb(&mut self, size: u32) -> &mut Self {
        self.size_gb = Some(size);
        self
    }

    pub fn device(&mut self, device: impl Into<String>) -> &mut Self {
        self.device = Some(device.into());
        self
    }

    pub fn mount_point(&mut self, path: impl Into<String>) -> &mut Self {
        self.mount_point = Some(path.into());
        self
    }

    pub fn fstype(&mut self, fstype: impl Into<String>) -> &mut Self {
        self.fstype = Some(fstype.into());
        self
    }

    pub fn snapshot_id(&mut self, snapshot: impl Into<String>) -> &mut Self {
        self.snapshot_id = Some(snapshot.into());
        self
    }

    pub fn volume_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.volume_id = Some(id.into());
        self
    }

    pub fn mountable(&mut self, mountable: bool) -> &mut Self {
        self.mountable = Some(mountable);
        self
    }

    pub fn create_at_launch(&mut self, create: bool) -> &mut Self {
        self.create_at_launch = Some(create);
        self
    }

    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Fill fields unset here from the same-named volume of a parent layer
    pub fn reverse_merge(&mut self, parent: &VolumeSettings) {
        fill(&mut self.size_gb, &parent.size_gb);
        fill(&mut self.device, &parent.device);
        fill(&mut self.mount_point, &parent.mount_point);
        fill(&mut self.fstype, &parent.fstype);
        fill(&mut self.snapshot_id, &parent.snapshot_id);
        fill(&mut self.volume_id, &parent.volume_id);
        fill(&mut self.mountable, &parent.mountable);
        fill(&mut self.create_at_launch, &parent.create_at_launch);
        for (key, value) in &parent.tags {
            self.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Copy every field set in `overrides` over this one
    pub fn overlay(&mut self, overrides: &VolumeSettings) {
        replace(&mut self.size_gb, &overrides.size_gb);
        replace(&mut self.device, &overrides.device);
        replace(&mut self.mount_point, &overrides.mount_point);
        replace(&mut self.fstype, &overrides.fstype);
        replace(&mut self.snapshot_id, &overrides.snapshot_id);
        replace(&mut self.volume_id, &overrides.volume_id);
        replace(&mut self.mountable, &overrides.mountable);
        replace(&mut self.create_at_launch, &overrides.create_at_launch);
        self.tags
            .extend(overrides.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

fn replace<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if source.is_some() {
        target.clone_from(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_volume_inherits_unset_fields() {
        let mut facet = VolumeSettings::new("data");
        facet.size_gb(100).mount_point("/data").tag("tier", "hot");

        let mut server = VolumeSettings::new("data");
        server.volume_id("vol-1234").tag("tier", "cold");
        server.reverse_merge(&facet);

        assert_eq!(server.size_gb, Some(100));
        assert_eq!(server.mount_point.as_deref(), Some("/data"));
        assert_eq!(server.volume_id.as_deref(), Some("vol-1234"));
        assert_eq!(server.tags["tier"], "cold");
    }

    #[test]
    fn test_yaml_shape() {
        let volume: VolumeSettings =
            serde_yaml::from_str("name: root\nsize_gb: 20\nmountable: false\n").unwrap();
        assert_eq!(volume.name, "root");
        assert_eq!(volume.size_gb, Some(20));
        assert_eq!(volume.mountable, Some(false));
        assert!(volume.tags.is_empty());
    }
}
