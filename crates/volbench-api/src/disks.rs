//! Mounted-volume enumeration.

use std::path::Path;
use sysinfo::Disks;
use volbench_supervisor::VolumeCatalog;

use crate::types::DiskInfo;

/// Volume catalog backed by the live mount table.
///
/// Refreshes on every query; volume mounts and free space both change
/// under us, and enumeration is cheap at this call rate.
pub struct SystemVolumes;

impl SystemVolumes {
    /// Candidate volumes for testing: external mounts plus the root
    /// volume.
    pub fn enumerate() -> Vec<DiskInfo> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|disk| {
                let mount = disk.mount_point();
                mount == Path::new("/") || mount.starts_with("/Volumes")
            })
            .map(|disk| DiskInfo {
                path: disk.mount_point().display().to_string(),
                name: disk.name().to_string_lossy().into_owned(),
                free_space_bytes: disk.available_space(),
                total_space_bytes: disk.total_space(),
            })
            .collect()
    }
}

impl VolumeCatalog for SystemVolumes {
    /// Free space of the most specific mount containing `path`.
    fn free_space_bytes(&self, path: &Path) -> Option<u64> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_agrees_with_the_mount_table() {
        // Sandboxed environments may expose no disks at all, so assert
        // consistency with the live mount table rather than presence.
        let volumes = SystemVolumes;
        let root = volumes.free_space_bytes(Path::new("/"));
        let has_root_mount = Disks::new_with_refreshed_list()
            .iter()
            .any(|disk| disk.mount_point() == Path::new("/"));
        assert_eq!(root.is_some(), has_root_mount);
    }

    #[test]
    fn test_nested_path_resolves_only_through_an_ancestor_mount() {
        let volumes = SystemVolumes;
        let path = Path::new("/definitely/not/a/mount");
        let resolved = volumes.free_space_bytes(path);
        let has_ancestor_mount = Disks::new_with_refreshed_list()
            .iter()
            .any(|disk| path.starts_with(disk.mount_point()));
        assert_eq!(resolved.is_some(), has_ancestor_mount);
    }
}
