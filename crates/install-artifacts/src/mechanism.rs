//! Version and role dispatch.
//!
//! Both choices are made once per generation and threaded through every
//! builder so the hardware, workflow and install configuration always agree.

use crds::{ConditionType, Inventory};
use std::fmt;

/// Versions installed from an ISO with an inline iPXE script
const LEGACY_VERSION_PREFIX: &str = "v1.1";

/// How the target version is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMechanism {
    /// ISO download driven by an inline iPXE script, completion signalled by webhook
    Legacy,
    /// Streaming image install driven by a Tinkerbell workflow
    Streaming,
}

impl InstallMechanism {
    /// Select the mechanism for a Harvester version string
    ///
    /// `v1.1`, `v1.1.x` and `v1.1-<suffix>` are legacy. Anything else,
    /// including `v1.10.x`, streams.
    pub fn for_version(version: &str) -> Self {
        match version.trim().strip_prefix(LEGACY_VERSION_PREFIX) {
            Some("") => InstallMechanism::Legacy,
            Some(rest) if rest.starts_with('.') || rest.starts_with('-') => InstallMechanism::Legacy,
            _ => InstallMechanism::Streaming,
        }
    }

    pub fn is_legacy(self) -> bool {
        self == InstallMechanism::Legacy
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstallMechanism::Legacy => "legacy",
            InstallMechanism::Streaming => "streaming",
        }
    }
}

impl fmt::Display for InstallMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a node plays when Harvester is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// First node, creates the cluster and owns the VIP
    Create,
    /// Joins the cluster through the VIP
    Join,
}

impl NodeRole {
    /// Role recorded on the inventory's conditions. Defaults to join.
    pub fn of(inventory: &Inventory) -> Self {
        if inventory.has_condition(ConditionType::HarvesterCreateNode) {
            NodeRole::Create
        } else {
            NodeRole::Join
        }
    }

    /// Install mode understood by the Harvester installer
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Create => "create",
            NodeRole::Join => "join",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{InventorySpec, InventoryStatus};

    #[test]
    fn test_legacy_versions() {
        for version in ["v1.1", "v1.1.0", "v1.1.2", "v1.1.2-rc1", "v1.1-head"] {
            assert_eq!(
                InstallMechanism::for_version(version),
                InstallMechanism::Legacy,
                "{version} should be legacy"
            );
        }
    }

    #[test]
    fn test_streaming_versions() {
        for version in ["v1.2.0", "v1.10.1", "v1.3.0-rc2", "master", "", "1.1.2"] {
            assert_eq!(
                InstallMechanism::for_version(version),
                InstallMechanism::Streaming,
                "{version} should stream"
            );
        }
    }

    #[test]
    fn test_role_from_conditions() {
        let mut inventory = Inventory::new("node", InventorySpec::default());
        assert_eq!(NodeRole::of(&inventory), NodeRole::Join);

        let mut status = InventoryStatus::default();
        status.set_condition(ConditionType::HarvesterCreateNode, "");
        inventory.status = Some(status);
        assert_eq!(NodeRole::of(&inventory), NodeRole::Create);
        assert_eq!(NodeRole::of(&inventory).to_string(), "create");
    }
}
