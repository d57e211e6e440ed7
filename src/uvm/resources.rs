use serde::{Deserialize, Serialize};

/// Resource attached to a utility VM that a clone has to get back.
///
/// The set is closed: the `kind` tag is serialized first and anything outside
/// these variants is rejected when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceDescriptor {
    NetworkShare(VsmbShare),
    BlockStorage(ScsiMount),
}

impl ResourceDescriptor {
    pub fn host_path(&self) -> &str {
        match self {
            ResourceDescriptor::NetworkShare(share) => &share.host_path,
            ResourceDescriptor::BlockStorage(mount) => &mount.host_path,
        }
    }
}

impl From<VsmbShare> for ResourceDescriptor {
    fn from(share: VsmbShare) -> Self {
        ResourceDescriptor::NetworkShare(share)
    }
}

impl From<ScsiMount> for ResourceDescriptor {
    fn from(mount: ScsiMount) -> Self {
        ResourceDescriptor::BlockStorage(mount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VsmbShare {
    pub host_path: String,
    pub name: String,
    pub guest_path: String,
    // empty means the whole directory is shared
    #[serde(default)]
    pub allowed_files: Vec<String>,
    #[serde(default)]
    pub options: VsmbShareOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VsmbShareOptions {
    pub read_only: bool,
    pub pseudo_oplocks: bool,
    pub take_backup_privilege: bool,
    pub cache_io: bool,
    pub share_read: bool,
    pub no_direct_map: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    VirtualDisk,
    PassThru,
    ExtensibleVirtualDisk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScsiMount {
    pub host_path: String,
    pub uvm_path: String,
    pub controller: u8,
    pub lun: u8,
    pub read_only: bool,
    pub attachment_type: AttachmentType,
    pub extensible_virtual_disk_type: Option<String>,
}
