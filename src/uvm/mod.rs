pub mod resources;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use resources::{
    AttachmentType, ResourceDescriptor, ScsiMount, VsmbShare, VsmbShareOptions,
};

/// Everything a clone needs to be created from a template: the id of the
/// source VM and the resources that have to be reattached, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub template_id: String,
    pub resources: Vec<ResourceDescriptor>,
}

impl TemplateConfig {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            resources: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<ResourceDescriptor>) -> Self {
        self.resources.push(resource.into());
        self
    }
}

/// Handle to a live utility VM, owned by the VM lifecycle manager.
#[async_trait]
pub trait UtilityVm: Send + Sync {
    fn id(&self) -> &str;

    /// Removes every shared network mount currently attached to the VM.
    async fn detach_all_shared_mounts(&self) -> Result<()>;

    /// Closes the guest control (GCS) connection.
    async fn close_control_channel(&self) -> Result<()>;

    /// Snapshot of the current attachments as a template config.
    async fn generate_template_config(&self) -> Result<TemplateConfig>;

    /// Switches the VM into its template state.
    async fn mark_as_template(&self) -> Result<()>;
}
