use anyhow::Result;
use tracing::{debug, info};

use crate::{clone::TemplateRegistry, machinery::store::Registry, uvm::UtilityVm};

/// Turns a live VM into a template and saves what clones need to reattach.
///
/// Clones get their own shared mounts and their own GCS connection, so both
/// are torn down before the config is generated. Steps run strictly in order
/// and the first failure is returned as is. Nothing already done is undone:
/// on error the VM may be left with its mounts detached and the caller decides
/// what to do with it.
pub async fn save_as_template<V, R>(host: &V, templates: &TemplateRegistry<R>) -> Result<()>
where
    V: UtilityVm + ?Sized,
    R: Registry,
{
    let vm_id = host.id();

    debug!(vm_id, "detaching shared mounts");
    host.detach_all_shared_mounts().await?;

    debug!(vm_id, "closing control channel");
    host.close_control_channel().await?;

    let config = host.generate_template_config().await?;
    debug!(
        vm_id,
        template_id = %config.template_id,
        resources = config.resources.len(),
        "generated template config"
    );

    templates.save_template_config(&config)?;

    host.mark_as_template().await?;

    info!(vm_id, template_id = %config.template_id, "saved VM as template");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::bail;
    use async_trait::async_trait;
    use thiserror::Error;

    use super::*;
    use crate::{
        clone::TemplateError,
        machinery::store::Store,
        uvm::{AttachmentType, ResourceDescriptor, ScsiMount, TemplateConfig, VsmbShare},
    };

    #[derive(Debug, Error)]
    #[error("gcs connection refused to close")]
    struct ChannelCloseError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        DetachMounts,
        CloseChannel,
        Generate,
        MarkTemplate,
    }

    struct FakeVm {
        id: String,
        fail_at: Option<Step>,
        calls: Mutex<Vec<Step>>,
        resources: Mutex<Vec<ResourceDescriptor>>,
        channel_open: Mutex<bool>,
        is_template: Mutex<bool>,
    }

    impl FakeVm {
        fn new(id: &str, fail_at: Option<Step>) -> Self {
            let resources = vec![
                ResourceDescriptor::NetworkShare(VsmbShare {
                    host_path: "C:\\shares\\app".to_string(),
                    name: "app".to_string(),
                    guest_path: "C:\\app".to_string(),
                    allowed_files: vec![],
                    options: Default::default(),
                }),
                ResourceDescriptor::BlockStorage(ScsiMount {
                    host_path: "C:\\layers\\scratch.vhdx".to_string(),
                    uvm_path: "/tmp/scratch".to_string(),
                    controller: 0,
                    lun: 0,
                    read_only: false,
                    attachment_type: AttachmentType::VirtualDisk,
                    extensible_virtual_disk_type: None,
                }),
            ];

            Self {
                id: id.to_string(),
                fail_at,
                calls: Mutex::new(vec![]),
                resources: Mutex::new(resources),
                channel_open: Mutex::new(true),
                is_template: Mutex::new(false),
            }
        }

        fn record(&self, step: Step) -> Result<()> {
            self.calls.lock().expect("calls lock poisoned").push(step);
            if self.fail_at == Some(step) {
                if step == Step::CloseChannel {
                    return Err(ChannelCloseError.into());
                }
                bail!("{:?} failed", step);
            }
            Ok(())
        }

        fn calls(&self) -> Vec<Step> {
            self.calls.lock().expect("calls lock poisoned").clone()
        }
    }

    #[async_trait]
    impl UtilityVm for FakeVm {
        fn id(&self) -> &str {
            &self.id
        }

        async fn detach_all_shared_mounts(&self) -> Result<()> {
            self.record(Step::DetachMounts)?;
            self.resources
                .lock()
                .expect("resources lock poisoned")
                .retain(|r| !matches!(r, ResourceDescriptor::NetworkShare(_)));
            Ok(())
        }

        async fn close_control_channel(&self) -> Result<()> {
            self.record(Step::CloseChannel)?;
            *self.channel_open.lock().expect("channel lock poisoned") = false;
            Ok(())
        }

        async fn generate_template_config(&self) -> Result<TemplateConfig> {
            self.record(Step::Generate)?;
            Ok(TemplateConfig {
                template_id: self.id.clone(),
                resources: self.resources.lock().expect("resources lock poisoned").clone(),
            })
        }

        async fn mark_as_template(&self) -> Result<()> {
            self.record(Step::MarkTemplate)?;
            *self.is_template.lock().expect("template lock poisoned") = true;
            Ok(())
        }
    }

    async fn template_registry() -> (tempfile::TempDir, TemplateRegistry<Store>) {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let store = Store::new(dir.path())
            .await
            .expect("failed to create store");

        (dir, TemplateRegistry::new(store))
    }

    #[tokio::test]
    async fn test_save_as_template() {
        let (_dir, templates) = template_registry().await;
        let vm = FakeVm::new("uvm-template", None);

        save_as_template(&vm, &templates)
            .await
            .expect("failed to save as template");

        assert_eq!(
            vm.calls(),
            vec![
                Step::DetachMounts,
                Step::CloseChannel,
                Step::Generate,
                Step::MarkTemplate
            ]
        );
        assert!(!*vm.channel_open.lock().expect("channel lock poisoned"));
        assert!(*vm.is_template.lock().expect("template lock poisoned"));

        let config = templates
            .fetch_template_config("uvm-template")
            .expect("failed to fetch template config");
        assert_eq!(config.resources.len(), 1);
        assert!(matches!(
            config.resources[0],
            ResourceDescriptor::BlockStorage(_)
        ));
    }

    #[tokio::test]
    async fn test_control_channel_failure_stops_workflow() {
        let (_dir, templates) = template_registry().await;
        let vm = FakeVm::new("uvm-template", Some(Step::CloseChannel));

        let err = save_as_template(&vm, &templates).await.unwrap_err();

        assert!(err.downcast_ref::<ChannelCloseError>().is_some());
        assert_eq!(err.chain().count(), 1);
        assert_eq!(vm.calls(), vec![Step::DetachMounts, Step::CloseChannel]);

        // mounts stay detached, nothing is rolled back
        assert_eq!(vm.resources.lock().expect("resources lock poisoned").len(), 1);
        assert!(!*vm.is_template.lock().expect("template lock poisoned"));

        let err = templates
            .fetch_template_config("uvm-template")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_existing_template_stops_workflow() {
        let (_dir, templates) = template_registry().await;
        templates
            .save_template_config(&TemplateConfig::new("uvm-template"))
            .expect("failed to save template config");

        let vm = FakeVm::new("uvm-template", None);
        let err = save_as_template(&vm, &templates).await.unwrap_err();

        let err = err
            .downcast_ref::<TemplateError>()
            .expect("expected a template error");
        assert!(err.is_conflict());
        assert_eq!(
            vm.calls(),
            vec![Step::DetachMounts, Step::CloseChannel, Step::Generate]
        );
        assert!(!*vm.is_template.lock().expect("template lock poisoned"));

        let config = templates
            .fetch_template_config("uvm-template")
            .expect("failed to fetch template config");
        assert!(config.resources.is_empty());
    }

    #[tokio::test]
    async fn test_mark_failure_keeps_saved_config() {
        let (_dir, templates) = template_registry().await;
        let vm = FakeVm::new("uvm-template", Some(Step::MarkTemplate));

        let err = save_as_template(&vm, &templates).await.unwrap_err();
        assert_eq!(err.to_string(), "MarkTemplate failed");

        templates
            .fetch_template_config("uvm-template")
            .expect("config should stay saved");
    }
}
