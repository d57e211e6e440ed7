use tracing::{debug, info, warn};

use crate::{
    clone::{
        TemplateError,
        codec::{decode_template_config, encode_template_config},
    },
    constants::{TEMPLATE_CONFIG_FIELD, TEMPLATE_CONFIG_NAMESPACE},
    machinery::store::{Key, Registry, RegistryScope, StoreError},
    uvm::TemplateConfig,
};

/// Saved template configs, one record per template id.
///
/// A record is never overwritten: it has to be removed before a template with
/// the same id can be saved again.
pub struct TemplateRegistry<R> {
    registry: R,
}

impl<R: Registry> TemplateRegistry<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    fn load(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let scope = self.registry.open(TEMPLATE_CONFIG_NAMESPACE)?;
        scope.get(id, TEMPLATE_CONFIG_FIELD)
    }

    fn store(&self, id: &str, encoded: &[u8]) -> Result<(), StoreError> {
        let scope = self.registry.open(TEMPLATE_CONFIG_NAMESPACE)?;
        scope.create(id, TEMPLATE_CONFIG_FIELD, encoded)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let scope = match self.registry.open(TEMPLATE_CONFIG_NAMESPACE) {
            Ok(scope) => scope,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        match scope.remove(id) {
            Err(e) if e.is_not_found() => Ok(()),
            result => result,
        }
    }

    /// Saves everything needed to create clones of the template.
    ///
    /// Fails with [`TemplateError::Conflict`] when a config for the same id is
    /// already saved, and refuses to write at all when that can't be ruled out.
    pub fn save_template_config(&self, config: &TemplateConfig) -> Result<(), TemplateError> {
        let id = config.template_id.as_str();
        let key = Key::builder()
            .namespace(TEMPLATE_CONFIG_NAMESPACE)
            .id(id)
            .field(TEMPLATE_CONFIG_FIELD)
            .build();
        if let Err(e) = key {
            warn!(template_id = id, error = %e, "rejected template id");
            return Err(TemplateError::InvalidId { id: id.to_string() });
        }

        match self.load(id) {
            Ok(_) => return Err(TemplateError::Conflict { id: id.to_string() }),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(TemplateError::ExistenceCheck {
                    id: id.to_string(),
                    source: e,
                });
            }
        }

        let encoded = encode_template_config(config).map_err(|e| TemplateError::Encode {
            id: id.to_string(),
            source: e,
        })?;

        match self.store(id, &encoded) {
            Ok(()) => {}
            // lost a race against another save of the same id
            Err(e) if e.is_already_exists() => {
                warn!(template_id = id, "template config was created concurrently");
                return Err(TemplateError::Conflict { id: id.to_string() });
            }
            Err(e) => {
                return Err(TemplateError::Persist {
                    id: id.to_string(),
                    source: e,
                });
            }
        }

        info!(
            template_id = id,
            resources = config.resources.len(),
            bytes = encoded.len(),
            "saved template config"
        );
        Ok(())
    }

    pub fn fetch_template_config(&self, id: &str) -> Result<TemplateConfig, TemplateError> {
        let encoded = self.load(id).map_err(|e| {
            if e.is_not_found() {
                TemplateError::NotFound { id: id.to_string() }
            } else {
                TemplateError::Load {
                    id: id.to_string(),
                    source: e,
                }
            }
        })?;

        let config = decode_template_config(&encoded).map_err(|e| TemplateError::Decode {
            id: id.to_string(),
            source: e,
        })?;

        debug!(template_id = id, "fetched template config");
        Ok(config)
    }

    /// Removes all state saved for the template. Succeeds when there is none.
    pub fn remove_saved_template_config(&self, id: &str) -> Result<(), TemplateError> {
        self.delete(id).map_err(|e| TemplateError::Remove {
            id: id.to_string(),
            source: e,
        })?;

        debug!(template_id = id, "removed template config");
        Ok(())
    }

    pub fn list_saved_templates(&self) -> Result<Vec<String>, TemplateError> {
        let scope = self
            .registry
            .open(TEMPLATE_CONFIG_NAMESPACE)
            .map_err(|e| TemplateError::List { source: e })?;

        scope
            .list_ids()
            .map_err(|e| TemplateError::List { source: e })
    }
}
