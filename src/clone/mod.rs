pub mod codec;
pub mod registry;
pub mod workflow;

use thiserror::Error;

use crate::{clone::codec::CodecError, machinery::store::StoreError};

pub use registry::TemplateRegistry;
pub use workflow::save_as_template;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid template id {id:?}")]
    InvalidId { id: String },

    #[error("no saved template config for {id}")]
    NotFound { id: String },

    #[error("parent VM (id: {id}) config already exists in the registry")]
    Conflict { id: String },

    #[error("couldn't verify that parent VM (id: {id}) has no saved config")]
    ExistenceCheck {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to encode template config for {id}")]
    Encode {
        id: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to store encoded template config for {id}")]
    Persist {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to fetch encoded template config for {id}")]
    Load {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to decode template config for {id}")]
    Decode {
        id: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to remove template config for {id}")]
    Remove {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to list saved templates")]
    List {
        #[source]
        source: StoreError,
    },
}

impl TemplateError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TemplateError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TemplateError::Conflict { .. })
    }
}
