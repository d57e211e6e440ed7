use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{constants::TEMPLATE_CONFIG_FORMAT_VERSION, uvm::TemplateConfig};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed template config: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported template config version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    config: &'a TemplateConfig,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    config: serde_json::Value,
}

pub fn encode_template_config(config: &TemplateConfig) -> Result<Vec<u8>, CodecError> {
    let envelope = EnvelopeRef {
        version: TEMPLATE_CONFIG_FORMAT_VERSION,
        config,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

pub fn decode_template_config(bytes: &[u8]) -> Result<TemplateConfig, CodecError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.version != TEMPLATE_CONFIG_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: envelope.version,
            expected: TEMPLATE_CONFIG_FORMAT_VERSION,
        });
    }

    Ok(serde_json::from_value(envelope.config)?)
}
