/// Registry root under which template configs are kept.
pub const TEMPLATE_CONFIG_NAMESPACE: &str = "LateClone";

/// Field holding the encoded template config of a template id.
pub const TEMPLATE_CONFIG_FIELD: &str = "UVMConfig";

pub const TEMPLATE_CONFIG_FORMAT_VERSION: u32 = 1;

pub const DEFAULT_DATA_DIR: &str = "data";
