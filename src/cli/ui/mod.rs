pub mod message;

pub const MESSAGE_PADDING: usize = 3;
