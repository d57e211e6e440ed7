pub mod clone;
pub mod config;
pub mod constants;
pub mod machinery;
pub mod utils;
pub mod uvm;
