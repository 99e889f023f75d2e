pub mod assemble;
pub mod config_cmd;
pub mod models;
pub mod window;
