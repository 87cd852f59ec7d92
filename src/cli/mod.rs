pub mod config_cmd;
pub mod once_cmd;
pub mod output;
pub mod parse_cmd;
pub mod renderer;
pub mod watch_cmd;
