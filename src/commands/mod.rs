//! CLI subcommands (component K, §4.K).

pub mod config_cmd;
pub mod run;

pub use config_cmd::{handle_config_init, handle_config_show};
pub use run::handle_run;
