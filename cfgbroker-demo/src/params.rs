use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cfgbroker-demo")]
pub struct Params {
    /// Demo/broker settings (TOML). Defaults are used when omitted.
    #[arg(long, env = "CFGBROKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Capability manifest every compartment is built with.
    #[arg(long, env = "CFGBROKER_MANIFEST", default_value = "capabilities.toml")]
    pub manifest: PathBuf,

    #[arg(long, env = "CFGBROKER_LOG_LEVEL", default_value_t = tracing::Level::DEBUG)]
    pub log_level: tracing::Level,
}
