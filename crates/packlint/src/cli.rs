use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "packlint",
    author,
    version,
    about = "Dry-runs a shaderpack through discovery, configuration and compilation"
)]
pub struct Cli {
    /// Pack root directory (the one containing `shaders/`).
    #[arg(value_name = "PACK_DIR")]
    pub pack: PathBuf,

    /// Persisted option snapshot to apply, in `name=value` line format.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dimension specialization sub-directory of `shaders/` to load from.
    #[arg(long, value_name = "DIR")]
    pub world: Option<String>,

    /// Locale to load on top of `en_US`.
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// GL version string the pack should be checked against.
    #[arg(long, value_name = "VERSION", default_value = "4.6.0")]
    pub gl_version: String,

    /// GLSL version string the pack should be checked against.
    #[arg(long, value_name = "VERSION", default_value = "4.60")]
    pub glsl_version: String,

    /// Emit the load report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}
