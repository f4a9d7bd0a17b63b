use std::fs;

use anyhow::{bail, Context, Result};
use pipeline::{
    AuxParams, CompileError, EnvInfo, GlRenderer, GlVendor, LoadOutput, NativeCompiler, Os,
    ProgramHandle, ResolvedEnv, ShaderCatalogue, ShaderLoader, ShaderTypeRegistry,
};
use shaderpack::DirProvider;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Host version the lint pretends to run under. Packs key version checks off
/// `MC_VERSION`, so this stays at the release the format targets.
const APP_VERSION: &str = "1.7.10";

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing();

    let out = lint(&args)?;
    out.report.log_summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&out.report)?);
    } else {
        print_summary(&out);
    }
    if !out.report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

pub fn lint(args: &Cli) -> Result<LoadOutput> {
    if !args.pack.join("shaders").is_dir() {
        bail!(
            "{} does not look like a shaderpack (no shaders/ directory)",
            args.pack.display()
        );
    }
    let pack = DirProvider::new(&args.pack);
    let config = match &args.config {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?,
        ),
        None => None,
    };

    let catalogue = ShaderCatalogue::new();
    let registry = ShaderTypeRegistry::with_defaults(&catalogue);
    let env = ResolvedEnv::new(
        &EnvInfo {
            app_version: APP_VERSION.to_owned(),
            engine_version: env!("CARGO_PKG_VERSION").to_owned(),
            gl_version: args.gl_version.clone(),
            glsl_version: args.glsl_version.clone(),
            gl_vendor: GlVendor::Other,
            gl_renderer: GlRenderer::Other,
            os: Os::current(),
            extensions: Vec::new(),
        },
        AuxParams::default(),
    );

    let mut loader = ShaderLoader::new(&pack, &registry, env);
    if let Some(text) = &config {
        loader = loader.with_config(text);
    }
    if let Some(world) = &args.world {
        loader = loader.with_world(world.clone());
    }
    if let Some(language) = &args.language {
        loader = loader.with_language(language.clone());
    }

    let mut gl = DryCompiler::default();
    tracing::debug!(pack = %args.pack.display(), "linting shaderpack");
    Ok(loader.load(catalogue.general(), &mut gl))
}

fn print_summary(out: &LoadOutput) {
    println!("programs compiled: {}", out.pool.len());
    println!("configurable options: {}", out.screen.options().len());
    println!("profiles: {}", out.screen.profiles().len());
    for path in out.pool.disabled() {
        println!("disabled: {path}");
    }
    for fb in &out.report.fallbacks {
        println!("fallback: {} -> {}", fb.requested, fb.actual);
    }
    for (name, value) in &out.report.unknown_config {
        println!("stale config: {name}={value}");
    }
    for name in &out.report.errored {
        println!("ERROR: {name}");
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Accepts every program without touching a GPU. Lint checks source
/// discovery and preprocessing, not driver behavior.
#[derive(Debug, Default)]
struct DryCompiler {
    next: u32,
}

impl NativeCompiler for DryCompiler {
    fn compile(
        &mut self,
        _name: &str,
        _vertex: &[u8],
        _fragment: &[u8],
    ) -> Result<ProgramHandle, CompileError> {
        self.next += 1;
        Ok(ProgramHandle(self.next))
    }

    fn delete_program(&mut self, _program: ProgramHandle) {}
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cli::Cli;

    fn args(pack: PathBuf) -> Cli {
        Cli {
            pack,
            config: None,
            world: None,
            language: None,
            gl_version: "4.6.0".to_owned(),
            glsl_version: "4.60".to_owned(),
            json: false,
        }
    }

    #[test]
    fn rejects_directories_without_shaders() {
        let dir = tempfile::tempdir().unwrap();
        let err = lint(&args(dir.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("shaders/"));
    }

    #[test]
    fn lints_a_minimal_pack_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let shaders = dir.path().join("shaders");
        fs::create_dir(&shaders).unwrap();
        let plain = "#version 120\nvoid main() {}\n";
        fs::write(shaders.join("gbuffers_basic.vsh"), plain).unwrap();
        fs::write(shaders.join("gbuffers_basic.fsh"), plain).unwrap();
        fs::write(shaders.join("final.vsh"), plain).unwrap();
        fs::write(shaders.join("final.fsh"), plain).unwrap();

        let out = lint(&args(dir.path().to_path_buf())).unwrap();
        assert!(out.report.is_clean());
        // every gbuffers program resolves onto basic via the fallback forest
        assert!(out.pool.len() >= 2);
        assert!(!out.report.fallbacks.is_empty());
    }
}
