//! Host environment description and the builtin macro set derived from it.
//!
//! Types:
//! - [EnvInfo]: versions, driver identity, and extension list reported by the host
//! - [AuxParams]: tuning values the host passes alongside the environment
//! - [GlVendor], [GlRenderer], [Os]: driver and platform classification
//!
//! Functions:
//! - [pack_semver]: collapse a dotted version string into a single integer
//! - [build_builtin_macros]: produce the macro set injected into every shader

use shaderpack::{MacroBuilder, Value};

use crate::stage::RenderStage;

pub const ENGINE_MACRO: &str = "IS_PRISMPIPE";
pub const ENGINE_VERSION_MACRO: &str = "PRISMPIPE_VERSION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlVendor {
    Ati,
    Intel,
    Nvidia,
    Amd,
    Xorg,
    Other,
}

impl GlVendor {
    pub fn macro_name(self) -> &'static str {
        match self {
            GlVendor::Ati => "MC_GL_VENDOR_ATI",
            GlVendor::Intel => "MC_GL_VENDOR_INTEL",
            GlVendor::Nvidia => "MC_GL_VENDOR_NVIDIA",
            GlVendor::Amd => "MC_GL_VENDOR_AMD",
            GlVendor::Xorg => "MC_GL_VENDOR_XORG",
            GlVendor::Other => "MC_GL_VENDOR_OTHER",
        }
    }

    /// Classifies the raw `GL_VENDOR` string.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("ati technologies") {
            GlVendor::Ati
        } else if lower.contains("intel") {
            GlVendor::Intel
        } else if lower.contains("nvidia") {
            GlVendor::Nvidia
        } else if lower.contains("amd") || lower.contains("advanced micro devices") {
            GlVendor::Amd
        } else if lower.contains("x.org") {
            GlVendor::Xorg
        } else {
            GlVendor::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlRenderer {
    Radeon,
    Gallium,
    Intel,
    GeForce,
    Quadro,
    Mesa,
    Other,
}

impl GlRenderer {
    pub fn macro_name(self) -> &'static str {
        match self {
            GlRenderer::Radeon => "MC_GL_RENDERER_RADEON",
            GlRenderer::Gallium => "MC_GL_RENDERER_GALLIUM",
            GlRenderer::Intel => "MC_GL_RENDERER_INTEL",
            GlRenderer::GeForce => "MC_GL_RENDERER_GEFORCE",
            GlRenderer::Quadro => "MC_GL_RENDERER_QUADRO",
            GlRenderer::Mesa => "MC_GL_RENDERER_MESA",
            GlRenderer::Other => "MC_GL_RENDERER_OTHER",
        }
    }

    /// Classifies the raw `GL_RENDERER` string.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains("gallium") {
            GlRenderer::Gallium
        } else if lower.contains("radeon") {
            GlRenderer::Radeon
        } else if lower.contains("geforce") {
            GlRenderer::GeForce
        } else if lower.contains("quadro") {
            GlRenderer::Quadro
        } else if lower.contains("intel") {
            GlRenderer::Intel
        } else if lower.contains("mesa") {
            GlRenderer::Mesa
        } else {
            GlRenderer::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Windows,
    Mac,
    Linux,
    Other,
}

impl Os {
    pub fn macro_name(self) -> &'static str {
        match self {
            Os::Windows => "MC_OS_WINDOWS",
            Os::Mac => "MC_OS_MAC",
            Os::Linux => "MC_OS_LINUX",
            Os::Other => "MC_OS_OTHER",
        }
    }

    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::Mac
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else {
            Os::Other
        }
    }
}

/// What the host reports about itself. All version strings are kept raw and
/// packed lazily so a garbage driver string degrades to zeros instead of
/// failing the load.
#[derive(Debug, Clone)]
pub struct EnvInfo {
    pub app_version: String,
    pub engine_version: String,
    pub gl_version: String,
    pub glsl_version: String,
    pub gl_vendor: GlVendor,
    pub gl_renderer: GlRenderer,
    pub os: Os,
    pub extensions: Vec<String>,
}

/// Tuning values passed alongside [EnvInfo]. Quality values follow the
/// convention of 0.5 fast, 1.0 default, 2.0 fancy.
#[derive(Debug, Clone, Copy)]
pub struct AuxParams {
    pub hand_depth: f64,
    pub render_quality: f64,
    pub shadow_quality: f64,
}

impl Default for AuxParams {
    fn default() -> Self {
        Self {
            hand_depth: 0.125,
            render_quality: 1.0,
            shadow_quality: 1.0,
        }
    }
}

/// Collapses `major.minor.patch` into `major*mul_major + minor*mul_minor +
/// patch*mul_patch`. Missing or unparseable components count as zero.
pub fn pack_semver(version: &str, mul_major: i32, mul_minor: i32, mul_patch: i32) -> i32 {
    let mut parts = version.splitn(4, '.');
    let mut next = || {
        parts
            .next()
            .and_then(|p| p.trim().parse::<i32>().ok())
            .unwrap_or(0)
    };
    next() * mul_major + next() * mul_minor + next() * mul_patch
}

/// The packed macro values derived once from an [EnvInfo], in the shape the
/// define injection wants them.
#[derive(Debug, Clone)]
pub struct ResolvedEnv {
    pub app_version: i32,
    pub engine_version: i32,
    pub gl_version: i32,
    pub glsl_version: i32,
    pub vendor_macro: &'static str,
    pub renderer_macro: &'static str,
    pub os_macro: &'static str,
    /// Sorted, each prefixed with `MC_`.
    pub extension_macros: Vec<String>,
    pub aux: AuxParams,
}

impl ResolvedEnv {
    pub fn new(env: &EnvInfo, aux: AuxParams) -> Self {
        let first_token = |s: &str| s.split(' ').next().unwrap_or("").to_owned();
        let mut extension_macros: Vec<String> =
            env.extensions.iter().map(|e| format!("MC_{e}")).collect();
        extension_macros.sort();
        Self {
            app_version: pack_semver(&env.app_version, 1_00_00, 1_00, 1),
            engine_version: pack_semver(&env.engine_version, 1_00_00, 1_00, 1),
            gl_version: pack_semver(&first_token(&env.gl_version), 100, 10, 1),
            glsl_version: pack_semver(&first_token(&env.glsl_version), 100, 1, 0),
            vendor_macro: env.gl_vendor.macro_name(),
            renderer_macro: env.gl_renderer.macro_name(),
            os_macro: env.os.macro_name(),
            extension_macros,
            aux,
        }
    }
}

/// Appends the builtin macro set to `builder`. Order is stable so the emitted
/// define prelude is reproducible across loads.
pub fn build_builtin_macros(builder: &mut MacroBuilder, env: &ResolvedEnv) {
    builder.flag(env.vendor_macro);
    builder.flag(env.renderer_macro);
    builder.set("MC_GL_VERSION", env.gl_version);
    builder.set("MC_GLSL_VERSION", env.glsl_version);
    builder.set("MC_HAND_DEPTH", env.aux.hand_depth);
    builder.set("MC_RENDER_QUALITY", env.aux.render_quality);
    builder.set("MC_SHADOW_QUALITY", env.aux.shadow_quality);
    builder.set("MC_VERSION", env.app_version);
    builder.flag(env.os_macro);
    for stage in RenderStage::ALL {
        builder.set(stage.macro_name(), Value::Int(stage.ordinal()));
    }
    for ext in &env.extension_macros {
        builder.flag(ext);
    }
    builder.flag(ENGINE_MACRO);
    builder.set(ENGINE_VERSION_MACRO, env.engine_version);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> EnvInfo {
        EnvInfo {
            app_version: "1.7.10".into(),
            engine_version: "0.5.2".into(),
            gl_version: "4.6.0 NVIDIA 535.183.01".into(),
            glsl_version: "4.60 NVIDIA".into(),
            gl_vendor: GlVendor::Nvidia,
            gl_renderer: GlRenderer::GeForce,
            os: Os::Linux,
            extensions: vec![
                "GL_EXT_gpu_shader4".into(),
                "GL_ARB_shader_texture_lod".into(),
            ],
        }
    }

    #[test]
    fn semver_packing() {
        assert_eq!(pack_semver("1.7.10", 1_00_00, 1_00, 1), 10710);
        assert_eq!(pack_semver("4.6.0", 100, 10, 1), 460);
        assert_eq!(pack_semver("4.60", 100, 1, 0), 460);
        assert_eq!(pack_semver("garbage", 100, 10, 1), 0);
        assert_eq!(pack_semver("2", 1_00_00, 1_00, 1), 20000);
    }

    #[test]
    fn resolved_env_takes_first_token_of_gl_strings() {
        let r = ResolvedEnv::new(&env(), AuxParams::default());
        assert_eq!(r.gl_version, 460);
        assert_eq!(r.glsl_version, 460);
        assert_eq!(r.app_version, 10710);
        assert_eq!(r.engine_version, 502);
        assert_eq!(
            r.extension_macros,
            vec!["MC_GL_ARB_shader_texture_lod", "MC_GL_EXT_gpu_shader4"]
        );
    }

    #[test]
    fn builtin_macros_cover_stages_and_identity() {
        let r = ResolvedEnv::new(&env(), AuxParams::default());
        let mut b = MacroBuilder::new();
        build_builtin_macros(&mut b, &r);
        let macros = b.to_env();
        assert_eq!(macros.get("MC_GL_VERSION"), Some(&Value::Int(460)));
        assert_eq!(macros.get("MC_VERSION"), Some(&Value::Int(10710)));
        assert_eq!(macros.get("MC_GL_VENDOR_NVIDIA"), Some(&Value::Toggle(true)));
        assert_eq!(macros.get("MC_OS_LINUX"), Some(&Value::Toggle(true)));
        assert_eq!(
            macros.get("MC_RENDER_STAGE_TERRAIN_SOLID"),
            Some(&Value::Int(RenderStage::TerrainSolid.ordinal()))
        );
        assert_eq!(macros.get(ENGINE_MACRO), Some(&Value::Toggle(true)));
        assert_eq!(macros.get(ENGINE_VERSION_MACRO), Some(&Value::Int(502)));
    }

    #[test]
    fn vendor_and_renderer_classification() {
        assert_eq!(GlVendor::classify("NVIDIA Corporation"), GlVendor::Nvidia);
        assert_eq!(GlVendor::classify("Intel Open Source"), GlVendor::Intel);
        assert_eq!(GlVendor::classify("X.Org"), GlVendor::Xorg);
        assert_eq!(
            GlRenderer::classify("AMD Radeon RX 6800 XT"),
            GlRenderer::Radeon
        );
        assert_eq!(
            GlRenderer::classify("Mesa Intel(R) UHD Graphics"),
            GlRenderer::Intel
        );
        assert_eq!(GlRenderer::classify("llvmpipe"), GlRenderer::Other);
    }
}
