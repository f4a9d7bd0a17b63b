//! The load cycle: pack sources in, compiled programs and session state out.
//!
//! One [ShaderLoader::load] call walks the expected program set through
//! discovery, configuration and compilation:
//!
//! 1. stage-1 preprocessing per program, hopping the fallback chain while
//!    both stages are absent,
//! 2. locale and `shaders.properties` (itself preprocessed against the
//!    builtin macros plus the discovered define values),
//! 3. the config screen model from the configurable stage-1 options,
//! 4. stage-2 configuration with the persisted option snapshot applied,
//! 5. native compilation into a [ShaderPool], with render params harvested
//!    from the surviving consts.
//!
//! Absent non-essential programs are not an error; a program missing only
//! one of its two stages is.

use std::collections::{HashMap, HashSet};

use anyhow::bail;
use shaderpack::{
    ContentProvider, DedupOptionList, MacroBuilder, NativeBuffer, Preprocessor, ShaderOption,
    ShaderProperties, Stage1, Stage2, Value,
};
use tracing::{debug, error, info, warn};

use crate::builtin;
use crate::env::{build_builtin_macros, ResolvedEnv};
use crate::locale::{Locale, DEFAULT_LANG};
use crate::params::{mipmap_enabled_buffer, OutParams, OutParamsBuilder};
use crate::pool::{CompiledProgram, NativeCompiler, ShaderPool};
use crate::registry::{ShaderKey, ShaderTypeRegistry};
use crate::report::LoadReport;
use crate::screen::ConfigScreen;

/// Everything a finished load hands to the session.
#[derive(Debug)]
pub struct LoadOutput {
    pub pool: ShaderPool,
    pub screen: ConfigScreen,
    pub params: OutParams,
    pub locale: Locale,
    pub report: LoadReport,
}

/// One-shot loader over a pack. Configuration is applied with the builder
/// methods before [ShaderLoader::load]; the loader itself stays immutable so
/// a session can re-run it after a config change.
pub struct ShaderLoader<'a> {
    pack: &'a dyn ContentProvider,
    registry: &'a ShaderTypeRegistry,
    env: ResolvedEnv,
    config: HashMap<String, Value>,
    world: Option<String>,
    language: Option<String>,
}

impl<'a> ShaderLoader<'a> {
    pub fn new(
        pack: &'a dyn ContentProvider,
        registry: &'a ShaderTypeRegistry,
        env: ResolvedEnv,
    ) -> Self {
        Self {
            pack,
            registry,
            env,
            config: HashMap::new(),
            world: None,
            language: None,
        }
    }

    /// Applies a persisted option snapshot in `name=value` line format.
    /// `#` starts a comment; lines without a separator are logged and
    /// skipped.
    pub fn with_config(mut self, text: &str) -> Self {
        for line in text.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((name, value)) => {
                    self.config
                        .insert(name.trim().to_owned(), Value::detect(value.trim()));
                }
                None => warn!(line, "invalid shader config line"),
            }
        }
        self
    }

    /// Dimension-specialized packs keep complete program sets in a
    /// sub-directory of `shaders/`.
    pub fn with_world(mut self, world: impl Into<String>) -> Self {
        self.world = Some(world.into());
        self
    }

    /// Locale loaded on top of `en_US`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Pack-relative stem the sources of `key` live under, without the
    /// stage extension.
    fn stem(&self, key: &ShaderKey) -> String {
        let stem = key.source_stem();
        if let Some(world) = &self.world {
            if let Some(rest) = stem.strip_prefix("/shaders/") {
                return format!("/shaders/{world}/{rest}");
            }
        }
        stem
    }

    fn stem_for_program(&self, program: &str) -> String {
        match &self.world {
            Some(world) => format!("/shaders/{world}/{program}"),
            None => format!("/shaders/{program}"),
        }
    }

    pub fn load(&self, expected: &[ShaderKey], gl: &mut dyn NativeCompiler) -> LoadOutput {
        let mut report = LoadReport::new();
        let pre = Preprocessor::new(self.pack);

        // discover
        let mut defines_stage1 = DedupOptionList::new();
        let mut consts_stage1 = DedupOptionList::new();
        let mut programs: Vec<Stage1Program> = Vec::new();
        for key in expected {
            if let Some(program) = self.run_program_stage1(
                &pre,
                key,
                &mut defines_stage1,
                &mut consts_stage1,
                &mut report,
            ) {
                programs.push(program);
            }
        }
        self.check_unknown_config(&defines_stage1, &consts_stage1, &mut report);

        let locale = match &self.language {
            Some(lang) if lang != DEFAULT_LANG => Locale::load(self.pack, &[DEFAULT_LANG, lang]),
            _ => Locale::load(self.pack, &[DEFAULT_LANG]),
        };

        // configure
        let properties_macros = self.properties_macros(&defines_stage1);
        let properties = self.parse_properties(&pre, &properties_macros);
        let mut params = OutParamsBuilder::new();
        if let Some(props) = &properties {
            params.apply_properties(props);
        }
        let disabled = self.disabled_programs(properties.as_ref(), &properties_macros);
        let screen = ConfigScreen::build(
            self.read_stage1_options(&defines_stage1, &consts_stage1),
            properties.as_ref(),
        );

        // compile
        let mut pool = ShaderPool::new();
        if !disabled.is_empty() {
            pool.set_disabled(disabled);
        }
        let mut consts_stage2 = DedupOptionList::new();
        let mut vert_buf = NativeBuffer::new();
        let mut frag_buf = NativeBuffer::new();
        for program in programs {
            let mut mipmap_enabled: Vec<String> = Vec::new();
            let mut vert = program.vert.configure();
            self.fetch_stage2(&mut vert, &mut consts_stage2, &mut mipmap_enabled);
            let mut frag = program.frag.configure();
            self.fetch_stage2(&mut frag, &mut consts_stage2, &mut mipmap_enabled);
            let render_targets = frag.render_targets().map(<[i32]>::to_vec);

            vert.write_native(&mut vert_buf, true);
            frag.write_native(&mut frag_buf, true);
            match gl.compile(&program.path, vert_buf.as_bytes(), frag_buf.as_bytes()) {
                Ok(handle) => {
                    debug!(shader = %program.key, path = %program.path, "compiled shader");
                    pool.insert(
                        program.key,
                        CompiledProgram {
                            path: program.path,
                            program: handle,
                            mipmap_enabled,
                            render_targets,
                            actual_key: program.actual,
                        },
                        gl,
                    );
                }
                Err(e) => {
                    error!(shader = %program.key, error = %e, "shader compilation failed");
                    report.record_error(&program.key);
                }
            }
        }

        for opt in consts_stage2.options() {
            params.apply_const(opt);
        }

        info!(programs = pool.len(), "shader pack loaded");
        LoadOutput {
            pool,
            screen,
            params: params.build(),
            locale,
            report,
        }
    }

    /// Stage-1 both stages of one program, walking the fallback chain while
    /// neither stage exists. A program with exactly one stage present is
    /// broken and reported.
    fn run_program_stage1(
        &self,
        pre: &Preprocessor<'_>,
        key: &ShaderKey,
        defines: &mut DedupOptionList,
        consts: &mut DedupOptionList,
        report: &mut LoadReport,
    ) -> Option<Stage1Program> {
        let requested_path = self.stem(key);
        let mut actual = key.clone();
        loop {
            let path = self.stem(&actual);
            let vert = self.run_stage1(pre, &format!("{path}.vsh"), defines, consts);
            let frag = self.run_stage1(pre, &format!("{path}.fsh"), defines, consts);
            match (vert, frag) {
                (None, None) => match self.registry.fallback(&actual) {
                    Some(next) => actual = next.clone(),
                    None => return None,
                },
                (Some(vert), Some(frag)) => {
                    if actual != *key {
                        report.record_fallback(key, &actual);
                    }
                    return Some(Stage1Program {
                        key: key.clone(),
                        actual,
                        path: requested_path,
                        vert,
                        frag,
                    });
                }
                (vert, _) => {
                    let missing = if vert.is_none() { "vertex" } else { "fragment" };
                    error!(shader = %key, path = %path, missing, "shader is missing one stage");
                    report.record_error(key);
                    return None;
                }
            }
        }
    }

    /// Stage-1 one compilation unit: inject the builtin macros, apply the
    /// config snapshot to its defines, accumulate the option discovery.
    fn run_stage1(
        &self,
        pre: &Preprocessor<'_>,
        path: &str,
        defines: &mut DedupOptionList,
        consts: &mut DedupOptionList,
    ) -> Option<Stage1> {
        let mut stage1 = pre.stage1(path, true)?;
        build_builtin_macros(stage1.macros_mut(), &self.env);
        let names: Vec<String> = stage1.defines().iter().map(|o| o.name.clone()).collect();
        for name in names {
            if let Some(value) = self.config.get(&name) {
                if let Some(opt) = stage1.define_mut(&name) {
                    opt.set_current_value(value);
                }
            }
        }
        defines.add_all(stage1.defines().iter().cloned());
        consts.add_all(stage1.consts().iter().cloned());
        Some(stage1)
    }

    fn check_unknown_config(
        &self,
        defines: &DedupOptionList,
        consts: &DedupOptionList,
        report: &mut LoadReport,
    ) {
        for (name, value) in &self.config {
            if defines.get(name).is_none() && consts.get(name).is_none() {
                warn!(name = %name, value = %value, "config entry does not match any pack option");
                report.record_unknown_config(name, &value.to_string());
            }
        }
    }

    /// The macro environment `shaders.properties` conditionals and program
    /// enable expressions see: builtins plus the configured define values.
    fn properties_macros(&self, defines: &DedupOptionList) -> MacroBuilder {
        let mut builder = MacroBuilder::new();
        build_builtin_macros(&mut builder, &self.env);
        for opt in defines.options() {
            builder.set(opt.name.clone(), opt.current_value().clone());
        }
        builder
    }

    fn parse_properties(
        &self,
        pre: &Preprocessor<'_>,
        macros: &MacroBuilder,
    ) -> Option<ShaderProperties> {
        let mut stage1 = pre.stage1("/shaders/shaders.properties", false)?;
        stage1.macros_mut().extend(macros);
        Some(ShaderProperties::parse(&stage1.configure().to_text()))
    }

    /// Source paths of programs whose `program.<name>.enabled` expression
    /// evaluates false.
    fn disabled_programs(
        &self,
        properties: Option<&ShaderProperties>,
        macros: &MacroBuilder,
    ) -> HashSet<String> {
        let mut disabled = HashSet::new();
        let Some(props) = properties else {
            return disabled;
        };
        let env = macros.to_env();
        for program in props.program_enable() {
            let key = format!("program.{program}.enabled");
            if props.bool_expr(&env, &key) == Some(false) {
                debug!(program = %program, "program disabled by pack properties");
                disabled.insert(self.stem_for_program(program));
            }
        }
        disabled
    }

    /// Writable copies of every configurable stage-1 option, with the config
    /// snapshot applied to consts. Defines already carry theirs from
    /// discovery.
    fn read_stage1_options(
        &self,
        defines: &DedupOptionList,
        consts: &DedupOptionList,
    ) -> Vec<ShaderOption> {
        let mut out = Vec::new();
        for opt in defines.options() {
            if opt.is_configurable() {
                out.push(opt.copy_with_mutability(false));
            }
        }
        for opt in consts.options() {
            if opt.is_configurable() {
                let mut copy = opt.copy_with_mutability(false);
                if let Some(value) = self.config.get(&copy.name) {
                    copy.set_current_value(value);
                }
                out.push(copy);
            }
        }
        out
    }

    /// Applies the config snapshot to the surviving consts and harvests them
    /// together with the per-buffer mipmap toggles.
    fn fetch_stage2(
        &self,
        stage2: &mut Stage2,
        consts: &mut DedupOptionList,
        mipmap_enabled: &mut Vec<String>,
    ) {
        let names: Vec<String> = stage2.consts().iter().map(|o| o.name.clone()).collect();
        for name in names {
            if let Some(value) = self.config.get(&name) {
                if let Some(opt) = stage2.const_mut(&name) {
                    opt.set_current_value(value);
                }
            }
        }
        for opt in stage2.consts() {
            if let Some(buffer) = mipmap_enabled_buffer(opt) {
                if !mipmap_enabled.iter().any(|b| b == buffer) {
                    mipmap_enabled.push(buffer.to_owned());
                }
            }
            consts.add(opt.clone());
        }
    }
}

/// Per-reload recovery tier: a pack that contributes no programs at all is
/// replaced with the built-in default pack and the load re-runs. Only the
/// default pack failing too is unrecoverable.
///
/// The retry intentionally drops the broken pack's config snapshot and world
/// specialization; the default pack has no options to configure.
pub fn load_or_default(
    loader: &ShaderLoader<'_>,
    expected: &[ShaderKey],
    gl: &mut dyn NativeCompiler,
) -> anyhow::Result<LoadOutput> {
    let out = loader.load(expected, gl);
    if !out.pool.is_empty() {
        return Ok(out);
    }
    warn!("pack contributed no programs, retrying with the built-in default pack");
    let default_pack = builtin::default_pack();
    let retry =
        ShaderLoader::new(&default_pack, loader.registry, loader.env.clone()).load(expected, gl);
    if retry.pool.is_empty() {
        bail!("built-in default pack contributed no programs");
    }
    Ok(retry)
}

/// One program that survived discovery, suspended before configuration.
struct Stage1Program {
    key: ShaderKey,
    actual: ShaderKey,
    /// Requested source stem, before any fallback hop.
    path: String,
    vert: Stage1,
    frag: Stage1,
}
