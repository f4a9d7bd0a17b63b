//! `shaders.properties` parsing.
//!
//! The file is preprocessed as an untyped source first, so what arrives
//! here is already conditionally resolved; `#line` resync lines parse as
//! comments. Keys follow the Java properties format subset packs actually
//! use: `key=value`, `#`/`!` comments, backslash line continuation.

use std::collections::{HashMap, HashSet};

use tracing::error;

use crate::interp::eval_expr;
use crate::option::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Fast,
    Fancy,
    Off,
}

#[derive(Debug, Default)]
pub struct ShaderProperties {
    screen_main: Option<Vec<String>>,
    screen_sub: HashMap<String, Vec<String>>,
    sliders: HashSet<String>,
    profiles: Vec<(String, String)>,
    /// Program names that carry a `program.<name>.enabled` expression.
    program_enable: Vec<String>,
    alpha_test: HashMap<String, String>,
    textures: HashMap<String, String>,
    everything: HashMap<String, String>,
}

impl ShaderProperties {
    pub fn parse(text: &str) -> Self {
        let mut props = ShaderProperties::default();
        for (key, value) in logical_lines(text) {
            props.everything.insert(key.clone(), value.clone());
            if let Some(page) = key.strip_prefix("screen.") {
                props
                    .screen_sub
                    .insert(page.to_string(), split_list(&value));
                continue;
            }
            if key == "screen" {
                props.screen_main = Some(split_list(&value));
                continue;
            }
            if key == "sliders" {
                props.sliders = split_list(&value).into_iter().collect();
                continue;
            }
            if let Some(profile) = key.strip_prefix("profile.") {
                props.profiles.push((profile.to_string(), value));
                continue;
            }
            if let Some(program) = key
                .strip_prefix("program.")
                .and_then(|rest| rest.strip_suffix(".enabled"))
            {
                props.program_enable.push(program.to_string());
                continue;
            }
            if let Some(program) = key.strip_prefix("alphaTest.") {
                props.alpha_test.insert(program.to_string(), value);
                continue;
            }
            if let Some(texture) = key.strip_prefix("texture.") {
                props.textures.insert(texture.to_string(), value);
            }
        }
        props
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.everything.get(name).map(String::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        let input = self.get(name)?;
        match input.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => {
                error!(key = name, value = input, "invalid bool property");
                None
            }
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        let input = self.get(name)?;
        match input.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                error!(key = name, value = input, "invalid int property");
                None
            }
        }
    }

    pub fn double(&self, name: &str) -> Option<f64> {
        let input = self.get(name)?;
        match input.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                error!(key = name, value = input, "invalid double property");
                None
            }
        }
    }

    pub fn quality(&self, name: &str) -> Option<Quality> {
        let input = self.get(name)?;
        match input.to_ascii_lowercase().as_str() {
            "fast" => Some(Quality::Fast),
            "fancy" => Some(Quality::Fancy),
            "off" => Some(Quality::Off),
            _ => {
                error!(key = name, value = input, "invalid quality property");
                None
            }
        }
    }

    /// Evaluates a boolean macro expression property against the macro
    /// snapshot. Malformed expressions are logged and yield None.
    pub fn bool_expr(&self, env: &HashMap<String, Value>, name: &str) -> Option<bool> {
        let input = self.get(name)?;
        match eval_expr(input, env) {
            Ok(v) => Some(v.as_bool()),
            Err(e) => {
                error!(key = name, value = input, error = %e, "invalid bool expression");
                None
            }
        }
    }

    pub fn screen_main(&self) -> Option<&[String]> {
        self.screen_main.as_deref()
    }

    pub fn screen_sub(&self, name: &str) -> Option<&[String]> {
        self.screen_sub.get(name).map(Vec::as_slice)
    }

    pub fn sliders(&self) -> &HashSet<String> {
        &self.sliders
    }

    /// Profiles in declaration order.
    pub fn profiles(&self) -> &[(String, String)] {
        &self.profiles
    }

    pub fn program_enable(&self) -> &[String] {
        &self.program_enable
    }

    pub fn alpha_test(&self) -> &HashMap<String, String> {
        &self.alpha_test
    }

    pub fn textures(&self) -> &HashMap<String, String> {
        &self.textures
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Joins backslash-continued lines and yields `(key, value)` pairs; lines
/// without a separator and comment lines are dropped.
fn logical_lines(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut pending = String::new();
    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }
        if let Some(stripped) = line.strip_suffix('\\') {
            pending.push_str(stripped);
            continue;
        }
        pending.push_str(line);
        let logical = std::mem::take(&mut pending);
        if let Some(sep) = logical.find('=') {
            let key = logical[..sep].trim().to_string();
            let value = logical[sep + 1..].trim().to_string();
            if !key.is_empty() {
                out.push((key, value));
            }
        }
    }
    if !pending.is_empty() {
        if let Some(sep) = pending.find('=') {
            out.push((
                pending[..sep].trim().to_string(),
                pending[sep + 1..].trim().to_string(),
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# comment
clouds=fast
shadowTerrain=false
sun=true
shadowMapResolution=2048
wetnessHalflife=600.0
sliders=SHADOW_DISTANCE GAMMA
screen=GAMMA <profile> [SHADOWS] <empty>
screen.SHADOWS=SHADOW_DISTANCE \\
  SHADOW_FILTER
profile.LOW=SHADOWS:0 !FANCY
profile.HIGH=SHADOWS:1 FANCY
program.composite1.enabled=FANCY
alphaTest.gbuffers_terrain=GREATER 0.1
texture.noise=textures/noise.png
";

    #[test]
    fn parses_typed_values() {
        let p = ShaderProperties::parse(SAMPLE);
        assert_eq!(p.quality("clouds"), Some(Quality::Fast));
        assert_eq!(p.bool("shadowTerrain"), Some(false));
        assert_eq!(p.bool("sun"), Some(true));
        assert_eq!(p.int("shadowMapResolution"), Some(2048));
        assert_eq!(p.double("wetnessHalflife"), Some(600.0));
        assert_eq!(p.bool("clouds"), None);
        assert_eq!(p.int("missing"), None);
    }

    #[test]
    fn parses_screen_layout() {
        let p = ShaderProperties::parse(SAMPLE);
        assert_eq!(
            p.screen_main().unwrap(),
            &["GAMMA", "<profile>", "[SHADOWS]", "<empty>"]
        );
        assert_eq!(
            p.screen_sub("SHADOWS").unwrap(),
            &["SHADOW_DISTANCE", "SHADOW_FILTER"]
        );
        assert!(p.sliders().contains("GAMMA"));
        assert!(!p.sliders().contains("SHADOW_FILTER"));
    }

    #[test]
    fn parses_profiles_in_order() {
        let p = ShaderProperties::parse(SAMPLE);
        let names: Vec<&str> = p.profiles().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["LOW", "HIGH"]);
    }

    #[test]
    fn program_enable_expressions() {
        let p = ShaderProperties::parse(SAMPLE);
        assert_eq!(p.program_enable(), &["composite1"]);
        let mut env = HashMap::new();
        assert_eq!(p.bool_expr(&env, "program.composite1.enabled"), Some(false));
        env.insert("FANCY".to_string(), Value::Toggle(true));
        assert_eq!(p.bool_expr(&env, "program.composite1.enabled"), Some(true));
    }

    #[test]
    fn texture_and_alpha_maps() {
        let p = ShaderProperties::parse(SAMPLE);
        assert_eq!(
            p.textures().get("noise").map(String::as_str),
            Some("textures/noise.png")
        );
        assert_eq!(
            p.alpha_test().get("gbuffers_terrain").map(String::as_str),
            Some("GREATER 0.1")
        );
    }

    #[test]
    fn line_directives_parse_as_comments() {
        let p = ShaderProperties::parse("#line 1 1\nclouds=fancy\n");
        assert_eq!(p.quality("clouds"), Some(Quality::Fancy));
    }
}
