//! Renderer-facing parameters extracted from a loaded pack.
//!
//! Types:
//! - [OutParams]: the immutable parameter block handed to the renderer
//! - [OutParamsBuilder]: accumulates values from properties and stage-2 consts
//! - [StagedTexture]: a custom texture bound for one pass stage

use std::collections::HashMap;

use tracing::{error, warn};

use shaderpack::{Quality, ShaderOption, ShaderProperties, Value};

/// RGBA clear color parsed from a `vec4(...)` const.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTexture {
    pub stage: String,
    pub buffer: String,
    pub path: String,
}

/// Everything the renderer needs to know that is not a compiled program.
/// `Option` fields mean "pack did not say", letting the host keep its own
/// default behavior.
#[derive(Debug, Clone)]
pub struct OutParams {
    pub clouds: Option<Quality>,
    pub moon: Option<bool>,
    pub sun: Option<bool>,
    pub underwater_overlay: Option<bool>,
    pub vignette: Option<bool>,
    pub old_hand_light: Option<bool>,
    pub old_lighting: Option<bool>,

    pub shadow_terrain: bool,
    pub shadow_translucent: bool,
    pub shadow_entities: bool,
    pub shadow_block_entities: bool,

    pub back_face_solid: bool,
    pub back_face_cutout: bool,
    pub back_face_cutout_mipped: bool,
    pub back_face_translucent: bool,

    pub frustum_culling: bool,
    pub shadow_culling: bool,
    pub rain_depth: bool,
    pub beacon_beam_depth: bool,

    pub textures: Vec<StagedTexture>,
    pub noise_texture: Option<String>,

    pub ambient_occlusion_level: Option<f64>,
    pub sun_path_rotation: f64,
    pub eye_brightness_half_life: f64,
    pub center_depth_half_life: f64,
    pub dryness_half_life: f64,
    pub wetness_half_life: f64,

    pub buffer_clear_disabled: Vec<String>,
    pub buffer_clear_color: HashMap<String, ClearColor>,
    pub buffer_format: HashMap<String, String>,

    pub shadow_depth0_mipmap: bool,
    pub shadow_depth0_nearest: bool,
    pub shadow_depth1_mipmap: bool,
    pub shadow_depth1_nearest: bool,

    pub shadow_color0_mipmap: bool,
    pub shadow_color0_nearest: bool,
    pub shadow_color1_mipmap: bool,
    pub shadow_color1_nearest: bool,

    pub noise_texture_resolution: Option<i32>,

    pub shadow_distance: f64,
    pub shadow_distance_render_mul: f64,
    pub shadow_hardware_filtering0: bool,
    pub shadow_hardware_filtering1: bool,
    pub shadow_interval_size: f64,
    pub shadow_map_fov: Option<f64>,
    pub shadow_map_resolution: i32,
}

#[derive(Debug, Clone)]
pub struct OutParamsBuilder {
    clouds: Option<Quality>,
    moon: Option<bool>,
    sun: Option<bool>,
    underwater_overlay: Option<bool>,
    vignette: Option<bool>,
    old_hand_light: Option<bool>,
    old_lighting: Option<bool>,

    shadow_terrain: bool,
    shadow_translucent: bool,
    shadow_entities: bool,
    shadow_block_entities: bool,

    back_face_solid: bool,
    back_face_cutout: bool,
    back_face_cutout_mipped: bool,
    back_face_translucent: bool,

    frustum_culling: bool,
    shadow_culling: bool,
    rain_depth: bool,
    beacon_beam_depth: bool,

    // stage -> buffer -> path, insertion-ordered within a stage
    textures: Vec<StagedTexture>,
    noise_texture: Option<String>,

    ambient_occlusion_level: Option<f64>,
    sun_path_rotation: f64,
    eye_brightness_half_life: f64,
    center_depth_half_life: f64,
    dryness_half_life: f64,
    wetness_half_life: f64,

    buffer_clear_disabled: Vec<String>,
    buffer_clear_color: HashMap<String, ClearColor>,
    buffer_format: HashMap<String, String>,

    shadow_depth0_mipmap: bool,
    shadow_depth0_nearest: bool,
    shadow_depth1_mipmap: bool,
    shadow_depth1_nearest: bool,

    shadow_color0_mipmap: bool,
    shadow_color0_nearest: bool,
    shadow_color1_mipmap: bool,
    shadow_color1_nearest: bool,

    noise_texture_resolution: Option<i32>,

    shadow_distance: f64,
    shadow_distance_render_mul: f64,
    shadow_hardware_filtering0: bool,
    shadow_hardware_filtering1: bool,
    shadow_interval_size: f64,
    shadow_map_fov: Option<f64>,
    shadow_map_resolution: i32,
}

impl Default for OutParamsBuilder {
    fn default() -> Self {
        Self {
            clouds: None,
            moon: None,
            sun: None,
            underwater_overlay: None,
            vignette: None,
            old_hand_light: None,
            old_lighting: None,

            shadow_terrain: true,
            shadow_translucent: true,
            shadow_entities: true,
            shadow_block_entities: true,

            back_face_solid: true,
            back_face_cutout: true,
            back_face_cutout_mipped: true,
            back_face_translucent: true,

            frustum_culling: true,
            shadow_culling: true,
            rain_depth: false,
            beacon_beam_depth: true,

            textures: Vec::new(),
            noise_texture: None,

            ambient_occlusion_level: None,
            sun_path_rotation: 0.0,
            eye_brightness_half_life: 10.0,
            center_depth_half_life: 1.0,
            dryness_half_life: 200.0,
            wetness_half_life: 600.0,

            buffer_clear_disabled: Vec::new(),
            buffer_clear_color: HashMap::new(),
            buffer_format: HashMap::new(),

            shadow_depth0_mipmap: false,
            shadow_depth0_nearest: false,
            shadow_depth1_mipmap: false,
            shadow_depth1_nearest: false,

            shadow_color0_mipmap: false,
            shadow_color0_nearest: false,
            shadow_color1_mipmap: false,
            shadow_color1_nearest: false,

            noise_texture_resolution: None,

            shadow_distance: 160.0,
            shadow_distance_render_mul: -1.0,
            shadow_hardware_filtering0: false,
            shadow_hardware_filtering1: false,
            shadow_interval_size: 2.0,
            shadow_map_fov: None,
            shadow_map_resolution: 1024,
        }
    }
}

impl OutParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls the flag and texture keys out of a parsed `shaders.properties`.
    pub fn apply_properties(&mut self, props: &ShaderProperties) {
        if let Some(v) = props.quality("clouds") {
            self.clouds = Some(v);
        }
        fetch_bool(props, "moon", |v| self.moon = Some(v));
        fetch_bool(props, "sun", |v| self.sun = Some(v));
        fetch_bool(props, "underwaterOverlay", |v| {
            self.underwater_overlay = Some(v);
        });
        fetch_bool(props, "vignette", |v| self.vignette = Some(v));
        fetch_bool(props, "oldHandLight", |v| self.old_hand_light = Some(v));
        fetch_bool(props, "oldLighting", |v| self.old_lighting = Some(v));

        fetch_bool(props, "shadowTerrain", |v| self.shadow_terrain = v);
        fetch_bool(props, "shadowTranslucent", |v| self.shadow_translucent = v);
        fetch_bool(props, "shadowEntities", |v| self.shadow_entities = v);
        fetch_bool(props, "shadowBlockEntities", |v| {
            self.shadow_block_entities = v;
        });

        fetch_bool(props, "backface.solid", |v| self.back_face_solid = v);
        fetch_bool(props, "backface.cutout", |v| self.back_face_cutout = v);
        fetch_bool(props, "backface.cutoutMipped", |v| {
            self.back_face_cutout_mipped = v;
        });
        fetch_bool(props, "backface.translucent", |v| {
            self.back_face_translucent = v;
        });

        fetch_bool(props, "frustum.culling", |v| self.frustum_culling = v);
        fetch_bool(props, "shadow.culling", |v| self.shadow_culling = v);
        fetch_bool(props, "rain.depth", |v| self.rain_depth = v);
        fetch_bool(props, "beacon.beam.depth", |v| self.beacon_beam_depth = v);

        for (name, path) in props.textures() {
            if name == "noise" {
                self.noise_texture = Some(path.clone());
                continue;
            }
            match name.split_once('.') {
                Some((stage, buffer)) => self.textures.push(StagedTexture {
                    stage: stage.to_owned(),
                    buffer: buffer.to_owned(),
                    path: path.clone(),
                }),
                None => warn!(texture = %name, "invalid texture key in properties"),
            }
        }
    }

    /// Folds one configured stage-2 const into the parameter set. Unknown
    /// names that do not match a buffer suffix are ignored.
    pub fn apply_const(&mut self, opt: &ShaderOption) {
        let v = opt.current_value();
        match opt.name.as_str() {
            "ambientOcclusionLevel" => {
                set_f64(&mut self.ambient_occlusion_level, v.as_f64_clamped(0.0, 1.0));
            }
            "sunPathRotation" => set_plain_f64(&mut self.sun_path_rotation, v),
            "eyeBrightnessHalflife" => set_plain_f64(&mut self.eye_brightness_half_life, v),
            "centerDepthHalflife" => set_plain_f64(&mut self.center_depth_half_life, v),
            "drynessHalflife" => set_plain_f64(&mut self.dryness_half_life, v),
            "wetnessHalflife" => set_plain_f64(&mut self.wetness_half_life, v),

            "generateShadowMipmap" => {
                if let Some(b) = v.as_bool() {
                    self.shadow_depth0_mipmap = b;
                    self.shadow_depth1_mipmap = b;
                }
            }
            "shadowtexMipmap" | "shadowtex0Mipmap" => {
                set_bool(&mut self.shadow_depth0_mipmap, v);
            }
            "shadowtex0Nearest" | "shadowtexNearest" | "shadow0MinMagNearest" => {
                set_bool(&mut self.shadow_depth0_nearest, v);
            }
            "shadowtex1Mipmap" => set_bool(&mut self.shadow_depth1_mipmap, v),
            "shadowtex1Nearest" | "shadow1MinMagNearest" => {
                set_bool(&mut self.shadow_depth1_nearest, v);
            }

            "generateShadowColorMipmap" => {
                if let Some(b) = v.as_bool() {
                    self.shadow_color0_mipmap = b;
                    self.shadow_color1_mipmap = b;
                }
            }
            "shadowcolor0Mipmap" | "shadowColor0Mipmap" => {
                set_bool(&mut self.shadow_color0_mipmap, v);
            }
            "shadowcolor0Nearest" | "shadowColor0Nearest" | "shadowColor0MinMagNearest" => {
                set_bool(&mut self.shadow_color0_nearest, v);
            }
            "shadowcolor1Mipmap" | "shadowColor1Mipmap" => {
                set_bool(&mut self.shadow_color1_mipmap, v);
            }
            "shadowcolor1Nearest" | "shadowColor1Nearest" | "shadowColor1MinMagNearest" => {
                set_bool(&mut self.shadow_color1_nearest, v);
            }

            "noiseTextureResolution" => {
                if let Some(i) = v.as_i32() {
                    self.noise_texture_resolution = Some(i);
                }
            }

            "shadowDistance" => set_plain_f64(&mut self.shadow_distance, v),
            "shadowDistanceRenderMul" => set_plain_f64(&mut self.shadow_distance_render_mul, v),
            "shadowHardwareFiltering" => {
                if let Some(b) = v.as_bool() {
                    self.shadow_hardware_filtering0 = b;
                    self.shadow_hardware_filtering1 = b;
                }
            }
            "shadowHardwareFiltering0" => set_bool(&mut self.shadow_hardware_filtering0, v),
            "shadowHardwareFiltering1" => set_bool(&mut self.shadow_hardware_filtering1, v),
            "shadowIntervalSize" => set_plain_f64(&mut self.shadow_interval_size, v),
            "shadowMapFov" => {
                if let Some(d) = v.as_f64() {
                    self.shadow_map_fov = Some(d);
                }
            }
            "shadowMapResolution" => {
                if let Some(i) = v.as_i32() {
                    self.shadow_map_resolution = i;
                }
            }
            name => {
                if self.try_buffer_format(name, v) {
                    return;
                }
                if self.try_buffer_clear(name, opt) {
                    return;
                }
                self.try_buffer_clear_color(name, v);
            }
        }
    }

    fn try_buffer_format(&mut self, name: &str, value: &Value) -> bool {
        let Some(buf) = name.strip_suffix("Format") else {
            return false;
        };
        self.buffer_format.insert(buf.to_owned(), value.to_string());
        true
    }

    fn try_buffer_clear(&mut self, name: &str, opt: &ShaderOption) -> bool {
        if !opt.is_toggle() {
            return false;
        }
        let Some(buf) = name.strip_suffix("Clear") else {
            return false;
        };
        if !opt.is_enabled() {
            self.buffer_clear_disabled.push(buf.to_owned());
        }
        true
    }

    fn try_buffer_clear_color(&mut self, name: &str, value: &Value) -> bool {
        let Some(buf) = name.strip_suffix("ClearColor") else {
            return false;
        };
        let txt = value.to_string();
        let txt = txt.trim();
        if !txt.starts_with("vec4") {
            return true;
        }
        let Some(open) = txt.find('(') else {
            return true;
        };
        let Some(close) = txt.rfind(')') else {
            return true;
        };
        if close < open {
            return true;
        }
        let parts: Vec<&str> = txt[open + 1..close].split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return true;
        }
        let parsed: Vec<f64> = parts.iter().filter_map(|p| p.parse().ok()).collect();
        if parsed.len() != 4 {
            error!(value = %txt, "could not parse buffer clear color");
            return true;
        }
        self.buffer_clear_color.insert(
            buf.to_owned(),
            ClearColor {
                r: parsed[0],
                g: parsed[1],
                b: parsed[2],
                a: parsed[3],
            },
        );
        true
    }

    pub fn build(self) -> OutParams {
        OutParams {
            clouds: self.clouds,
            moon: self.moon,
            sun: self.sun,
            underwater_overlay: self.underwater_overlay,
            vignette: self.vignette,
            old_hand_light: self.old_hand_light,
            old_lighting: self.old_lighting,

            shadow_terrain: self.shadow_terrain,
            shadow_translucent: self.shadow_translucent,
            shadow_entities: self.shadow_entities,
            shadow_block_entities: self.shadow_block_entities,

            back_face_solid: self.back_face_solid,
            back_face_cutout: self.back_face_cutout,
            back_face_cutout_mipped: self.back_face_cutout_mipped,
            back_face_translucent: self.back_face_translucent,

            frustum_culling: self.frustum_culling,
            shadow_culling: self.shadow_culling,
            rain_depth: self.rain_depth,
            beacon_beam_depth: self.beacon_beam_depth,

            textures: self.textures,
            noise_texture: self.noise_texture,

            ambient_occlusion_level: self.ambient_occlusion_level,
            sun_path_rotation: self.sun_path_rotation,
            eye_brightness_half_life: self.eye_brightness_half_life,
            center_depth_half_life: self.center_depth_half_life,
            dryness_half_life: self.dryness_half_life,
            wetness_half_life: self.wetness_half_life,

            buffer_clear_disabled: self.buffer_clear_disabled,
            buffer_clear_color: self.buffer_clear_color,
            buffer_format: self.buffer_format,

            shadow_depth0_mipmap: self.shadow_depth0_mipmap,
            shadow_depth0_nearest: self.shadow_depth0_nearest,
            shadow_depth1_mipmap: self.shadow_depth1_mipmap,
            shadow_depth1_nearest: self.shadow_depth1_nearest,

            shadow_color0_mipmap: self.shadow_color0_mipmap,
            shadow_color0_nearest: self.shadow_color0_nearest,
            shadow_color1_mipmap: self.shadow_color1_mipmap,
            shadow_color1_nearest: self.shadow_color1_nearest,

            noise_texture_resolution: self.noise_texture_resolution,

            shadow_distance: self.shadow_distance,
            shadow_distance_render_mul: self.shadow_distance_render_mul,
            shadow_hardware_filtering0: self.shadow_hardware_filtering0,
            shadow_hardware_filtering1: self.shadow_hardware_filtering1,
            shadow_interval_size: self.shadow_interval_size,
            shadow_map_fov: self.shadow_map_fov,
            shadow_map_resolution: self.shadow_map_resolution,
        }
    }
}

fn fetch_bool(props: &ShaderProperties, name: &str, mut apply: impl FnMut(bool)) {
    if let Some(v) = props.bool(name) {
        apply(v);
    }
}

fn set_bool(slot: &mut bool, value: &Value) {
    if let Some(b) = value.as_bool() {
        *slot = b;
    }
}

fn set_plain_f64(slot: &mut f64, value: &Value) {
    if let Some(d) = value.as_f64() {
        *slot = d;
    }
}

fn set_f64(slot: &mut Option<f64>, value: Option<f64>) {
    if let Some(d) = value {
        *slot = Some(d);
    }
}

/// Checks for the `<buf>MipmapEnabled` toggle convention. Returns the buffer
/// name when the toggle exists and is on.
pub fn mipmap_enabled_buffer(opt: &ShaderOption) -> Option<&str> {
    if !opt.is_toggle() {
        return None;
    }
    let buf = opt.name.strip_suffix("MipmapEnabled")?;
    opt.is_enabled().then_some(buf)
}
