//! Shader program identity and the fallback registry.
//!
//! Types:
//!
//! - `ShaderKey` is an interned canonical program identifier. Pack programs
//!   use their plain name (`gbuffers_terrain`); engine-internal programs
//!   carry a `prismpipe:` namespace prefix.
//! - `ShaderCatalogue` owns the full fixed program set one session works
//!   with: the gbuffers family, `shadow`, the numbered `deferred`/`composite`
//!   chains, `final`, and the internal blit programs.
//! - `ShaderTypeRegistry` maps each program to its substitute when a pack
//!   does not provide it. It is an explicit context object: constructed,
//!   populated, locked, then handed by reference to the loader.
//!
//! Registration and lookup ordering is a hard contract: registering twice,
//! registering after the lock, locking with a dangling fallback target, or
//! querying before the lock are all engine bugs and panic.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderKey(Arc<str>);

impl ShaderKey {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// True for engine-internal programs that never come from a user pack.
    pub fn is_internal(&self) -> bool {
        self.0.contains(':')
    }

    /// Path of the program's sources inside a pack, without extension.
    pub fn source_stem(&self) -> String {
        match self.0.split_once(':') {
            Some((_, path)) => format!("/{path}"),
            None => format!("/shaders/{}", self.0),
        }
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShaderKey({})", self.0)
    }
}

/// How many numbered variants the `deferred` and `composite` chains carry
/// (the base name plus `1..=99`).
pub const COMPOSITE_CHAIN: usize = 100;

/// The fixed program set of one session.
pub struct ShaderCatalogue {
    pub gbuffers_basic: ShaderKey,
    pub gbuffers_skybasic: ShaderKey,
    pub gbuffers_textured: ShaderKey,
    pub gbuffers_skytextured: ShaderKey,
    pub gbuffers_clouds: ShaderKey,
    pub gbuffers_beaconbeam: ShaderKey,
    pub gbuffers_armor_glint: ShaderKey,
    pub gbuffers_spidereyes: ShaderKey,
    pub gbuffers_textured_lit: ShaderKey,
    pub gbuffers_item: ShaderKey,
    pub gbuffers_entities: ShaderKey,
    pub gbuffers_weather: ShaderKey,
    pub gbuffers_hand: ShaderKey,
    pub gbuffers_hand_water: ShaderKey,
    pub gbuffers_terrain: ShaderKey,
    pub gbuffers_terrain_solid: ShaderKey,
    pub gbuffers_terrain_cutout_mip: ShaderKey,
    pub gbuffers_terrain_cutout: ShaderKey,
    pub gbuffers_damagedblock: ShaderKey,
    pub gbuffers_water: ShaderKey,
    pub gbuffers_block: ShaderKey,
    pub gbuffers_portal: ShaderKey,

    pub shadow: ShaderKey,

    pub deferred: Vec<ShaderKey>,
    pub composite: Vec<ShaderKey>,
    pub final_: ShaderKey,

    pub blit_color_identical: ShaderKey,
    pub blit_depth_identical: ShaderKey,
    pub blit_color_mismatched: ShaderKey,
    pub blit_depth_mismatched: ShaderKey,

    general: Vec<ShaderKey>,
    internal: Vec<ShaderKey>,
}

fn numbered(base: &str) -> Vec<ShaderKey> {
    let mut list = Vec::with_capacity(COMPOSITE_CHAIN);
    list.push(ShaderKey::new(base));
    for i in 1..COMPOSITE_CHAIN {
        list.push(ShaderKey::new(&format!("{base}{i}")));
    }
    list
}

impl ShaderCatalogue {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let gbuffers_basic = ShaderKey::new("gbuffers_basic");
        let gbuffers_skybasic = ShaderKey::new("gbuffers_skybasic");
        let gbuffers_textured = ShaderKey::new("gbuffers_textured");
        let gbuffers_skytextured = ShaderKey::new("gbuffers_skytextured");
        let gbuffers_clouds = ShaderKey::new("gbuffers_clouds");
        let gbuffers_beaconbeam = ShaderKey::new("gbuffers_beaconbeam");
        let gbuffers_armor_glint = ShaderKey::new("gbuffers_armor_glint");
        let gbuffers_spidereyes = ShaderKey::new("gbuffers_spidereyes");
        let gbuffers_textured_lit = ShaderKey::new("gbuffers_textured_lit");
        let gbuffers_item = ShaderKey::new("gbuffers_item");
        let gbuffers_entities = ShaderKey::new("gbuffers_entities");
        let gbuffers_weather = ShaderKey::new("gbuffers_weather");
        let gbuffers_hand = ShaderKey::new("gbuffers_hand");
        let gbuffers_hand_water = ShaderKey::new("gbuffers_hand_water");
        let gbuffers_terrain = ShaderKey::new("gbuffers_terrain");
        let gbuffers_terrain_solid = ShaderKey::new("gbuffers_terrain_solid");
        let gbuffers_terrain_cutout_mip = ShaderKey::new("gbuffers_terrain_cutout_mip");
        let gbuffers_terrain_cutout = ShaderKey::new("gbuffers_terrain_cutout");
        let gbuffers_damagedblock = ShaderKey::new("gbuffers_damagedblock");
        let gbuffers_water = ShaderKey::new("gbuffers_water");
        let gbuffers_block = ShaderKey::new("gbuffers_block");
        let gbuffers_portal = ShaderKey::new("gbuffers_portal");
        let shadow = ShaderKey::new("shadow");
        let deferred = numbered("deferred");
        let composite = numbered("composite");
        let final_ = ShaderKey::new("final");

        let blit_color_identical = ShaderKey::new("prismpipe:blit_identical/blit_color");
        let blit_depth_identical = ShaderKey::new("prismpipe:blit_identical/blit_depth");
        let blit_color_mismatched = ShaderKey::new("prismpipe:blit_mismatched/blit_color");
        let blit_depth_mismatched = ShaderKey::new("prismpipe:blit_mismatched/blit_depth");

        let mut general = vec![
            gbuffers_basic.clone(),
            gbuffers_skybasic.clone(),
            gbuffers_textured.clone(),
            gbuffers_skytextured.clone(),
            gbuffers_clouds.clone(),
            gbuffers_beaconbeam.clone(),
            gbuffers_armor_glint.clone(),
            gbuffers_spidereyes.clone(),
            gbuffers_textured_lit.clone(),
            gbuffers_item.clone(),
            gbuffers_entities.clone(),
            gbuffers_weather.clone(),
            gbuffers_hand.clone(),
            gbuffers_hand_water.clone(),
            gbuffers_terrain.clone(),
            gbuffers_terrain_solid.clone(),
            gbuffers_terrain_cutout_mip.clone(),
            gbuffers_terrain_cutout.clone(),
            gbuffers_damagedblock.clone(),
            gbuffers_water.clone(),
            gbuffers_block.clone(),
            gbuffers_portal.clone(),
            shadow.clone(),
        ];
        general.extend(deferred.iter().cloned());
        general.extend(composite.iter().cloned());
        general.push(final_.clone());

        let internal = vec![
            blit_color_identical.clone(),
            blit_depth_identical.clone(),
            blit_color_mismatched.clone(),
            blit_depth_mismatched.clone(),
        ];

        Self {
            gbuffers_basic,
            gbuffers_skybasic,
            gbuffers_textured,
            gbuffers_skytextured,
            gbuffers_clouds,
            gbuffers_beaconbeam,
            gbuffers_armor_glint,
            gbuffers_spidereyes,
            gbuffers_textured_lit,
            gbuffers_item,
            gbuffers_entities,
            gbuffers_weather,
            gbuffers_hand,
            gbuffers_hand_water,
            gbuffers_terrain,
            gbuffers_terrain_solid,
            gbuffers_terrain_cutout_mip,
            gbuffers_terrain_cutout,
            gbuffers_damagedblock,
            gbuffers_water,
            gbuffers_block,
            gbuffers_portal,
            shadow,
            deferred,
            composite,
            final_,
            blit_color_identical,
            blit_depth_identical,
            blit_color_mismatched,
            blit_depth_mismatched,
            general,
            internal,
        }
    }

    /// Every program a user pack may provide.
    pub fn general(&self) -> &[ShaderKey] {
        &self.general
    }

    /// Engine-internal programs, always loaded from the internal pack.
    pub fn internal(&self) -> &[ShaderKey] {
        &self.internal
    }
}

/// Fallback registry for one session. Populate, lock, then query.
pub struct ShaderTypeRegistry {
    fallbacks: HashMap<ShaderKey, Option<ShaderKey>>,
    locked: bool,
}

impl ShaderTypeRegistry {
    pub fn new() -> Self {
        Self {
            fallbacks: HashMap::new(),
            locked: false,
        }
    }

    /// Builds a registry carrying the built-in fallback forest for
    /// `catalogue`, already locked.
    pub fn with_defaults(catalogue: &ShaderCatalogue) -> Self {
        let mut reg = Self::new();
        reg.register_defaults(catalogue);
        reg.validate_and_lock();
        reg
    }

    /// The built-in gbuffers fallback forest. Programs outside it
    /// (`shadow`, the composite chains, `final`) have no substitute.
    pub fn register_defaults(&mut self, c: &ShaderCatalogue) {
        self.register(c.gbuffers_basic.clone(), None);
        self.register(c.gbuffers_skybasic.clone(), Some(c.gbuffers_basic.clone()));
        self.register(c.gbuffers_textured.clone(), Some(c.gbuffers_basic.clone()));
        self.register(c.gbuffers_skytextured.clone(), Some(c.gbuffers_textured.clone()));
        self.register(c.gbuffers_clouds.clone(), Some(c.gbuffers_textured.clone()));
        self.register(c.gbuffers_beaconbeam.clone(), Some(c.gbuffers_textured.clone()));
        self.register(c.gbuffers_armor_glint.clone(), Some(c.gbuffers_textured.clone()));
        self.register(c.gbuffers_spidereyes.clone(), Some(c.gbuffers_textured.clone()));
        self.register(c.gbuffers_textured_lit.clone(), Some(c.gbuffers_textured.clone()));
        self.register(c.gbuffers_item.clone(), Some(c.gbuffers_textured_lit.clone()));
        self.register(c.gbuffers_entities.clone(), Some(c.gbuffers_textured_lit.clone()));
        self.register(c.gbuffers_weather.clone(), Some(c.gbuffers_textured_lit.clone()));
        self.register(c.gbuffers_hand.clone(), Some(c.gbuffers_textured_lit.clone()));
        self.register(c.gbuffers_hand_water.clone(), Some(c.gbuffers_hand.clone()));
        self.register(c.gbuffers_terrain.clone(), Some(c.gbuffers_textured_lit.clone()));
        self.register(c.gbuffers_terrain_solid.clone(), Some(c.gbuffers_terrain.clone()));
        self.register(c.gbuffers_terrain_cutout_mip.clone(), Some(c.gbuffers_terrain.clone()));
        self.register(c.gbuffers_terrain_cutout.clone(), Some(c.gbuffers_terrain.clone()));
        self.register(c.gbuffers_damagedblock.clone(), Some(c.gbuffers_terrain.clone()));
        self.register(c.gbuffers_water.clone(), Some(c.gbuffers_terrain.clone()));
        self.register(c.gbuffers_block.clone(), Some(c.gbuffers_terrain.clone()));
        self.register(c.gbuffers_portal.clone(), Some(c.gbuffers_block.clone()));
    }

    pub fn register(&mut self, shader: ShaderKey, fallback: Option<ShaderKey>) {
        if self.locked {
            error!(shader = %shader, "fallback registration after lock");
            panic!("fallback registration after lock: {shader}");
        }
        if self.fallbacks.contains_key(&shader) {
            error!(shader = %shader, "duplicate fallback registration");
            panic!("duplicate fallback registration: {shader}");
        }
        debug!(
            shader = %shader,
            fallback = %fallback.as_ref().map(ShaderKey::name).unwrap_or("<none>"),
            "registered shader fallback"
        );
        self.fallbacks.insert(shader, fallback);
    }

    /// Checks every fallback target is itself registered and freezes the
    /// registry. Logs the reverse map at info level.
    pub fn validate_and_lock(&mut self) {
        for (shader, fallback) in &self.fallbacks {
            if let Some(fallback) = fallback {
                if !self.fallbacks.contains_key(fallback) {
                    error!(shader = %shader, fallback = %fallback, "missing fallback target");
                    panic!("shader {shader} defined a missing fallback: {fallback}");
                }
            }
        }
        self.locked = true;
        info!(entries = self.fallbacks.len(), "locked shader type registry");
        let mut reverse: HashMap<&ShaderKey, Vec<&ShaderKey>> = HashMap::new();
        for (shader, fallback) in &self.fallbacks {
            if let Some(fallback) = fallback {
                reverse.entry(fallback).or_default().push(shader);
            }
        }
        for (fallback, shaders) in &reverse {
            let mut names: Vec<&str> = shaders.iter().map(|s| s.name()).collect();
            names.sort_unstable();
            info!(fallback = %fallback, dependents = names.join(", "), "fallback group");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// One fallback hop. None for roots and for programs outside the
    /// forest.
    pub fn fallback(&self, shader: &ShaderKey) -> Option<&ShaderKey> {
        if !self.locked {
            error!(shader = %shader, "fallback lookup before lock");
            panic!("registry must be locked before fallbacks can be resolved");
        }
        self.fallbacks.get(shader).and_then(Option::as_ref)
    }

    /// The shader itself followed by its fallback chain, root last.
    pub fn chain<'a>(&'a self, shader: &'a ShaderKey) -> Vec<&'a ShaderKey> {
        let mut out = vec![shader];
        let mut cur = shader;
        while let Some(next) = self.fallback(cur) {
            out.push(next);
            cur = next;
        }
        out
    }
}

impl Default for ShaderTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
