//! Render-stage identifiers exposed to shaders.
//!
//! Each stage carries a `MC_RENDER_STAGE_*` macro whose value is the
//! stage's ordinal; packs compare the per-frame stage uniform against those
//! macros.

/// World render stages in engine order. The ordinal is the macro value and
/// the uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RenderStage {
    /// Undefined, also the fallback between recognized stages.
    None,
    Sky,
    Sunset,
    CustomSky,
    Sun,
    Moon,
    Stars,
    Void,
    TerrainSolid,
    TerrainCutoutMipped,
    TerrainCutout,
    Entities,
    BlockEntities,
    BlockEntitiesPortal,
    Destroy,
    Outline,
    Debug,
    HandSolid,
    TerrainTranslucent,
    Tripwire,
    Particles,
    Clouds,
    RainSnow,
    WorldBorder,
    HandTranslucent,
}

impl RenderStage {
    pub const ALL: [RenderStage; 25] = [
        RenderStage::None,
        RenderStage::Sky,
        RenderStage::Sunset,
        RenderStage::CustomSky,
        RenderStage::Sun,
        RenderStage::Moon,
        RenderStage::Stars,
        RenderStage::Void,
        RenderStage::TerrainSolid,
        RenderStage::TerrainCutoutMipped,
        RenderStage::TerrainCutout,
        RenderStage::Entities,
        RenderStage::BlockEntities,
        RenderStage::BlockEntitiesPortal,
        RenderStage::Destroy,
        RenderStage::Outline,
        RenderStage::Debug,
        RenderStage::HandSolid,
        RenderStage::TerrainTranslucent,
        RenderStage::Tripwire,
        RenderStage::Particles,
        RenderStage::Clouds,
        RenderStage::RainSnow,
        RenderStage::WorldBorder,
        RenderStage::HandTranslucent,
    ];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Macro name injected into every compiled shader.
    pub fn macro_name(self) -> &'static str {
        match self {
            RenderStage::None => "MC_RENDER_STAGE_NONE",
            RenderStage::Sky => "MC_RENDER_STAGE_SKY",
            RenderStage::Sunset => "MC_RENDER_STAGE_SUNSET",
            RenderStage::CustomSky => "MC_RENDER_STAGE_CUSTOM_SKY",
            RenderStage::Sun => "MC_RENDER_STAGE_SUN",
            RenderStage::Moon => "MC_RENDER_STAGE_MOON",
            RenderStage::Stars => "MC_RENDER_STAGE_STARS",
            RenderStage::Void => "MC_RENDER_STAGE_VOID",
            RenderStage::TerrainSolid => "MC_RENDER_STAGE_TERRAIN_SOLID",
            RenderStage::TerrainCutoutMipped => "MC_RENDER_STAGE_TERRAIN_CUTOUT_MIPPED",
            RenderStage::TerrainCutout => "MC_RENDER_STAGE_TERRAIN_CUTOUT",
            RenderStage::Entities => "MC_RENDER_STAGE_ENTITIES",
            RenderStage::BlockEntities => "MC_RENDER_STAGE_BLOCK_ENTITIES",
            RenderStage::BlockEntitiesPortal => "MC_RENDER_STAGE_BLOCK_ENTITIES_PORTAL",
            RenderStage::Destroy => "MC_RENDER_STAGE_DESTROY",
            RenderStage::Outline => "MC_RENDER_STAGE_OUTLINE",
            RenderStage::Debug => "MC_RENDER_STAGE_DEBUG",
            RenderStage::HandSolid => "MC_RENDER_STAGE_HAND_SOLID",
            RenderStage::TerrainTranslucent => "MC_RENDER_STAGE_TERRAIN_TRANSLUCENT",
            RenderStage::Tripwire => "MC_RENDER_STAGE_TRIPWIRE",
            RenderStage::Particles => "MC_RENDER_STAGE_PARTICLES",
            RenderStage::Clouds => "MC_RENDER_STAGE_CLOUDS",
            RenderStage::RainSnow => "MC_RENDER_STAGE_RAIN_SNOW",
            RenderStage::WorldBorder => "MC_RENDER_STAGE_WORLD_BORDER",
            RenderStage::HandTranslucent => "MC_RENDER_STAGE_HAND_TRANSLUCENT",
        }
    }
}
