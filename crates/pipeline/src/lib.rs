mod builtin;
mod env;
mod graph;
mod locale;
mod loader;
mod params;
mod pool;
mod registry;
mod report;
mod screen;
mod stage;
mod tracker;

pub use builtin::{default_pack, internal_pack};
pub use env::{
    build_builtin_macros, pack_semver, AuxParams, EnvInfo, GlRenderer, GlVendor, Os, ResolvedEnv,
    ENGINE_MACRO, ENGINE_VERSION_MACRO,
};
pub use graph::{
    current_entity, pop_entity, push_entity, Binder, Node, Slot, StackKind, StateGraph,
    ENTITY_CLOUDS, ENTITY_SKY,
};
pub use locale::{Locale, DEFAULT_LANG};
pub use loader::{load_or_default, LoadOutput, ShaderLoader};
pub use params::{mipmap_enabled_buffer, ClearColor, OutParams, OutParamsBuilder, StagedTexture};
pub use pool::{
    CompileError, CompiledProgram, LayeredShaderPool, NativeCompiler, ProgramHandle, ProgramPool,
    ShaderPool,
};
pub use registry::{ShaderCatalogue, ShaderKey, ShaderTypeRegistry, COMPOSITE_CHAIN};
pub use report::{FallbackRecord, LoadReport};
pub use screen::{ChoiceKind, ConfigScreen, Profile, Screen, ScreenEntry};
pub use stage::RenderStage;
pub use tracker::StackTracker;
