//! Compiled program ownership and lookup.
//!
//! Types:
//! - [NativeCompiler]: the seam to whatever actually builds GPU programs
//! - [CompiledProgram]: one linked program plus its pass metadata
//! - [ShaderPool]: owns programs for one pack generation
//! - [LayeredShaderPool]: chains pools so essential lookups can reach the
//!   builtin packs, initializing deeper layers on first need
//!
//! A program stays alive after its pool is superseded as long as it was
//! borrowed at least once; the renderer keeps using it until the next swap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::registry::ShaderKey;

/// Opaque native program id. Zero is never a valid program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("vertex stage of {0} failed: {1}")]
    Vertex(String, String),
    #[error("fragment stage of {0} failed: {1}")]
    Fragment(String, String),
    #[error("link of {0} failed: {1}")]
    Link(String, String),
}

/// Boundary to the native graphics API. The loader only ever compiles and
/// deletes through this, so tests can run without a device.
pub trait NativeCompiler {
    fn compile(
        &mut self,
        name: &str,
        vertex: &[u8],
        fragment: &[u8],
    ) -> Result<ProgramHandle, CompileError>;

    fn delete_program(&mut self, program: ProgramHandle);
}

/// One linked program together with the metadata the render graph needs to
/// schedule it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    pub path: String,
    pub program: ProgramHandle,
    pub mipmap_enabled: Vec<String>,
    pub render_targets: Option<Vec<i32>>,
    /// The key whose sources actually got compiled, after fallback.
    pub actual_key: ShaderKey,
}

/// Pool lookup surface shared by [ShaderPool] and [LayeredShaderPool].
pub trait ProgramPool {
    /// `essential` marks lookups that must resolve for rendering to work at
    /// all; layered pools escalate those to deeper layers.
    fn borrow_shader(&mut self, key: &ShaderKey, essential: bool) -> Option<Arc<CompiledProgram>>;

    /// Releases native programs that were never borrowed. Idempotent.
    fn close(&mut self, gl: &mut dyn NativeCompiler);
}

/// Program storage for one load generation.
#[derive(Debug, Default)]
pub struct ShaderPool {
    programs: HashMap<ShaderKey, Arc<CompiledProgram>>,
    borrowed: HashSet<ShaderKey>,
    disabled: Option<HashSet<String>>,
    dead: bool,
}

impl ShaderPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn assert_live(&self) {
        assert!(!self.dead, "shader pool was deinitialized");
    }

    /// Stores a program under `key`. A superseded program is deleted unless
    /// the renderer borrowed it, in which case the renderer keeps it alive
    /// until the next generation swap.
    pub fn insert(&mut self, key: ShaderKey, program: CompiledProgram, gl: &mut dyn NativeCompiler) {
        self.assert_live();
        let was_borrowed = self.borrowed.remove(&key);
        if let Some(old) = self.programs.insert(key, Arc::new(program)) {
            if !was_borrowed {
                gl.delete_program(old.program);
            }
        }
    }

    /// Programs disabled through pack properties. Lookup returns `None` for
    /// these without touching the borrow set.
    pub fn set_disabled(&mut self, disabled: HashSet<String>) {
        self.disabled = Some(disabled);
    }

    /// Sorted disabled paths, for diagnostics.
    pub fn disabled(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .disabled
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        paths.sort_unstable();
        paths
    }

    pub fn is_closed(&self) -> bool {
        self.dead
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl ProgramPool for ShaderPool {
    fn borrow_shader(&mut self, key: &ShaderKey, _essential: bool) -> Option<Arc<CompiledProgram>> {
        self.assert_live();
        let shader = self.programs.get(key)?;
        if let Some(disabled) = &self.disabled {
            if disabled.contains(&shader.path) {
                return None;
            }
        }
        let shader = Arc::clone(shader);
        self.borrowed.insert(key.clone());
        Some(shader)
    }

    fn close(&mut self, gl: &mut dyn NativeCompiler) {
        if self.dead {
            return;
        }
        self.dead = true;
        for (key, program) in self.programs.drain() {
            if self.borrowed.contains(&key) {
                continue;
            }
            gl.delete_program(program.program);
        }
        self.borrowed.clear();
        self.disabled = None;
    }
}

type PoolInit = Box<dyn FnOnce(&mut dyn NativeCompiler) -> Box<dyn ProgramPool>>;

/// Primary pool backed by progressively initialized fallback layers. Layers
/// are only built when an essential lookup misses everything shallower, so a
/// complete pack never pays for the builtin packs.
pub struct LayeredShaderPool {
    primary: Box<dyn ProgramPool>,
    uninitialized: VecDeque<PoolInit>,
    initialized: Vec<Box<dyn ProgramPool>>,
    /// Paths served from fallback layers, for the load report.
    fallback_hits: Vec<String>,
}

impl LayeredShaderPool {
    pub fn new(
        primary: Box<dyn ProgramPool>,
        layers: impl IntoIterator<Item = PoolInit>,
    ) -> Self {
        Self {
            primary,
            uninitialized: layers.into_iter().collect(),
            initialized: Vec::new(),
            fallback_hits: Vec::new(),
        }
    }

    /// Drains the fallback paths recorded since the last call.
    pub fn take_fallback_hits(&mut self) -> Vec<String> {
        std::mem::take(&mut self.fallback_hits)
    }

    /// Needs the compiler because a miss may force a deeper layer to build.
    pub fn borrow_layered(
        &mut self,
        key: &ShaderKey,
        essential: bool,
        gl: &mut dyn NativeCompiler,
    ) -> Option<Arc<CompiledProgram>> {
        if let Some(prog) = self.primary.borrow_shader(key, essential) {
            return Some(prog);
        }
        if !essential {
            return None;
        }
        for pool in &mut self.initialized {
            if let Some(prog) = pool.borrow_shader(key, true) {
                self.fallback_hits.push(prog.path.clone());
                return Some(prog);
            }
        }
        while let Some(init) = self.uninitialized.pop_front() {
            debug!(shader = %key, "initializing fallback pool layer");
            let mut pool = init(gl);
            let hit = pool.borrow_shader(key, true);
            self.initialized.push(pool);
            if let Some(prog) = hit {
                self.fallback_hits.push(prog.path.clone());
                return Some(prog);
            }
        }
        None
    }

    pub fn close(&mut self, gl: &mut dyn NativeCompiler) {
        self.primary.close(gl);
        for pool in &mut self.initialized {
            pool.close(gl);
        }
        self.initialized.clear();
        self.uninitialized.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingCompiler;
    use super::*;

    fn program(path: &str, handle: u32, key: &ShaderKey) -> CompiledProgram {
        CompiledProgram {
            path: path.to_owned(),
            program: ProgramHandle(handle),
            mipmap_enabled: Vec::new(),
            render_targets: None,
            actual_key: key.clone(),
        }
    }

    #[test]
    fn insert_supersede_deletes_unborrowed() {
        let key = ShaderKey::new("composite");
        let mut gl = RecordingCompiler::default();
        let mut pool = ShaderPool::new();
        pool.insert(key.clone(), program("/shaders/composite", 1, &key), &mut gl);
        pool.insert(key.clone(), program("/shaders/composite", 2, &key), &mut gl);
        assert_eq!(gl.deleted, vec![ProgramHandle(1)]);
    }

    #[test]
    fn borrowed_programs_survive_supersede_and_close() {
        let key = ShaderKey::new("composite");
        let mut gl = RecordingCompiler::default();
        let mut pool = ShaderPool::new();
        pool.insert(key.clone(), program("/shaders/composite", 1, &key), &mut gl);
        let held = pool.borrow_shader(&key, false).unwrap();
        pool.insert(key.clone(), program("/shaders/composite", 2, &key), &mut gl);
        assert!(gl.deleted.is_empty());
        let held2 = pool.borrow_shader(&key, false).unwrap();
        pool.close(&mut gl);
        assert!(gl.deleted.is_empty());
        assert_eq!(held.program, ProgramHandle(1));
        assert_eq!(held2.program, ProgramHandle(2));
        // close again is a no-op
        pool.close(&mut gl);
    }

    #[test]
    fn close_deletes_unborrowed() {
        let key = ShaderKey::new("final");
        let mut gl = RecordingCompiler::default();
        let mut pool = ShaderPool::new();
        pool.insert(key.clone(), program("/shaders/final", 7, &key), &mut gl);
        pool.close(&mut gl);
        assert_eq!(gl.deleted, vec![ProgramHandle(7)]);
    }

    #[test]
    #[should_panic(expected = "deinitialized")]
    fn use_after_close_panics() {
        let key = ShaderKey::new("final");
        let mut gl = RecordingCompiler::default();
        let mut pool = ShaderPool::new();
        pool.close(&mut gl);
        pool.borrow_shader(&key, false);
    }

    #[test]
    fn disabled_programs_do_not_resolve() {
        let key = ShaderKey::new("composite1");
        let mut gl = RecordingCompiler::default();
        let mut pool = ShaderPool::new();
        pool.insert(key.clone(), program("composite1", 1, &key), &mut gl);
        pool.set_disabled(["composite1".to_owned()].into_iter().collect());
        assert!(pool.borrow_shader(&key, false).is_none());
    }

    #[test]
    fn layered_pool_initializes_layers_only_when_essential() {
        let key = ShaderKey::new("prismpipe:blit_color");
        let mut gl = RecordingCompiler::default();

        let primary = ShaderPool::new();
        let fallback_key = key.clone();
        let layer: PoolInit = Box::new(move |gl: &mut dyn NativeCompiler| {
            let mut pool = ShaderPool::new();
            let handle = gl.compile("blit_color", b"", b"").unwrap();
            pool.insert(
                fallback_key.clone(),
                CompiledProgram {
                    path: "blit_color".into(),
                    program: handle,
                    mipmap_enabled: Vec::new(),
                    render_targets: None,
                    actual_key: fallback_key.clone(),
                },
                gl,
            );
            Box::new(pool)
        });
        let mut layered = LayeredShaderPool::new(Box::new(primary), [layer]);

        assert!(layered.borrow_layered(&key, false, &mut gl).is_none());
        assert!(gl.compiled.is_empty());

        let prog = layered.borrow_layered(&key, true, &mut gl).unwrap();
        assert_eq!(prog.path, "blit_color");
        assert_eq!(gl.compiled, vec!["blit_color".to_owned()]);
        assert_eq!(layered.take_fallback_hits(), vec!["blit_color".to_owned()]);

        // second hit comes from the already initialized layer
        assert!(layered.borrow_layered(&key, true, &mut gl).is_some());
        assert_eq!(gl.compiled.len(), 1);

        layered.close(&mut gl);
    }
}
