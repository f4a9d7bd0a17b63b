//! Frame state machine driving program and stage changes.
//!
//! Types:
//! - [Node]: the phases of one managed frame
//! - [Slot]: catalogue programs an edge can select
//! - [Binder]: host callbacks the machine drives
//! - [StateGraph]: the machine itself
//! - [StackKind]: re-entrant interrupts layered on top of the walk
//!
//! Edges are data. Every legal transition is registered up front with the
//! effects it carries; moving along an unregistered edge is a contract
//! violation, not a recoverable error, because it means the host's frame
//! structure drifted from what the pipeline was built against.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::{error, trace};

use crate::stage::RenderStage;
use crate::tracker::StackTracker;

/// Synthetic entity identity for sky geometry.
pub const ENTITY_SKY: i32 = -2;
/// Synthetic entity identity for cloud geometry.
pub const ENTITY_CLOUDS: i32 = -3;

thread_local! {
    // Compatibility layers re-enter draw code off the render thread, so the
    // entity identity stack is per-thread.
    static ENTITY_STACK: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
}

pub fn push_entity(id: i32) {
    ENTITY_STACK.with_borrow_mut(|s| s.push(id));
}

pub fn pop_entity() -> Option<i32> {
    ENTITY_STACK.with_borrow_mut(|s| s.pop())
}

pub fn current_entity() -> Option<i32> {
    ENTITY_STACK.with_borrow(|s| s.last().copied())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Unmanaged,

    BeginFrame,

    ShadowBegin,
    ShadowTerrain0,
    ShadowEntities0,
    ShadowBlockEntities0,
    ShadowTerrain1,
    ShadowEntities1,
    ShadowBlockEntities1,
    ShadowLast,

    RenderBegin,
    RenderSkyBasic,
    RenderSkyTextured,
    RenderClouds,
    RenderTerrain0,
    RenderWeatherEntities0,
    RenderEntities0,
    RenderBlockEntities0,
    RenderSelectionBox,
    RenderBlockDamage,
    RenderParticlesLit,
    RenderParticles,
    RenderWeather,
    RenderHand0,
    RenderTerrain1,
    RenderWeatherEntities1,
    RenderEntities1,
    RenderBlockEntities1,
    RenderLast,
}

impl Node {
    pub fn is_shadow(self) -> bool {
        matches!(
            self,
            Node::ShadowBegin
                | Node::ShadowTerrain0
                | Node::ShadowEntities0
                | Node::ShadowBlockEntities0
                | Node::ShadowTerrain1
                | Node::ShadowEntities1
                | Node::ShadowBlockEntities1
                | Node::ShadowLast
        )
    }

    pub fn is_render(self) -> bool {
        matches!(
            self,
            Node::RenderBegin
                | Node::RenderSkyBasic
                | Node::RenderSkyTextured
                | Node::RenderClouds
                | Node::RenderTerrain0
                | Node::RenderWeatherEntities0
                | Node::RenderEntities0
                | Node::RenderBlockEntities0
                | Node::RenderSelectionBox
                | Node::RenderBlockDamage
                | Node::RenderParticlesLit
                | Node::RenderParticles
                | Node::RenderWeather
                | Node::RenderHand0
                | Node::RenderTerrain1
                | Node::RenderWeatherEntities1
                | Node::RenderEntities1
                | Node::RenderBlockEntities1
                | Node::RenderLast
        )
    }

    pub fn is_sky(self) -> bool {
        matches!(self, Node::RenderSkyBasic | Node::RenderSkyTextured)
    }
}

/// Programs an edge or interrupt can bind, by catalogue role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Basic,
    SkyBasic,
    SkyTextured,
    Textured,
    TexturedLit,
    Terrain,
    Water,
    Entities,
    Block,
    Clouds,
    Weather,
    SpiderEyes,
    Portal,
    BeaconBeam,
    Shadow,
}

/// Host-side effect sink. The machine never touches the native API itself.
pub trait Binder {
    /// `None` unbinds the current program.
    fn use_slot(&mut self, slot: Option<Slot>);
    fn update_render_stage(&mut self, stage: RenderStage);
    fn lock_shader(&mut self);
    fn unlock_shader(&mut self);
    fn clear_color_buffers(&mut self);
    fn render_hand(&mut self);
}

/// One-shot effect record carried by an edge. Applied in field order.
#[derive(Debug, Clone, Copy, Default)]
struct EdgeEffect {
    pop_entity: bool,
    push_entity: Option<i32>,
    stage: Option<RenderStage>,
    /// `Some(None)` unbinds.
    slot: Option<Option<Slot>>,
    lock: bool,
    unlock: bool,
    render_hand: bool,
    clear_color: bool,
}

impl EdgeEffect {
    const NONE: EdgeEffect = EdgeEffect {
        pop_entity: false,
        push_entity: None,
        stage: None,
        slot: None,
        lock: false,
        unlock: false,
        render_hand: false,
        clear_color: false,
    };

    fn stage_slot(stage: RenderStage, slot: Slot) -> Self {
        EdgeEffect {
            stage: Some(stage),
            slot: Some(Some(slot)),
            ..Self::NONE
        }
    }

    fn stage_only(stage: RenderStage) -> Self {
        EdgeEffect {
            stage: Some(stage),
            ..Self::NONE
        }
    }
}

/// Saved state an interrupt restores on pop.
#[derive(Debug, Clone, Copy)]
struct Saved {
    stage: Option<RenderStage>,
    slot: Option<Option<Slot>>,
}

/// Re-entrant interrupts that may cut into the frame walk at (almost) any
/// point. Each swaps some state in on push and restores it on pop; effects
/// gated `render-only` are skipped during the shadow pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    Outline,
    BlockDestroy,
    SpiderEyes,
    EntityParticle,
    Text,
    Tooltip,
    Portal,
    Leash,
    Overlay,
    ExternalShader,
    Beacon,
    HighlightTextured,
}

#[derive(Debug, Clone, Copy)]
struct StackDesc {
    stage: Option<RenderStage>,
    stage_render_only: bool,
    slot: Option<Option<Slot>>,
    slot_render_only: bool,
}

impl StackKind {
    fn descriptor(self) -> StackDesc {
        let render_slot = |slot: Slot| StackDesc {
            stage: None,
            stage_render_only: true,
            slot: Some(Some(slot)),
            slot_render_only: true,
        };
        match self {
            StackKind::Outline => render_slot(Slot::Basic),
            StackKind::BlockDestroy => StackDesc {
                stage: Some(RenderStage::TerrainSolid),
                stage_render_only: true,
                slot: Some(Some(Slot::Terrain)),
                slot_render_only: true,
            },
            StackKind::SpiderEyes => StackDesc {
                stage: Some(RenderStage::Entities),
                stage_render_only: true,
                slot: Some(Some(Slot::SpiderEyes)),
                slot_render_only: true,
            },
            StackKind::EntityParticle => render_slot(Slot::TexturedLit),
            StackKind::Text => render_slot(Slot::TexturedLit),
            StackKind::Tooltip => render_slot(Slot::TexturedLit),
            StackKind::Portal => StackDesc {
                stage: Some(RenderStage::BlockEntitiesPortal),
                stage_render_only: false,
                slot: Some(Some(Slot::Portal)),
                slot_render_only: true,
            },
            StackKind::Leash => StackDesc {
                stage: Some(RenderStage::Entities),
                stage_render_only: false,
                slot: Some(Some(Slot::Basic)),
                slot_render_only: true,
            },
            StackKind::Overlay => StackDesc {
                stage: Some(RenderStage::None),
                stage_render_only: false,
                slot: Some(Some(Slot::Basic)),
                slot_render_only: false,
            },
            StackKind::ExternalShader => StackDesc {
                stage: None,
                stage_render_only: false,
                slot: Some(None),
                slot_render_only: false,
            },
            StackKind::Beacon => StackDesc {
                stage: Some(RenderStage::BlockEntities),
                stage_render_only: false,
                slot: Some(Some(Slot::BeaconBeam)),
                slot_render_only: true,
            },
            StackKind::HighlightTextured => render_slot(Slot::Textured),
        }
    }
}

pub struct StateGraph {
    edges: HashMap<(Node, Node), EdgeEffect>,
    current: Node,
    current_stage: RenderStage,
    current_slot: Option<Slot>,
    stack: StackTracker<StackKind, Saved>,
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StateGraph {
    pub fn new() -> Self {
        Self {
            edges: build_edges(),
            current: Node::Unmanaged,
            current_stage: RenderStage::None,
            current_slot: None,
            stack: StackTracker::new(),
        }
    }

    pub fn current(&self) -> Node {
        self.current
    }

    pub fn is_managed(&self) -> bool {
        self.current != Node::Unmanaged
    }

    pub fn is_shadow_pass(&self) -> bool {
        self.current.is_shadow()
    }

    pub fn is_render_pass(&self) -> bool {
        self.current.is_render()
    }

    pub fn is_sky(&self) -> bool {
        self.current.is_sky()
    }

    pub fn render_stage(&self) -> RenderStage {
        self.current_stage
    }

    pub fn bound_slot(&self) -> Option<Slot> {
        self.current_slot
    }

    /// Follows the edge to `to`. An unregistered edge is fatal.
    pub fn move_to(&mut self, to: Node, binder: &mut dyn Binder) {
        let Some(effect) = self.edges.get(&(self.current, to)).copied() else {
            error!(from = ?self.current, to = ?to, "nonexistent graph edge");
            panic!("nonexistent graph edge: {:?} -> {:?}", self.current, to);
        };
        self.exec_move(to, effect, binder);
    }

    /// Follows the first candidate with a registered edge. Used where the
    /// host cannot know locally which phase comes next.
    pub fn move_to_either(&mut self, candidates: &[Node], binder: &mut dyn Binder) {
        assert!(!candidates.is_empty());
        for &to in candidates {
            if let Some(effect) = self.edges.get(&(self.current, to)).copied() {
                self.exec_move(to, effect, binder);
                return;
            }
        }
        error!(from = ?self.current, candidates = ?candidates, "no graph edge to any candidate");
        panic!(
            "nonexistent graph edges: {:?} -> any of {:?}",
            self.current, candidates
        );
    }

    fn exec_move(&mut self, to: Node, effect: EdgeEffect, binder: &mut dyn Binder) {
        if !self.stack.is_empty() {
            let dump = self.stack.dump();
            error!(
                from = ?self.current,
                to = ?to,
                stack = %dump,
                "graph move with outstanding interrupts"
            );
            panic!(
                "tried to move {:?} -> {:?} with outstanding interrupts\n{dump}",
                self.current, to
            );
        }
        self.apply(effect, binder);
        trace!(from = ?self.current, to = ?to, "graph move");
        self.current = to;
    }

    fn apply(&mut self, effect: EdgeEffect, binder: &mut dyn Binder) {
        if effect.pop_entity {
            pop_entity();
        }
        if let Some(id) = effect.push_entity {
            push_entity(id);
        }
        if let Some(stage) = effect.stage {
            self.current_stage = stage;
            binder.update_render_stage(stage);
        }
        if let Some(slot) = effect.slot {
            self.current_slot = slot;
            binder.use_slot(slot);
        }
        if effect.lock {
            binder.lock_shader();
        }
        if effect.unlock {
            binder.unlock_shader();
        }
        if effect.render_hand {
            binder.render_hand();
        }
        if effect.clear_color {
            binder.clear_color_buffers();
        }
    }

    /// Enters an interrupt. Fatal in unmanaged mode.
    pub fn push(&mut self, kind: StackKind, binder: &mut dyn Binder) {
        if self.current == Node::Unmanaged {
            error!(kind = ?kind, "interrupt push in unmanaged mode");
            panic!("tried to push interrupt {kind:?} while unmanaged");
        }
        let desc = kind.descriptor();
        let render = self.current.is_render();
        let mut saved = Saved {
            stage: None,
            slot: None,
        };
        if let Some(stage) = desc.stage {
            if render || !desc.stage_render_only {
                saved.stage = Some(self.current_stage);
                self.current_stage = stage;
                binder.update_render_stage(stage);
            }
        }
        if let Some(slot) = desc.slot {
            if render || !desc.slot_render_only {
                saved.slot = Some(self.current_slot);
                self.current_slot = slot;
                binder.use_slot(slot);
            }
        }
        self.stack.push(kind, saved);
    }

    /// Leaves an interrupt, restoring whatever its push swapped out.
    pub fn pop(&mut self, kind: StackKind, binder: &mut dyn Binder) {
        if self.current == Node::Unmanaged {
            error!(kind = ?kind, "interrupt pop in unmanaged mode");
            panic!("tried to pop interrupt {kind:?} while unmanaged");
        }
        let saved = self.stack.pop(&kind);
        if let Some(stage) = saved.stage {
            self.current_stage = stage;
            binder.update_render_stage(stage);
        }
        if let Some(slot) = saved.slot {
            self.current_slot = slot;
            binder.use_slot(slot);
        }
    }
}

fn build_edges() -> HashMap<(Node, Node), EdgeEffect> {
    use Node::*;
    use RenderStage as S;

    let mut edges = HashMap::new();
    let mut edge = |from: Node, to: Node, effect: EdgeEffect| {
        if edges.insert((from, to), effect).is_some() {
            panic!("duplicate graph edge: {from:?} -> {to:?}");
        }
    };

    edge(Unmanaged, BeginFrame, EdgeEffect::NONE);
    edge(
        BeginFrame,
        ShadowBegin,
        EdgeEffect {
            slot: Some(Some(Slot::Shadow)),
            lock: true,
            ..EdgeEffect::NONE
        },
    );
    edge(BeginFrame, RenderBegin, EdgeEffect::NONE);
    edge(RenderLast, Unmanaged, EdgeEffect::NONE);

    edge(
        ShadowLast,
        RenderBegin,
        EdgeEffect {
            unlock: true,
            ..EdgeEffect::NONE
        },
    );

    edge(ShadowBegin, ShadowTerrain0, EdgeEffect::stage_only(S::TerrainSolid));
    edge(ShadowTerrain0, ShadowEntities0, EdgeEffect::stage_only(S::Entities));
    edge(
        ShadowTerrain0,
        ShadowTerrain1,
        EdgeEffect::stage_only(S::TerrainTranslucent),
    );
    edge(
        ShadowEntities0,
        ShadowBlockEntities0,
        EdgeEffect::stage_only(S::BlockEntities),
    );
    edge(
        ShadowBlockEntities0,
        ShadowEntities0,
        EdgeEffect::stage_only(S::Entities),
    );
    edge(
        ShadowBlockEntities0,
        ShadowTerrain1,
        EdgeEffect::stage_only(S::TerrainTranslucent),
    );
    edge(ShadowTerrain1, ShadowEntities1, EdgeEffect::stage_only(S::Entities));
    edge(ShadowTerrain1, ShadowLast, EdgeEffect::NONE);
    edge(
        ShadowEntities1,
        ShadowBlockEntities1,
        EdgeEffect::stage_only(S::BlockEntities),
    );
    // some block entities draw entities mid-pass, so the pair oscillates
    edge(
        ShadowBlockEntities1,
        ShadowEntities1,
        EdgeEffect::stage_only(S::Entities),
    );
    edge(ShadowBlockEntities1, ShadowLast, EdgeEffect::NONE);

    edge(
        RenderBegin,
        RenderSkyBasic,
        EdgeEffect {
            push_entity: Some(ENTITY_SKY),
            ..EdgeEffect::stage_slot(S::Sky, Slot::SkyBasic)
        },
    );
    edge(
        RenderBegin,
        RenderClouds,
        EdgeEffect {
            push_entity: Some(ENTITY_CLOUDS),
            ..EdgeEffect::stage_slot(S::Clouds, Slot::Clouds)
        },
    );
    edge(
        RenderBegin,
        RenderTerrain0,
        EdgeEffect::stage_slot(S::TerrainSolid, Slot::Terrain),
    );
    for sky in [RenderSkyBasic, RenderSkyTextured] {
        edge(
            sky,
            RenderClouds,
            EdgeEffect {
                pop_entity: true,
                push_entity: Some(ENTITY_CLOUDS),
                ..EdgeEffect::stage_slot(S::Clouds, Slot::Clouds)
            },
        );
        edge(
            sky,
            RenderTerrain0,
            EdgeEffect {
                pop_entity: true,
                ..EdgeEffect::stage_slot(S::TerrainSolid, Slot::Terrain)
            },
        );
    }
    edge(RenderSkyBasic, RenderSkyBasic, EdgeEffect::NONE);
    edge(
        RenderSkyBasic,
        RenderSkyTextured,
        EdgeEffect {
            slot: Some(Some(Slot::SkyTextured)),
            ..EdgeEffect::NONE
        },
    );
    edge(
        RenderSkyTextured,
        RenderSkyBasic,
        EdgeEffect {
            slot: Some(Some(Slot::SkyBasic)),
            ..EdgeEffect::NONE
        },
    );
    edge(RenderSkyTextured, RenderSkyTextured, EdgeEffect::NONE);

    edge(
        RenderClouds,
        RenderTerrain0,
        EdgeEffect {
            pop_entity: true,
            ..EdgeEffect::stage_slot(S::TerrainSolid, Slot::Terrain)
        },
    );
    edge(
        RenderTerrain0,
        RenderWeatherEntities0,
        EdgeEffect::stage_slot(S::Entities, Slot::Entities),
    );
    edge(
        RenderTerrain0,
        RenderSelectionBox,
        EdgeEffect::stage_slot(S::None, Slot::Basic),
    );
    edge(RenderWeatherEntities0, RenderEntities0, EdgeEffect::NONE);
    edge(
        RenderEntities0,
        RenderBlockEntities0,
        EdgeEffect::stage_slot(S::BlockEntities, Slot::Block),
    );
    edge(
        RenderBlockEntities0,
        RenderWeatherEntities0,
        EdgeEffect::stage_slot(S::Entities, Slot::Entities),
    );
    edge(
        RenderBlockEntities0,
        RenderSelectionBox,
        EdgeEffect::stage_slot(S::None, Slot::Basic),
    );
    edge(
        RenderSelectionBox,
        RenderBlockDamage,
        EdgeEffect::stage_slot(S::TerrainSolid, Slot::Terrain),
    );
    edge(
        RenderBlockDamage,
        RenderParticlesLit,
        EdgeEffect::stage_slot(S::Particles, Slot::TexturedLit),
    );
    edge(
        RenderParticlesLit,
        RenderParticles,
        EdgeEffect {
            slot: Some(Some(Slot::Textured)),
            ..EdgeEffect::NONE
        },
    );
    edge(
        RenderParticles,
        RenderWeather,
        EdgeEffect::stage_slot(S::RainSnow, Slot::Weather),
    );
    edge(
        RenderWeather,
        RenderHand0,
        EdgeEffect {
            render_hand: true,
            ..EdgeEffect::NONE
        },
    );
    edge(
        RenderHand0,
        RenderTerrain1,
        EdgeEffect::stage_slot(S::TerrainTranslucent, Slot::Water),
    );
    edge(
        RenderTerrain1,
        RenderWeatherEntities1,
        EdgeEffect::stage_slot(S::Entities, Slot::Entities),
    );
    edge(
        RenderTerrain1,
        RenderClouds,
        EdgeEffect {
            push_entity: Some(ENTITY_CLOUDS),
            ..EdgeEffect::stage_slot(S::Clouds, Slot::Clouds)
        },
    );
    edge(
        RenderTerrain1,
        RenderLast,
        EdgeEffect::stage_slot(S::None, Slot::TexturedLit),
    );
    edge(RenderWeatherEntities1, RenderEntities1, EdgeEffect::NONE);
    edge(
        RenderEntities1,
        RenderBlockEntities1,
        EdgeEffect::stage_slot(S::BlockEntities, Slot::Block),
    );
    edge(
        RenderBlockEntities1,
        RenderWeatherEntities1,
        EdgeEffect::stage_slot(S::Entities, Slot::Entities),
    );
    edge(
        RenderBlockEntities1,
        RenderClouds,
        EdgeEffect {
            push_entity: Some(ENTITY_CLOUDS),
            ..EdgeEffect::stage_slot(S::Clouds, Slot::Clouds)
        },
    );
    edge(
        RenderBlockEntities1,
        RenderLast,
        EdgeEffect::stage_slot(S::None, Slot::TexturedLit),
    );
    edge(
        RenderClouds,
        RenderLast,
        EdgeEffect {
            pop_entity: true,
            ..EdgeEffect::stage_slot(S::None, Slot::TexturedLit)
        },
    );
    edge(
        RenderLast,
        RenderBegin,
        EdgeEffect {
            slot: Some(None),
            clear_color: true,
            ..EdgeEffect::NONE
        },
    );

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingBinder {
        log: Vec<String>,
    }

    impl Binder for RecordingBinder {
        fn use_slot(&mut self, slot: Option<Slot>) {
            self.log.push(format!("use {slot:?}"));
        }
        fn update_render_stage(&mut self, stage: RenderStage) {
            self.log.push(format!("stage {stage:?}"));
        }
        fn lock_shader(&mut self) {
            self.log.push("lock".into());
        }
        fn unlock_shader(&mut self) {
            self.log.push("unlock".into());
        }
        fn clear_color_buffers(&mut self) {
            self.log.push("clear".into());
        }
        fn render_hand(&mut self) {
            self.log.push("hand".into());
        }
    }

    fn drain_entities() {
        while pop_entity().is_some() {}
    }

    #[test]
    fn full_frame_walk() {
        drain_entities();
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        use Node::*;
        for node in [
            BeginFrame,
            ShadowBegin,
            ShadowTerrain0,
            ShadowEntities0,
            ShadowBlockEntities0,
            ShadowTerrain1,
            ShadowEntities1,
            ShadowBlockEntities1,
            ShadowLast,
            RenderBegin,
            RenderSkyBasic,
            RenderSkyTextured,
            RenderClouds,
            RenderTerrain0,
            RenderWeatherEntities0,
            RenderEntities0,
            RenderBlockEntities0,
            RenderSelectionBox,
            RenderBlockDamage,
            RenderParticlesLit,
            RenderParticles,
            RenderWeather,
            RenderHand0,
            RenderTerrain1,
            RenderClouds,
            RenderLast,
            Unmanaged,
        ] {
            g.move_to(node, &mut b);
        }
        assert!(!g.is_managed());
        assert!(current_entity().is_none());
        assert!(b.log.contains(&"lock".into()));
        assert!(b.log.contains(&"unlock".into()));
        assert!(b.log.contains(&"hand".into()));
    }

    #[test]
    fn sky_transitions_swap_entity_identity() {
        drain_entities();
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::BeginFrame, &mut b);
        g.move_to(Node::RenderBegin, &mut b);
        g.move_to(Node::RenderSkyBasic, &mut b);
        assert_eq!(current_entity(), Some(ENTITY_SKY));
        g.move_to(Node::RenderClouds, &mut b);
        assert_eq!(current_entity(), Some(ENTITY_CLOUDS));
        g.move_to(Node::RenderTerrain0, &mut b);
        assert_eq!(current_entity(), None);
    }

    #[test]
    #[should_panic(expected = "nonexistent graph edge")]
    fn missing_edge_panics() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::RenderLast, &mut b);
    }

    #[test]
    fn move_to_either_takes_first_registered() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::BeginFrame, &mut b);
        g.move_to_either(&[Node::ShadowBegin, Node::RenderBegin], &mut b);
        assert_eq!(g.current(), Node::ShadowBegin);
        assert!(g.is_shadow_pass());
    }

    #[test]
    fn interrupt_round_trip_restores_state() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::BeginFrame, &mut b);
        g.move_to(Node::RenderBegin, &mut b);
        g.move_to(Node::RenderTerrain0, &mut b);
        assert_eq!(g.render_stage(), RenderStage::TerrainSolid);
        assert_eq!(g.bound_slot(), Some(Slot::Terrain));

        g.push(StackKind::SpiderEyes, &mut b);
        assert_eq!(g.render_stage(), RenderStage::Entities);
        assert_eq!(g.bound_slot(), Some(Slot::SpiderEyes));
        g.pop(StackKind::SpiderEyes, &mut b);
        assert_eq!(g.render_stage(), RenderStage::TerrainSolid);
        assert_eq!(g.bound_slot(), Some(Slot::Terrain));
    }

    #[test]
    fn render_only_effects_skip_shadow_pass() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::BeginFrame, &mut b);
        g.move_to(Node::ShadowBegin, &mut b);
        g.move_to(Node::ShadowTerrain0, &mut b);
        let before = g.bound_slot();

        // Portal swaps the stage everywhere but only binds during render
        g.push(StackKind::Portal, &mut b);
        assert_eq!(g.render_stage(), RenderStage::BlockEntitiesPortal);
        assert_eq!(g.bound_slot(), before);
        g.pop(StackKind::Portal, &mut b);
        assert_eq!(g.render_stage(), RenderStage::TerrainSolid);
    }

    #[test]
    fn interrupts_nest_lifo() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::BeginFrame, &mut b);
        g.move_to(Node::RenderBegin, &mut b);
        g.move_to(Node::RenderTerrain0, &mut b);
        g.push(StackKind::Beacon, &mut b);
        g.push(StackKind::Text, &mut b);
        g.pop(StackKind::Text, &mut b);
        g.pop(StackKind::Beacon, &mut b);
        assert_eq!(g.bound_slot(), Some(Slot::Terrain));
    }

    #[test]
    #[should_panic(expected = "outstanding interrupts")]
    fn move_with_outstanding_interrupt_panics() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.move_to(Node::BeginFrame, &mut b);
        g.move_to(Node::RenderBegin, &mut b);
        g.push(StackKind::ExternalShader, &mut b);
        g.move_to(Node::RenderTerrain0, &mut b);
    }

    #[test]
    #[should_panic(expected = "unmanaged")]
    fn interrupt_push_unmanaged_panics() {
        let mut g = StateGraph::new();
        let mut b = RecordingBinder::default();
        g.push(StackKind::Text, &mut b);
    }
}
