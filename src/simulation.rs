//! Simulation driver: double-buffered grid state stepped by a `LifeKernel`
//!
//! Two host grids of identical shape are owned here. One is "current"
//! (read by rendering and used as the next step's input), the other is the
//! write target of the next step. The selector flips only after a step
//! has completed successfully, so a failed step never exposes a partially
//! written generation.

use crate::engine::{self, Backend, EngineResult, LifeKernel};
use crate::grid::Grid;

/// Which of the two named buffers is current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    Front,
    Back,
}

impl BufferSlot {
    #[inline]
    pub fn other(self) -> Self {
        match self {
            BufferSlot::Front => BufferSlot::Back,
            BufferSlot::Back => BufferSlot::Front,
        }
    }
}

pub struct Simulation {
    front: Grid,
    back: Grid,
    current: BufferSlot,
    step_count: u64,
    engine: Box<dyn LifeKernel>,
}

impl Simulation {
    /// Take ownership of the initial grid and build a step engine sized to
    /// it on the requested backend.
    pub fn with_backend(initial: Grid, backend: Backend, max_block_edge: usize) -> EngineResult<Self> {
        let engine = engine::create_engine(backend, initial.width(), initial.height(), max_block_edge)?;
        Ok(Self::new(initial, engine))
    }

    /// Take ownership of the initial grid (stored in the front buffer) and
    /// an already constructed engine.
    ///
    /// Panics if the engine was sized for a different grid.
    pub fn new(initial: Grid, engine: Box<dyn LifeKernel>) -> Self {
        let layout = engine.layout();
        assert_eq!(
            (layout.width, layout.height),
            (initial.width(), initial.height()),
            "engine layout does not match grid dimensions"
        );

        let back = initial.clone();
        Self {
            front: initial,
            back,
            current: BufferSlot::Front,
            step_count: 0,
            engine,
        }
    }

    /// Compute one generation: current → other buffer, then flip.
    ///
    /// On error nothing flips, and the write target is reset to a copy of
    /// the current generation so no partial output stays reachable through
    /// `previous_grid`.
    pub fn advance(&mut self) -> EngineResult<()> {
        let (input, output) = match self.current {
            BufferSlot::Front => (&self.front, &mut self.back),
            BufferSlot::Back => (&self.back, &mut self.front),
        };
        if let Err(e) = self.engine.step(input.cells(), output.cells_mut()) {
            output.cells_mut().copy_from_slice(input.cells());
            return Err(e);
        }

        self.current = self.current.other();
        self.step_count += 1;
        Ok(())
    }

    /// The latest generation
    pub fn current_grid(&self) -> &Grid {
        self.grid(self.current)
    }

    /// The generation before `current_grid` (the initial grid before the
    /// first step, and a copy of `current_grid` after a failed step).
    /// Overwritten by the next `advance`.
    pub fn previous_grid(&self) -> &Grid {
        self.grid(self.current.other())
    }

    pub fn current_slot(&self) -> BufferSlot {
        self.current
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn width(&self) -> usize {
        self.front.width()
    }

    pub fn height(&self) -> usize {
        self.front.height()
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    fn grid(&self, slot: BufferSlot) -> &Grid {
        match slot {
            BufferSlot::Front => &self.front,
            BufferSlot::Back => &self.back,
        }
    }
}
