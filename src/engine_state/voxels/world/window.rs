//! The `side × side` ring of chunk geometry slots.
//!
//! Slots are stored in a flat table that never moves. Logical grid position
//! `(i, j)` (relative to the world offset) maps to a physical slot through a
//! ring origin, so scrolling the window is an origin rotation: the line of
//! slots leaving on one edge becomes the line entering on the opposite edge,
//! without touching any other slot.

use cgmath::Vector2;

use crate::engine_state::buffer_state::Region;

/// One of the four single-step window transitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    /// Offset `x + 1`
    PositiveX,
    /// Offset `x - 1`
    NegativeX,
    /// Offset `z + 1`
    PositiveZ,
    /// Offset `z - 1`
    NegativeZ,
}

impl ScrollDirection {
    /// All four directions.
    pub fn all() -> [ScrollDirection; 4] {
        [
            ScrollDirection::PositiveX,
            ScrollDirection::NegativeX,
            ScrollDirection::PositiveZ,
            ScrollDirection::NegativeZ,
        ]
    }

    /// Change of the world offset.
    pub fn step(self) -> Vector2<i32> {
        match self {
            ScrollDirection::PositiveX => Vector2::new(1, 0),
            ScrollDirection::NegativeX => Vector2::new(-1, 0),
            ScrollDirection::PositiveZ => Vector2::new(0, 1),
            ScrollDirection::NegativeZ => Vector2::new(0, -1),
        }
    }
}

/// Geometry of one window cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkSlot {
    /// Geometry region, fixed for the slot's lifetime
    pub region: Region,
    /// Logical face count, destroyed faces included
    pub face_count: u32,
    /// False while a staged copy into the region is in flight
    pub ready: bool,
    /// Absolute chunk coordinate currently held
    pub coord: Vector2<i32>,
}

/// Ring handle table of `side × side` chunk slots.
#[derive(Debug, Clone)]
pub struct WindowGrid {
    side: usize,
    origin: (usize, usize),
    slots: Vec<ChunkSlot>,
}

impl WindowGrid {
    /// Wraps slots laid out in logical row-major order (`i * side + j`).
    pub fn new(side: usize, slots: Vec<ChunkSlot>) -> Self {
        debug_assert_eq!(slots.len(), side * side);
        Self {
            side,
            origin: (0, 0),
            slots,
        }
    }

    /// Cells per axis.
    pub fn side(&self) -> usize {
        self.side
    }

    fn physical(&self, i: usize, j: usize) -> usize {
        ((self.origin.0 + i) % self.side) * self.side + (self.origin.1 + j) % self.side
    }

    /// The slot at logical position `(i, j)`.
    pub fn slot(&self, i: usize, j: usize) -> &ChunkSlot {
        &self.slots[self.physical(i, j)]
    }

    /// Mutable slot at logical position `(i, j)`.
    pub fn slot_mut(&mut self, i: usize, j: usize) -> &mut ChunkSlot {
        let index = self.physical(i, j);
        &mut self.slots[index]
    }

    /// Rotates the ring one step. The leaving line becomes the entering line.
    pub fn shift(&mut self, direction: ScrollDirection) {
        let side = self.side;
        match direction {
            ScrollDirection::PositiveX => self.origin.0 = (self.origin.0 + 1) % side,
            ScrollDirection::NegativeX => self.origin.0 = (self.origin.0 + side - 1) % side,
            ScrollDirection::PositiveZ => self.origin.1 = (self.origin.1 + 1) % side,
            ScrollDirection::NegativeZ => self.origin.1 = (self.origin.1 + side - 1) % side,
        }
    }

    /// Logical positions of the line that entered with the last shift in `direction`.
    pub fn entering_line(&self, direction: ScrollDirection) -> Vec<(usize, usize)> {
        let last = self.side - 1;
        (0..self.side)
            .map(|k| match direction {
                ScrollDirection::PositiveX => (last, k),
                ScrollDirection::NegativeX => (0, k),
                ScrollDirection::PositiveZ => (k, last),
                ScrollDirection::NegativeZ => (k, 0),
            })
            .collect()
    }

    /// Every slot with its logical position, row-major.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &ChunkSlot)> + '_ {
        (0..self.side)
            .flat_map(move |i| (0..self.side).map(move |j| (i, j)))
            .map(move |(i, j)| ((i, j), self.slot(i, j)))
    }

    /// Every slot in storage order.
    pub fn slots_mut(&mut self) -> impl Iterator<Item = &mut ChunkSlot> {
        self.slots.iter_mut()
    }
}
