//! Execution-tile layout for the stepping kernel.
//!
//! The grid is covered by a 2-D array of square-ish tiles; each tile maps
//! to one CUDA block / wgpu workgroup, and each worker in a tile owns one
//! cell. When a dimension is not a multiple of the tile edge the last tile
//! row/column over-covers the grid, and those workers must do nothing.

/// Largest tile edge any backend will use
pub const MAX_BLOCK_EDGE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub width: usize,
    pub height: usize,
    /// Workers per tile along x
    pub block_width: usize,
    /// Workers per tile along y
    pub block_height: usize,
    /// Tiles along x
    pub tiles_x: usize,
    /// Tiles along y
    pub tiles_y: usize,
}

impl TileLayout {
    /// Edge per axis is `min(max_edge, dimension)`; tile count per axis
    /// rounds up so the whole grid is covered.
    pub fn new(width: usize, height: usize, max_edge: usize) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        assert!(width.checked_mul(height).is_some(), "grid dimensions overflow");
        assert!(max_edge > 0, "tile edge must be non-zero");

        let block_width = max_edge.min(width);
        let block_height = max_edge.min(height);
        Self {
            width,
            height,
            block_width,
            block_height,
            tiles_x: width.div_ceil(block_width),
            tiles_y: height.div_ceil(block_height),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    pub fn workers_per_tile(&self) -> usize {
        self.block_width * self.block_height
    }

    /// Total launched workers, including out-of-range ones
    pub fn total_workers(&self) -> usize {
        self.tiles_x * self.tiles_y * self.workers_per_tile()
    }

    /// Grid coordinate owned by worker `(local_x, local_y)` of tile
    /// `(tile_x, tile_y)`, or `None` if it falls outside the grid.
    #[inline]
    pub fn cell_of(&self, tile_x: usize, tile_y: usize, local_x: usize, local_y: usize) -> Option<(usize, usize)> {
        let x = tile_x * self.block_width + local_x;
        let y = tile_y * self.block_height + local_y;
        if x < self.width && y < self.height {
            Some((x, y))
        } else {
            None
        }
    }
}

impl std::fmt::Display for TileLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} grid, {}x{} tiles of {}x{} workers ({} launched)",
            self.width,
            self.height,
            self.tiles_x,
            self.tiles_y,
            self.block_width,
            self.block_height,
            self.total_workers()
        )
    }
}
