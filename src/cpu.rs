//! CPU backend
//!
//! Emulates the accelerator launch on the host: tile rows run in parallel on
//! the rayon pool, and inside a tile every worker performs the same bounds
//! check and per-cell rule as the device kernels. The "device" buffers are
//! plain host vectors owned by the engine, so the upload/download discipline
//! is identical to the GPU paths.

use crate::engine::{EngineResult, LifeKernel};
use crate::grid::DEAD_CELL;
use crate::life;
use crate::tiling::TileLayout;
use rayon::prelude::*;

pub struct CpuLifeEngine {
    layout: TileLayout,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl CpuLifeEngine {
    pub fn new(width: usize, height: usize, max_block_edge: usize) -> Self {
        let layout = TileLayout::new(width, height, max_block_edge);
        log::info!("CPU backend: {} ({} threads)", layout, rayon::current_num_threads());
        Self {
            layout,
            input: vec![DEAD_CELL; layout.cell_count()],
            output: vec![DEAD_CELL; layout.cell_count()],
        }
    }

    fn launch(&mut self) {
        let layout = self.layout;
        let width = layout.width;
        let input = &self.input;

        // One chunk per tile row: block_height full grid rows (the last one
        // may be shorter), so tile rows write disjoint slices.
        self.output
            .par_chunks_mut(layout.block_height * width)
            .enumerate()
            .for_each(|(tile_y, rows)| {
                for tile_x in 0..layout.tiles_x {
                    for local_y in 0..layout.block_height {
                        for local_x in 0..layout.block_width {
                            let Some((x, y)) = layout.cell_of(tile_x, tile_y, local_x, local_y) else {
                                continue;
                            };
                            rows[local_y * width + x] = life::evaluate_cell(input, width, layout.height, x, y);
                        }
                    }
                }
            });
    }
}

impl LifeKernel for CpuLifeEngine {
    fn name(&self) -> &str {
        "cpu"
    }

    fn layout(&self) -> &TileLayout {
        &self.layout
    }

    fn step(&mut self, input: &[u8], output: &mut [u8]) -> EngineResult<()> {
        assert_eq!(input.len(), self.layout.cell_count(), "input size does not match engine");
        assert_eq!(output.len(), self.layout.cell_count(), "output size does not match engine");

        self.input.copy_from_slice(input);
        self.launch();
        output.copy_from_slice(&self.output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, LIVING_CELL};
    use crate::tiling::MAX_BLOCK_EDGE;

    fn step_once(grid: &Grid, max_edge: usize) -> Vec<u8> {
        let mut engine = CpuLifeEngine::new(grid.width(), grid.height(), max_edge);
        let mut out = vec![0xAA; grid.len()];
        engine.step(grid.cells(), &mut out).unwrap();
        out
    }

    #[test]
    fn test_isolated_cell_dies() {
        let mut cells = vec![DEAD_CELL; 9];
        cells[4] = LIVING_CELL;
        let grid = Grid::from_cells(3, 3, cells).unwrap();
        assert!(step_once(&grid, MAX_BLOCK_EDGE).iter().all(|&c| c == DEAD_CELL));
    }

    #[test]
    fn test_block_is_still_life() {
        let grid = Grid::parse("......\n......\n..##..\n..##..\n......\n......\n", '#').unwrap();
        assert_eq!(step_once(&grid, MAX_BLOCK_EDGE), grid.cells());
    }

    #[test]
    fn test_wrapped_corners_form_block() {
        // Four corners of a 4x4 torus are one 2x2 block across the seam
        let grid = Grid::parse("#..#\n....\n....\n#..#\n", '#').unwrap();
        assert_eq!(step_once(&grid, MAX_BLOCK_EDGE), grid.cells());
    }

    #[test]
    fn test_non_multiple_width_matches_reference() {
        // 50 columns with 32-wide tiles: second tile column is partly idle
        let grid = Grid::random(50, 50, 900, 11).unwrap();
        let mut expected = vec![0u8; grid.len()];
        life::step_reference(grid.cells(), &mut expected, 50, 50);

        let out = step_once(&grid, MAX_BLOCK_EDGE);
        assert!(out.iter().all(|&c| c == DEAD_CELL || c == LIVING_CELL), "stale byte left in output");
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tile_edge_does_not_change_result() {
        let grid = Grid::random(37, 23, 300, 5).unwrap();
        let reference = step_once(&grid, MAX_BLOCK_EDGE);
        for edge in [1, 3, 8, 16] {
            assert_eq!(step_once(&grid, edge), reference, "edge {}", edge);
        }
    }

    #[test]
    #[should_panic(expected = "input size does not match engine")]
    fn test_size_mismatch_panics() {
        let mut engine = CpuLifeEngine::new(4, 4, MAX_BLOCK_EDGE);
        let mut out = vec![0u8; 16];
        let _ = engine.step(&[0u8; 15], &mut out);
    }
}
