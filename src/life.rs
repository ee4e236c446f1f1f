//! The life rule and toroidal neighbor counting
//!
//! This is the scalar body shared by every backend: the CUDA and WGSL
//! kernels carry a line-for-line copy of `count_neighbors` and `next_state`,
//! and the CPU backend calls these functions directly.

use crate::grid::{DEAD_CELL, LIVING_CELL};

/// Next state of a cell given its current byte and its living-neighbor count.
/// Standard B3/S23 thresholds.
#[inline]
pub fn next_state(cell: u8, living_neighbors: u32) -> u8 {
    let alive = cell == LIVING_CELL;
    if living_neighbors == 3 || (alive && living_neighbors == 2) {
        LIVING_CELL
    } else {
        DEAD_CELL
    }
}

/// Count living cells among the 8 toroidal neighbors of `(x, y)`.
///
/// Wrap-around uses `(c + dim - 1) % dim` and `(c + 1) % dim` for every
/// cell, corners included; there is no edge special-casing.
#[inline]
pub fn count_neighbors(cells: &[u8], width: usize, height: usize, x: usize, y: usize) -> u32 {
    let left = (x + width - 1) % width;
    let right = (x + 1) % width;
    let up = (y + height - 1) % height;
    let down = (y + 1) % height;

    let row_up = up * width;
    let row = y * width;
    let row_down = down * width;

    [
        cells[row_up + left],
        cells[row_up + x],
        cells[row_up + right],
        cells[row + left],
        cells[row + right],
        cells[row_down + left],
        cells[row_down + x],
        cells[row_down + right],
    ]
    .iter()
    .filter(|&&c| c == LIVING_CELL)
    .count() as u32
}

/// Evaluate one cell: the work of a single accelerator worker
#[inline]
pub fn evaluate_cell(input: &[u8], width: usize, height: usize, x: usize, y: usize) -> u8 {
    let neighbors = count_neighbors(input, width, height, x, y);
    next_state(input[y * width + x], neighbors)
}

/// Plain sequential generation step. Used as the oracle the tiled backends
/// are checked against.
#[cfg(test)]
pub fn step_reference(input: &[u8], output: &mut [u8], width: usize, height: usize) {
    assert_eq!(input.len(), width * height);
    assert_eq!(output.len(), width * height);
    for y in 0..height {
        for x in 0..width {
            output[y * width + x] = evaluate_cell(input, width, height, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        for n in 0..=8 {
            let expected_alive = if n == 2 || n == 3 { LIVING_CELL } else { DEAD_CELL };
            assert_eq!(next_state(LIVING_CELL, n), expected_alive, "living with {} neighbors", n);

            let expected_dead = if n == 3 { LIVING_CELL } else { DEAD_CELL };
            assert_eq!(next_state(DEAD_CELL, n), expected_dead, "dead with {} neighbors", n);
        }
    }

    #[test]
    fn test_corner_wraps_to_opposite_corners() {
        // 4x4 with a single living cell at (0,0)
        let mut cells = vec![DEAD_CELL; 16];
        cells[0] = LIVING_CELL;

        assert_eq!(count_neighbors(&cells, 4, 4, 3, 0), 1);
        assert_eq!(count_neighbors(&cells, 4, 4, 0, 3), 1);
        assert_eq!(count_neighbors(&cells, 4, 4, 3, 3), 1);
        // Not adjacent even with wrap
        assert_eq!(count_neighbors(&cells, 4, 4, 2, 2), 0);
    }

    #[test]
    fn test_opposite_corners_see_each_other() {
        let mut cells = vec![DEAD_CELL; 16];
        cells[0] = LIVING_CELL; // (0,0)
        cells[15] = LIVING_CELL; // (3,3)

        assert_eq!(count_neighbors(&cells, 4, 4, 0, 0), 1);
        assert_eq!(count_neighbors(&cells, 4, 4, 3, 3), 1);
        // (3,0) and (0,3) touch both corners
        assert_eq!(count_neighbors(&cells, 4, 4, 3, 0), 2);
        assert_eq!(count_neighbors(&cells, 4, 4, 0, 3), 2);
    }

    #[test]
    fn test_tiny_torus_counts_self_images() {
        // On a 1x1 torus all 8 neighbors are the cell itself
        assert_eq!(count_neighbors(&[LIVING_CELL], 1, 1, 0, 0), 8);
        assert_eq!(count_neighbors(&[DEAD_CELL], 1, 1, 0, 0), 0);
    }

    #[test]
    fn test_isolated_cell_dies() {
        let mut input = vec![DEAD_CELL; 9];
        input[4] = LIVING_CELL;
        let mut output = vec![LIVING_CELL; 9];
        step_reference(&input, &mut output, 3, 3);
        assert!(output.iter().all(|&c| c == DEAD_CELL));
    }

    #[test]
    fn test_blinker_oscillates() {
        let (w, h) = (5, 5);
        let mut a = vec![DEAD_CELL; w * h];
        for x in 1..4 {
            a[2 * w + x] = LIVING_CELL;
        }
        let mut b = vec![DEAD_CELL; w * h];
        step_reference(&a, &mut b, w, h);

        for y in 1..4 {
            assert_eq!(b[y * w + 2], LIVING_CELL);
        }
        assert_eq!(b.iter().filter(|&&c| c == LIVING_CELL).count(), 3);

        let mut c = vec![DEAD_CELL; w * h];
        step_reference(&b, &mut c, w, h);
        assert_eq!(a, c);
    }
}
