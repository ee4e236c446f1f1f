//! Cell and grid types, plus the collaborators that build and render grids.
//!
//! A grid is stored as one byte per cell in row-major order, which is the
//! exact layout the accelerator backends transfer to and from the device.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Byte value of a dead cell
pub const DEAD_CELL: u8 = 0;
/// Byte value of a living cell
pub const LIVING_CELL: u8 = 1;

/// State of a single grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cell {
    Dead = DEAD_CELL,
    Living = LIVING_CELL,
}

impl Cell {
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            DEAD_CELL => Some(Cell::Dead),
            LIVING_CELL => Some(Cell::Living),
            _ => None,
        }
    }

    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_living(self) -> bool {
        self == Cell::Living
    }
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: usize, height: usize },

    #[error("cell buffer has {actual} entries, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("invalid cell value {value} at index {index}")]
    InvalidCell { index: usize, value: u8 },

    #[error("grid of {width}x{height} cells is too large")]
    TooLarge { width: usize, height: usize },

    #[error("cannot place {requested} living cells on a grid of {capacity} cells")]
    TooManyLiving { requested: usize, capacity: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fixed-size toroidal grid of cells (row-major, one byte per cell)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// All-dead grid
    pub fn new(width: usize, height: usize) -> Result<Self, GridError> {
        let len = cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![DEAD_CELL; len],
        })
    }

    /// Take ownership of an existing cell buffer
    pub fn from_cells(width: usize, height: usize, cells: Vec<u8>) -> Result<Self, GridError> {
        let expected = cell_count(width, height)?;
        if cells.len() != expected {
            return Err(GridError::SizeMismatch {
                expected,
                actual: cells.len(),
            });
        }
        if let Some((index, &value)) = cells
            .iter()
            .enumerate()
            .find(|(_, &c)| Cell::from_byte(c).is_none())
        {
            return Err(GridError::InvalidCell { index, value });
        }
        Ok(Self { width, height, cells })
    }

    /// Parse a text grid: one line per row, `living_mark` marks a living
    /// cell and every other character is dead. Short lines are padded
    /// with dead cells up to the longest line.
    pub fn parse(text: &str, living_mark: char) -> Result<Self, GridError> {
        let mut lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }

        let height = lines.len();
        let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let mut cells = Vec::with_capacity(cell_count(width, height)?);

        for line in &lines {
            let mut len = 0;
            for ch in line.chars() {
                let cell = if ch == living_mark { Cell::Living } else { Cell::Dead };
                cells.push(cell.as_byte());
                len += 1;
            }
            cells.resize(cells.len() + (width - len), Cell::Dead.as_byte());
        }
        Self::from_cells(width, height, cells)
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P, living_mark: char) -> Result<Self, GridError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, living_mark)
    }

    /// Grid with exactly `living` distinct living cells, placed by a seeded RNG
    pub fn random(width: usize, height: usize, living: usize, seed: u64) -> Result<Self, GridError> {
        let mut grid = Self::new(width, height)?;
        let capacity = grid.len();
        if living > capacity {
            return Err(GridError::TooManyLiving {
                requested: living,
                capacity,
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let width = grid.width;
        for idx in rand::seq::index::sample(&mut rng, capacity, living) {
            grid.set(idx % width, idx / width, Cell::Living);
        }
        Ok(grid)
    }

    /// Fixed-width text rendering, one `\n`-terminated line per row
    pub fn render(&self, living_mark: char, dead_mark: char) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            out.extend((0..self.width).map(|x| {
                if self.get(x, y).is_living() {
                    living_mark
                } else {
                    dead_mark
                }
            }));
            out.push('\n');
        }
        out
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Mutable access is crate-private: only the simulation driver hands a
    /// grid to the engine as a write target.
    pub(crate) fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> Cell {
        Cell::from_byte(self.cells[y * self.width + x]).unwrap_or(Cell::Dead)
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[y * self.width + x] = cell.as_byte();
    }

    /// Number of living cells
    pub fn population(&self) -> usize {
        self.cells
            .iter()
            .filter(|&&c| Cell::from_byte(c).is_some_and(Cell::is_living))
            .count()
    }
}

/// `width * height`, rejecting empty and overflowing dimensions
pub fn cell_count(width: usize, height: usize) -> Result<usize, GridError> {
    if width == 0 || height == 0 {
        return Err(GridError::EmptyDimensions { width, height });
    }
    width
        .checked_mul(height)
        .ok_or(GridError::TooLarge { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_dead() {
        let grid = Grid::new(5, 3).unwrap();
        assert_eq!(grid.len(), 15);
        assert_eq!(grid.population(), 0);
        assert!(grid.cells().iter().all(|&c| c == DEAD_CELL));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(Grid::new(0, 4), Err(GridError::EmptyDimensions { .. })));
        assert!(matches!(Grid::new(4, 0), Err(GridError::EmptyDimensions { .. })));
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        assert!(matches!(
            Grid::new(usize::MAX, 2),
            Err(GridError::TooLarge { width: usize::MAX, height: 2 })
        ));
        assert!(matches!(
            Grid::from_cells(usize::MAX, 2, vec![0]),
            Err(GridError::TooLarge { .. })
        ));
        assert!(matches!(Grid::random(2, usize::MAX, 1, 0), Err(GridError::TooLarge { .. })));
        assert_eq!(cell_count(7, 3).unwrap(), 21);
    }

    #[test]
    fn test_from_cells_validates() {
        assert!(matches!(
            Grid::from_cells(2, 2, vec![0, 1, 0]),
            Err(GridError::SizeMismatch { expected: 4, actual: 3 })
        ));
        assert!(matches!(
            Grid::from_cells(2, 2, vec![0, 1, 7, 0]),
            Err(GridError::InvalidCell { index: 2, value: 7 })
        ));
        let grid = Grid::from_cells(2, 2, vec![0, 1, 1, 0]).unwrap();
        assert_eq!(grid.get(1, 0), Cell::Living);
        assert_eq!(grid.get(1, 1), Cell::Dead);
    }

    #[test]
    fn test_parse_pads_short_lines() {
        let grid = Grid::parse("#..\n.#\r\n\n#\n\n", '#').unwrap();
        // The blank third line is a real row; only trailing blanks are dropped
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.get(0, 0), Cell::Living);
        assert_eq!(grid.get(1, 1), Cell::Living);
        assert_eq!(grid.get(2, 1), Cell::Dead);
        assert_eq!(grid.get(0, 3), Cell::Living);
        assert_eq!(grid.population(), 3);
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(matches!(Grid::parse("", '#'), Err(GridError::EmptyDimensions { .. })));
        assert!(matches!(Grid::parse("\n\n", '#'), Err(GridError::EmptyDimensions { .. })));
    }

    #[test]
    fn test_read_from_file() {
        let path = std::env::temp_dir().join("gpu_life_grid_test.txt");
        fs::write(&path, "o.o\n.o.\n").unwrap();
        let grid = Grid::read_from_file(&path, 'o').unwrap();
        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.population(), 3);
        let _ = fs::remove_file(&path);

        assert!(matches!(
            Grid::read_from_file("/nonexistent/gpu_life/grid.txt", 'o'),
            Err(GridError::Io(_))
        ));
    }

    #[test]
    fn test_random_exact_population() {
        let grid = Grid::random(20, 10, 37, 7).unwrap();
        assert_eq!(grid.population(), 37);

        let full = Grid::random(4, 4, 16, 1).unwrap();
        assert_eq!(full.population(), 16);

        assert!(matches!(
            Grid::random(4, 4, 17, 1),
            Err(GridError::TooManyLiving { requested: 17, capacity: 16 })
        ));
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Grid::random(32, 16, 100, 42).unwrap();
        let b = Grid::random(32, 16, 100, 42).unwrap();
        let c = Grid::random(32, 16, 100, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_render() {
        let mut grid = Grid::new(3, 2).unwrap();
        grid.set(0, 0, Cell::Living);
        grid.set(2, 1, Cell::Living);
        assert_eq!(grid.render('#', '.'), "#..\n..#\n");
    }
}
