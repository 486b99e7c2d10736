use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Contents of one maze cell. Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cell {
    /// Open floor, including cells the agent has already walked over.
    Open,
    Wall,
    Start,
    Goal,
}

impl Cell {
    pub fn code(self) -> u8 {
        match self {
            Cell::Open => 0,
            Cell::Wall => 1,
            Cell::Start => 2,
            Cell::Goal => 3,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Cell::Open),
            1 => Ok(Cell::Wall),
            2 => Ok(Cell::Start),
            3 => Ok(Cell::Goal),
            other => Err(format!("invalid cell value {other}")),
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> u8 {
        cell.code()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MazeError {
    #[error("maze has no cells")]
    Empty,
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("invalid cell value {value} at ({x}, {y})")]
    InvalidCell { x: usize, y: usize, value: u8 },
}

/// A rectangular grid addressed as `(x, y)`: x is the column, y the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct Maze {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Maze {
    /// Validate a raw grid: non-empty, rectangular, every value in 0..=3.
    pub fn new(raw: Vec<Vec<u8>>) -> Result<Self, MazeError> {
        let width = raw.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(MazeError::Empty);
        }
        let mut rows = Vec::with_capacity(raw.len());
        for (y, row) in raw.into_iter().enumerate() {
            if row.len() != width {
                return Err(MazeError::Ragged {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            let cells = row
                .into_iter()
                .enumerate()
                .map(|(x, value)| {
                    Cell::try_from(value).map_err(|_| MazeError::InvalidCell { x, y, value })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(cells);
        }
        Ok(Self { rows, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: i64, y: i64) -> Option<Cell> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        self.rows.get(y)?.get(x).copied()
    }

    /// Overwrite a cell. Returns false if `(x, y)` is outside the grid.
    pub fn set(&mut self, x: i64, y: i64, cell: Cell) -> bool {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return false;
        };
        match self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.get(x, y).is_some()
    }

    /// First cell of the given kind in row-major order.
    pub fn find(&self, target: Cell) -> Option<(i64, i64)> {
        self.rows.iter().enumerate().find_map(|(y, row)| {
            row.iter().position(|&c| c == target).and_then(|x| {
                Some((i64::try_from(x).ok()?, i64::try_from(y).ok()?))
            })
        })
    }

    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|c| c.code()).collect())
            .collect()
    }
}

impl TryFrom<Vec<Vec<u8>>> for Maze {
    type Error = MazeError;

    fn try_from(raw: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Maze::new(raw)
    }
}

impl From<Maze> for Vec<Vec<u8>> {
    fn from(maze: Maze) -> Self {
        maze.to_rows()
    }
}

impl fmt::Display for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let line: String = row
                .iter()
                .map(|c| match c {
                    Cell::Open => '.',
                    Cell::Wall => '#',
                    Cell::Start => 'S',
                    Cell::Goal => 'G',
                })
                .collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample() -> Maze {
        Maze::new(vec![
            vec![1, 2, 1],
            vec![1, 0, 1],
            vec![1, 3, 1],
        ])
        .unwrap()
    }

    #[test]
    fn indexes_by_column_then_row() {
        let maze = sample();
        assert_eq!(maze.get(1, 0), Some(Cell::Start));
        assert_eq!(maze.get(1, 2), Some(Cell::Goal));
        assert_eq!(maze.get(0, 1), Some(Cell::Wall));
        assert_eq!(maze.get(-1, 0), None);
        assert_eq!(maze.get(3, 0), None);
        assert_eq!((maze.width(), maze.height()), (3, 3));
    }

    #[test]
    fn find_is_row_major() {
        let maze = Maze::new(vec![vec![0, 0, 3], vec![3, 0, 0]]).unwrap();
        assert_eq!(maze.find(Cell::Goal), Some((2, 0)));
        assert_eq!(maze.find(Cell::Start), None);
    }

    #[test]
    fn set_rejects_out_of_bounds() {
        let mut maze = sample();
        assert!(maze.set(1, 0, Cell::Open));
        assert_eq!(maze.get(1, 0), Some(Cell::Open));
        assert!(!maze.set(5, 5, Cell::Open));
    }

    #[test]
    fn validation_errors() {
        assert_eq!(Maze::new(vec![]), Err(MazeError::Empty));
        assert_eq!(Maze::new(vec![vec![]]), Err(MazeError::Empty));
        assert_eq!(
            Maze::new(vec![vec![0, 0], vec![0]]),
            Err(MazeError::Ragged { row: 1, expected: 2, found: 1 })
        );
        assert_eq!(
            Maze::new(vec![vec![0, 7]]),
            Err(MazeError::InvalidCell { x: 1, y: 0, value: 7 })
        );
    }

    #[test]
    fn json_uses_numeric_rows() {
        let maze: Maze = serde_json::from_str("[[1,2],[3,0]]").unwrap();
        assert_eq!(maze.get(0, 1), Some(Cell::Goal));
        assert_eq!(serde_json::to_string(&maze).unwrap(), "[[1,2],[3,0]]");
        assert!(serde_json::from_str::<Maze>("[[1,9]]").is_err());
    }

    #[test]
    fn renders_as_ascii() {
        assert_eq!(sample().to_string(), "#S#\n#.#\n#G#\n");
    }
}
