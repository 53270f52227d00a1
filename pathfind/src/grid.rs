use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The role a cell currently plays, either set by the user while editing or by the search
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Empty,
    Barrier,
    Start,
    End,
    Frontier,
    Visited,
    Path,
}

impl Role {
    /// The character used for this role in the text map format
    pub fn symbol(&self) -> char {
        match self {
            Role::Empty => '.',
            Role::Barrier => '#',
            Role::Start => 'S',
            Role::End => 'E',
            Role::Frontier => '+',
            Role::Visited => 'x',
            Role::Path => '*',
        }
    }

    pub fn from_symbol(c: char) -> Option<Role> {
        match c {
            '.' => Some(Role::Empty),
            '#' => Some(Role::Barrier),
            'S' => Some(Role::Start),
            'E' => Some(Role::End),
            '+' => Some(Role::Frontier),
            'x' => Some(Role::Visited),
            '*' => Some(Role::Path),
            _ => None,
        }
    }

    /// Roles written by a search run, as opposed to the ones set while editing
    pub fn is_search_overlay(&self) -> bool {
        matches!(self, Role::Frontier | Role::Visited | Role::Path)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Role::Empty => "empty",
                Role::Barrier => "barrier",
                Role::Start => "start",
                Role::End => "end",
                Role::Frontier => "frontier",
                Role::Visited => "visited",
                Role::Path => "path",
            }
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Parses `row,col`
impl FromStr for Point {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("Invalid point: {}, expected row,col", s))?;
        Ok(Point {
            row: row.trim().parse().context("Invalid row")?,
            col: col.trim().parse().context("Invalid column")?,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Cell {
    point: Point,
    role: Role,
    // only set for the outer ring, which can never be edited
    permanent: bool,
}

impl Cell {
    pub fn point(&self) -> Point {
        self.point
    }

    pub fn row(&self) -> usize {
        self.point.row
    }

    pub fn col(&self) -> usize {
        self.point.col
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_barrier(&self) -> bool {
        self.role == Role::Barrier
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }
}

/// Why an edit of a single cell was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    #[error("cell {0} lies outside the grid")]
    OutOfBounds(Point),

    #[error("cell {0} is part of the permanent border")]
    Permanent(Point),

    #[error("start is already placed at {0}")]
    StartTaken(Point),

    #[error("end is already placed at {0}")]
    EndTaken(Point),

    #[error("cell {point} is occupied by the {role}")]
    Occupied { point: Point, role: Role },
}

/// A square grid of cells, surrounded by a ring of permanent barriers
#[derive(Clone, Debug)]
pub struct Grid {
    rows: usize,
    cell_size: usize,
    cells: Vec<Vec<Cell>>,
    start: Option<Point>,
    end: Option<Point>,
}

impl Grid {
    /// Creates a `rows` x `rows` grid that is drawn `total_width` pixels wide.
    ///
    /// The outermost ring is made of permanent barriers, everything inside starts out empty.
    pub fn new(rows: usize, total_width: usize) -> Self {
        let cells = (0..rows)
            .map(|row| {
                (0..rows)
                    .map(|col| {
                        let border = row == 0 || col == 0 || row == rows - 1 || col == rows - 1;
                        Cell {
                            point: Point { row, col },
                            role: if border { Role::Barrier } else { Role::Empty },
                            permanent: border,
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            rows,
            cell_size: total_width.checked_div(rows).unwrap_or(0),
            cells,
            start: None,
            end: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Side length of one cell in pixels
    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    pub fn contains(&self, point: Point) -> bool {
        point.row < self.rows && point.col < self.rows
    }

    pub fn cell(&self, point: Point) -> &Cell {
        &self.cells[point.row][point.col]
    }

    pub fn role(&self, point: Point) -> Role {
        self.cell(point).role
    }

    /// Iterates over all cells, row by row
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub fn start(&self) -> Option<Point> {
        self.start
    }

    pub fn end(&self) -> Option<Point> {
        self.end
    }

    /// Returns the start and end points once both have been placed
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        self.start.zip(self.end)
    }

    /// Maps a pixel position (relative to the top left corner of the grid) to the cell under it
    pub fn point_at(&self, x: usize, y: usize) -> Option<Point> {
        if self.cell_size == 0 {
            return None;
        }
        let point = Point {
            row: y / self.cell_size,
            col: x / self.cell_size,
        };
        self.contains(point).then_some(point)
    }

    /// Return the traversable neighbors of the provided cell, in the order down, up, left, right
    pub fn neighbors(&self, point: Point) -> impl Iterator<Item = Point> {
        let mut points = Vec::with_capacity(4);

        if point.row < self.rows - 1 {
            points.push(Point {
                row: point.row + 1,
                col: point.col,
            });
        }
        if point.row > 0 {
            points.push(Point {
                row: point.row - 1,
                col: point.col,
            });
        }
        if point.col > 0 {
            points.push(Point {
                row: point.row,
                col: point.col - 1,
            });
        }
        if point.col < self.rows - 1 {
            points.push(Point {
                row: point.row,
                col: point.col + 1,
            });
        }

        // filter to only keep cells that can be walked on
        points.retain(|p| !self.cell(*p).is_barrier());

        points.into_iter()
    }

    fn editable(&self, point: Point) -> Result<&Cell, EditError> {
        if !self.contains(point) {
            return Err(EditError::OutOfBounds(point));
        }
        let cell = self.cell(point);
        if cell.permanent {
            return Err(EditError::Permanent(point));
        }
        Ok(cell)
    }

    pub fn set_start(&mut self, point: Point) -> Result<(), EditError> {
        let cell = self.editable(point)?;
        match self.start {
            Some(start) if start == point => return Ok(()),
            Some(start) => return Err(EditError::StartTaken(start)),
            None => {}
        }
        if matches!(cell.role, Role::Barrier | Role::End) {
            return Err(EditError::Occupied {
                point,
                role: cell.role,
            });
        }

        self.set_role(point, Role::Start);
        self.start = Some(point);
        Ok(())
    }

    pub fn set_end(&mut self, point: Point) -> Result<(), EditError> {
        let cell = self.editable(point)?;
        match self.end {
            Some(end) if end == point => return Ok(()),
            Some(end) => return Err(EditError::EndTaken(end)),
            None => {}
        }
        if matches!(cell.role, Role::Barrier | Role::Start) {
            return Err(EditError::Occupied {
                point,
                role: cell.role,
            });
        }

        self.set_role(point, Role::End);
        self.end = Some(point);
        Ok(())
    }

    pub fn set_barrier(&mut self, point: Point) -> Result<(), EditError> {
        let cell = self.editable(point)?;
        if matches!(cell.role, Role::Start | Role::End) {
            return Err(EditError::Occupied {
                point,
                role: cell.role,
            });
        }

        self.set_role(point, Role::Barrier);
        Ok(())
    }

    /// Resets a cell to empty, releasing the start or end if it was placed there
    pub fn clear_cell(&mut self, point: Point) -> Result<(), EditError> {
        self.editable(point)?;
        if self.start == Some(point) {
            self.start = None;
        }
        if self.end == Some(point) {
            self.end = None;
        }

        self.set_role(point, Role::Empty);
        Ok(())
    }

    /// Removes everything a previous search run painted, keeping barriers and endpoints
    pub fn clear_search(&mut self) {
        for cell in self.cells.iter_mut().flatten() {
            if cell.role.is_search_overlay() {
                cell.role = Role::Empty;
            }
        }
    }

    fn set_role(&mut self, point: Point, role: Role) {
        self.cells[point.row][point.col].role = role;
    }

    /// Puts the start and end roles back once a search is done, recording both as placed
    pub(crate) fn place_endpoints(&mut self, start: Point, end: Point) {
        self.set_role(start, Role::Start);
        self.set_role(end, Role::End);
        self.start = Some(start);
        self.end = Some(end);
    }

    /// Paints a search role onto a cell without ever covering the endpoints or barriers
    pub(crate) fn mark(&mut self, point: Point, role: Role) {
        let cell = &mut self.cells[point.row][point.col];
        if !matches!(cell.role, Role::Start | Role::End | Role::Barrier) {
            cell.role = role;
        }
    }

    /// Create a per-cell storage where every cell starts out as `initial`
    pub fn create_storage<T: Copy>(&self, initial: T) -> CellStorage<T> {
        CellStorage {
            cols: self.rows,
            values: vec![initial; self.rows * self.rows],
        }
    }
}

impl Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            for cell in row {
                write!(f, "{}", cell.role.symbol())?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Parses the text map format, one line per row with a character per cell.
///
/// Cells are drawn one pixel wide. Search roles are read back as empty cells.
impl FromStr for Grid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = s.trim_matches(['\n', '\r']).lines().map(str::trim_end).collect();
        if let Some(blank) = lines.iter().position(|line| line.is_empty()) {
            bail!("Blank line {} inside the map", blank);
        }
        let rows = lines.len();
        if rows < 3 {
            bail!("A map needs at least 3 rows, found {}", rows);
        }

        let mut grid = Grid::new(rows, rows);

        for (row, line) in lines.iter().enumerate() {
            let symbols: Vec<char> = line.chars().collect();
            if symbols.len() != rows {
                bail!(
                    "Row {} has {} cells, expected {} for a square map",
                    row,
                    symbols.len(),
                    rows
                );
            }

            for (col, c) in symbols.into_iter().enumerate() {
                let point = Point { row, col };
                let role = Role::from_symbol(c)
                    .ok_or_else(|| anyhow!("Invalid cell {:?} at {}", c, point))?;

                if grid.cell(point).permanent {
                    if role != Role::Barrier {
                        bail!("Border cell {} must be a barrier, found {:?}", point, c);
                    }
                    continue;
                }

                match role {
                    Role::Barrier => grid.set_barrier(point)?,
                    Role::Start => grid.set_start(point)?,
                    Role::End => grid.set_end(point)?,
                    _ => {}
                }
            }
        }

        Ok(grid)
    }
}

/// A per-cell value store for a grid, row after row in one vec
#[derive(Debug, Clone)]
pub struct CellStorage<T> {
    cols: usize,
    values: Vec<T>,
}

impl<T: Copy> CellStorage<T> {
    fn index(&self, point: Point) -> usize {
        point.row * self.cols + point.col
    }

    pub fn get(&self, point: Point) -> T {
        self.values[self.index(point)]
    }

    pub fn get_mut(&mut self, point: Point) -> &mut T {
        let index = self.index(point);
        &mut self.values[index]
    }
}
