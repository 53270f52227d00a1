//! Grid model and a step-by-step A* search that paints its progress onto the grid.

pub mod find;
pub mod grid;
pub mod heuristic;
pub mod util;

pub use find::{find_path, AStar, Route, SearchError, SearchOutcome, SearchState, Step};
pub use grid::{Cell, CellStorage, EditError, Grid, Point, Role};
pub use heuristic::manhattan;
