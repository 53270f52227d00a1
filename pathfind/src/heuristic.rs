use crate::grid::Point;

/// Manhattan distance between two cells.
///
/// Never overestimates the remaining cost on a 4-connected grid with unit moves, which is what
/// makes the first expansion of the goal an optimal one.
pub fn manhattan(a: Point, b: Point) -> usize {
    a.row.abs_diff(b.row) + a.col.abs_diff(b.col)
}
