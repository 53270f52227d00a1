use pathfind::{EditError, Grid, Point};

/// Primary button: the first click places the start, the second the end, everything after that
/// draws barriers.
pub fn paint(grid: &mut Grid, point: Point) -> Result<(), EditError> {
    let is_start = grid.start() == Some(point);
    let is_end = grid.end() == Some(point);
    let is_barrier = grid.contains(point) && grid.cell(point).is_barrier();

    if grid.start().is_none() && !is_end && !is_barrier {
        grid.set_start(point)
    } else if grid.end().is_none() && !is_start && !is_barrier {
        grid.set_end(point)
    } else if !is_start && !is_end {
        grid.set_barrier(point)
    } else {
        Ok(())
    }
}

/// Secondary button: empties the cell, the border stays as it is
pub fn erase(grid: &mut Grid, point: Point) -> Result<(), EditError> {
    grid.clear_cell(point)
}
