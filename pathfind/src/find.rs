use std::{cmp::Ordering, collections::BinaryHeap, ops::ControlFlow};

use log::{debug, trace};
use serde::Serialize;
use thiserror::Error;

use crate::grid::{CellStorage, Grid, Point, Role};
use crate::heuristic::manhattan;

/// Score of a cell the search has not reached yet
pub const UNREACHABLE: usize = usize::MAX;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    #[error("invalid endpoints: {point} {reason}")]
    InvalidEndpoints { point: Point, reason: &'static str },
}

/// The objects that we store in the priority queue
#[derive(Debug, Eq, PartialEq)]
struct ToVisit {
    f_score: usize,
    // insertion counter, earlier entries win ties
    order: usize,
    point: Point,
}

impl Ord for ToVisit {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.f_score, self.order)
            .cmp(&(other.f_score, other.order))
            .reverse() // reverse for BinaryHeap to be a min-heap
    }
}

impl PartialOrd for ToVisit {
    fn partial_cmp(&self, other: &ToVisit) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, PartialEq, Clone, Eq, Serialize)]
pub struct Route {
    /// Every cell from start to goal, both included
    pub path: Vec<Point>,
    pub start: Point,
    pub goal: Point,
    /// Number of moves, one less than the number of cells
    pub length: usize,
}

impl Route {
    /// The cells strictly between start and goal
    pub fn intermediate(&self) -> &[Point] {
        if self.path.len() < 2 {
            return &[];
        }
        &self.path[1..self.path.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Route),
    NotFound,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Searching,
    /// The goal was reached, the path is painted one cell at a time
    Tracing { route: Route, remaining: Vec<Point> },
    Done(SearchOutcome),
}

impl SearchState {
    pub fn is_done(&self) -> bool {
        matches!(self, SearchState::Done(_))
    }
}

/// What a single call to [`AStar::step`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Expanded(Point),
    Traced(Point),
    Finished,
}

/// A resumable A* search over a [`Grid`].
///
/// Every call to [`AStar::step`] performs one unit of visible progress so a renderer can redraw
/// the grid in between. The search state is owned here, the grid only receives role updates.
#[derive(Debug)]
pub struct AStar {
    start: Point,
    goal: Point,
    g_score: CellStorage<usize>,
    f_score: CellStorage<usize>,
    predecessor: CellStorage<Option<Point>>,
    in_frontier: CellStorage<bool>,
    frontier: BinaryHeap<ToVisit>,
    inserted: usize,
    // expanded during the previous step, becomes visited once the observer has seen it
    closing: Option<Point>,
    state: SearchState,
}

impl AStar {
    pub fn new(grid: &Grid, start: Point, goal: Point) -> Result<Self, SearchError> {
        for point in [start, goal] {
            if !grid.contains(point) {
                return Err(SearchError::InvalidEndpoints {
                    point,
                    reason: "lies outside the grid",
                });
            }
            if grid.cell(point).is_barrier() {
                return Err(SearchError::InvalidEndpoints {
                    point,
                    reason: "is a barrier",
                });
            }
        }
        if grid.start().is_some_and(|placed| placed != start) {
            return Err(SearchError::InvalidEndpoints {
                point: start,
                reason: "differs from the start placed on the grid",
            });
        }
        if grid.end().is_some_and(|placed| placed != goal) {
            return Err(SearchError::InvalidEndpoints {
                point: goal,
                reason: "differs from the end placed on the grid",
            });
        }

        let mut search = Self {
            start,
            goal,
            g_score: grid.create_storage(UNREACHABLE),
            f_score: grid.create_storage(UNREACHABLE),
            predecessor: grid.create_storage(None),
            in_frontier: grid.create_storage(false),
            frontier: BinaryHeap::new(),
            inserted: 0,
            closing: None,
            state: SearchState::Searching,
        };

        if start == goal {
            debug!("start and goal are both {}, nothing to search", start);
            search.state = SearchState::Done(SearchOutcome::Found(Route {
                path: vec![start],
                start,
                goal,
                length: 0,
            }));
            return Ok(search);
        }

        *search.g_score.get_mut(start) = 0;
        *search.f_score.get_mut(start) = manhattan(start, goal);
        search.push(start);
        *search.in_frontier.get_mut(start) = true;

        debug!("searching from {} to {}", start, goal);
        Ok(search)
    }

    fn push(&mut self, point: Point) {
        self.frontier.push(ToVisit {
            f_score: self.f_score.get(point),
            order: self.inserted,
            point,
        });
        self.inserted += 1;
    }

    /// Advance the search by one expansion or one painted path cell
    pub fn step(&mut self, grid: &mut Grid) -> Step {
        match std::mem::replace(&mut self.state, SearchState::Searching) {
            SearchState::Searching => self.expand(grid),
            SearchState::Tracing { route, remaining } => self.trace(grid, route, remaining),
            done @ SearchState::Done(_) => {
                self.state = done;
                Step::Finished
            }
        }
    }

    /// Run the search to the end without pausing
    pub fn finish(&mut self, grid: &mut Grid) -> SearchOutcome {
        loop {
            if let SearchState::Done(outcome) = &self.state {
                return outcome.clone();
            }
            self.step(grid);
        }
    }

    /// Abort the search, any further step reports it as finished
    pub fn cancel(&mut self, grid: &mut Grid) {
        self.close_pending(grid);
        if !self.state.is_done() {
            debug!("search from {} to {} cancelled", self.start, self.goal);
            self.state = SearchState::Done(SearchOutcome::Cancelled);
        }
    }

    fn close_pending(&mut self, grid: &mut Grid) {
        if let Some(point) = self.closing.take().filter(|p| *p != self.start) {
            grid.mark(point, Role::Visited);
        }
    }

    fn expand(&mut self, grid: &mut Grid) -> Step {
        self.close_pending(grid);

        let Some(ToVisit { point: current, .. }) = self.frontier.pop() else {
            debug!("no path from {} to {}", self.start, self.goal);
            self.state = SearchState::Done(SearchOutcome::NotFound);
            return Step::Finished;
        };
        *self.in_frontier.get_mut(current) = false;

        if current == self.goal {
            return self.reached_goal(grid);
        }

        trace!("expanding {}", current);
        let tentative = self.g_score.get(current) + 1;
        for neighbor in grid.neighbors(current) {
            if tentative < self.g_score.get(neighbor) {
                *self.predecessor.get_mut(neighbor) = Some(current);
                *self.g_score.get_mut(neighbor) = tentative;
                *self.f_score.get_mut(neighbor) = tentative + manhattan(neighbor, self.goal);

                // a queued cell keeps its place, only its scores change
                if !self.in_frontier.get(neighbor) {
                    self.push(neighbor);
                    *self.in_frontier.get_mut(neighbor) = true;
                    grid.mark(neighbor, Role::Frontier);
                }
            }
        }

        self.closing = Some(current);
        Step::Expanded(current)
    }

    fn reached_goal(&mut self, grid: &mut Grid) -> Step {
        // backtrack to find the total shortest path
        let mut path = vec![self.goal];
        let mut current = self.goal;
        while let Some(from) = self.predecessor.get(current) {
            path.push(from);
            current = from;
        }
        if current != self.start {
            panic!(
                "Backtracking from {} ended at {} instead of the start {}",
                self.goal, current, self.start
            );
        }
        path.reverse();

        let route = Route {
            length: path.len() - 1,
            path,
            start: self.start,
            goal: self.goal,
        };
        debug!("found path from {} to {}: {} moves", self.start, self.goal, route.length);

        // painted from the goal backwards, so the cell next to the goal goes first
        let remaining = route.intermediate().to_vec();
        self.trace(grid, route, remaining)
    }

    fn trace(&mut self, grid: &mut Grid, route: Route, mut remaining: Vec<Point>) -> Step {
        match remaining.pop() {
            Some(point) => {
                grid.mark(point, Role::Path);
                if remaining.is_empty() {
                    self.complete(grid, route);
                } else {
                    self.state = SearchState::Tracing { route, remaining };
                }
                Step::Traced(point)
            }
            None => {
                self.complete(grid, route);
                Step::Finished
            }
        }
    }

    fn complete(&mut self, grid: &mut Grid, route: Route) {
        grid.place_endpoints(self.start, self.goal);
        self.state = SearchState::Done(SearchOutcome::Found(route));
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn goal(&self) -> Point {
        self.goal
    }

    /// Best known cost from the start, `None` while unreached
    pub fn g_score(&self, point: Point) -> Option<usize> {
        Some(self.g_score.get(point)).filter(|g| *g != UNREACHABLE)
    }

    pub fn f_score(&self, point: Point) -> Option<usize> {
        Some(self.f_score.get(point)).filter(|f| *f != UNREACHABLE)
    }

    pub fn predecessor(&self, point: Point) -> Option<Point> {
        self.predecessor.get(point)
    }

    /// Number of cells currently waiting in the frontier
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }
}

/// Find the shortest path from `start` to `end`, calling `on_step` after every expansion and
/// every painted path cell.
///
/// Returning [`ControlFlow::Break`] from `on_step` aborts the search with
/// [`SearchOutcome::Cancelled`]. Cell roles in `grid` reflect the search when this returns.
pub fn find_path<F>(
    grid: &mut Grid,
    start: Point,
    end: Point,
    mut on_step: F,
) -> Result<SearchOutcome, SearchError>
where
    F: FnMut(&Grid) -> ControlFlow<()>,
{
    let mut search = AStar::new(grid, start, end)?;
    loop {
        match search.step(grid) {
            Step::Finished => break,
            Step::Expanded(_) | Step::Traced(_) => {
                if on_step(grid).is_break() {
                    search.cancel(grid);
                }
            }
        }
    }

    Ok(search.finish(grid))
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::grid::EditError;

    fn open_grid() -> Grid {
        Grid::new(5, 5)
    }

    fn run(grid: &mut Grid, start: Point, end: Point) -> (SearchOutcome, usize) {
        let mut steps = 0;
        let outcome = find_path(grid, start, end, |_| {
            steps += 1;
            ControlFlow::Continue(())
        })
        .unwrap();
        (outcome, steps)
    }

    #[test]
    fn test_basic_route() {
        let mut grid = open_grid();
        let start = Point::new(1, 1);
        let end = Point::new(3, 3);
        grid.set_start(start).unwrap();
        grid.set_end(end).unwrap();

        let (outcome, steps) = run(&mut grid, start, end);

        let SearchOutcome::Found(route) = outcome else {
            panic!("expected a path, got {:?}", outcome);
        };
        assert_eq!(route.length, 4);
        assert_eq!(
            route.path,
            vec![
                Point::new(1, 1),
                Point::new(2, 1),
                Point::new(3, 1),
                Point::new(3, 2),
                Point::new(3, 3)
            ]
        );
        // eight expansions and three painted path cells
        assert_eq!(steps, 11);
        assert_eq!(grid.to_string(), "#####\n#Sxx#\n#*xx#\n#**E#\n#####\n");
    }

    #[test]
    fn test_basic_no_route() {
        let mut grid = open_grid();
        for row in 1..=3 {
            grid.set_barrier(Point::new(row, 2)).unwrap();
        }
        let start = Point::new(1, 1);
        let end = Point::new(3, 3);
        grid.set_start(start).unwrap();
        grid.set_end(end).unwrap();

        let (outcome, steps) = run(&mut grid, start, end);

        assert_eq!(outcome, SearchOutcome::NotFound);
        assert_eq!(steps, 3);
        assert_eq!(grid.to_string(), "#####\n#S#.#\n#x#.#\n#x#E#\n#####\n");
    }

    #[test]
    fn test_adjacent_endpoints() {
        let mut grid = open_grid();
        let start = Point::new(1, 1);
        let end = Point::new(1, 2);
        grid.set_start(start).unwrap();
        grid.set_end(end).unwrap();

        let (outcome, _) = run(&mut grid, start, end);

        let SearchOutcome::Found(route) = outcome else {
            panic!("expected a path, got {:?}", outcome);
        };
        assert_eq!(route.length, 1);
        assert!(route.intermediate().is_empty());
        assert!(grid.cells().all(|c| c.role() != Role::Path));
        assert_eq!(grid.role(start), Role::Start);
        assert_eq!(grid.role(end), Role::End);
    }

    #[test]
    fn test_start_is_goal() {
        let mut grid = open_grid();
        let point = Point::new(2, 2);

        let (outcome, steps) = run(&mut grid, point, point);

        assert_eq!(steps, 0);
        assert_eq!(
            outcome,
            SearchOutcome::Found(Route {
                path: vec![point],
                start: point,
                goal: point,
                length: 0,
            })
        );
        assert!(grid.cells().all(|c| !c.role().is_search_overlay()));
    }

    #[test]
    fn test_invalid_endpoints() {
        let mut grid = open_grid();
        grid.set_barrier(Point::new(2, 2)).unwrap();

        for (start, end) in [
            (Point::new(0, 0), Point::new(1, 1)),
            (Point::new(1, 1), Point::new(2, 2)),
            (Point::new(1, 1), Point::new(9, 1)),
        ] {
            let result = find_path(&mut grid, start, end, |_| ControlFlow::Continue(()));
            assert!(
                matches!(result, Err(SearchError::InvalidEndpoints { .. })),
                "{} -> {}: {:?}",
                start,
                end,
                result
            );
        }
    }

    #[test]
    fn test_cancel_from_callback() {
        let mut grid = Grid::new(12, 12);
        let start = Point::new(1, 1);
        let end = Point::new(10, 10);

        let mut calls = 0;
        let outcome = find_path(&mut grid, start, end, |_| {
            calls += 1;
            if calls == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

        assert_eq!(outcome, SearchOutcome::Cancelled);
        assert_eq!(calls, 3);
        assert!(grid.cells().all(|c| c.role() != Role::Path));
        assert!(grid.cells().any(|c| c.role() == Role::Frontier));
    }

    #[test]
    fn test_callback_sees_cell_before_it_is_visited() {
        let mut grid = open_grid();
        let start = Point::new(1, 1);
        let end = Point::new(3, 3);
        grid.set_start(start).unwrap();
        grid.set_end(end).unwrap();
        let mut search = AStar::new(&grid, start, end).unwrap();

        assert_eq!(search.step(&mut grid), Step::Expanded(start));
        assert_eq!(search.step(&mut grid), Step::Expanded(Point::new(2, 1)));
        // still shown as part of the frontier until the next step
        assert_eq!(grid.role(Point::new(2, 1)), Role::Frontier);
        assert_eq!(search.step(&mut grid), Step::Expanded(Point::new(1, 2)));
        assert_eq!(grid.role(Point::new(2, 1)), Role::Visited);
        assert_eq!(grid.role(start), Role::Start);

        assert_eq!(search.g_score(Point::new(2, 1)), Some(1));
        assert_eq!(search.f_score(Point::new(2, 1)), Some(4));
        assert_eq!(search.predecessor(Point::new(2, 1)), Some(start));
        assert_eq!(search.g_score(end), None);
        assert_eq!(search.frontier_len(), 3);
    }

    #[test]
    fn test_step_after_done() {
        let mut grid = open_grid();
        let start = Point::new(1, 1);
        let end = Point::new(3, 3);
        let mut search = AStar::new(&grid, start, end).unwrap();

        let outcome = search.finish(&mut grid);
        assert!(matches!(outcome, SearchOutcome::Found(Route { length: 4, .. })));
        assert!(search.state().is_done());
        assert_eq!(search.step(&mut grid), Step::Finished);

        // cancelling a finished search keeps its outcome
        search.cancel(&mut grid);
        assert_eq!(search.state(), &SearchState::Done(outcome));
    }

    #[test]
    fn test_tracing_runs_backwards_from_goal() {
        let mut grid = open_grid();
        let start = Point::new(1, 1);
        let end = Point::new(3, 3);
        let mut search = AStar::new(&grid, start, end).unwrap();

        let mut traced = Vec::new();
        loop {
            match search.step(&mut grid) {
                Step::Finished => break,
                Step::Traced(point) => traced.push(point),
                Step::Expanded(_) => {}
            }
        }
        assert_eq!(
            traced,
            vec![Point::new(3, 2), Point::new(3, 1), Point::new(2, 1)]
        );
        // the search does not require the endpoints to be placed on the grid beforehand
        assert_eq!(grid.role(start), Role::Start);
        assert_eq!(grid.role(end), Role::End);
        assert_eq!(grid.endpoints(), Some((start, end)));
    }

    #[test]
    fn test_painted_endpoints_stay_unique() {
        let mut grid = open_grid();
        let start = Point::new(1, 1);
        let end = Point::new(3, 3);
        run(&mut grid, start, end);

        let other = Point::new(2, 2);
        assert_eq!(grid.set_start(other), Err(EditError::StartTaken(start)));
        assert_eq!(grid.set_end(other), Err(EditError::EndTaken(end)));
        assert_eq!(grid.cells().filter(|c| c.role() == Role::Start).count(), 1);
        assert_eq!(grid.cells().filter(|c| c.role() == Role::End).count(), 1);
    }

    #[test]
    fn test_endpoints_must_match_grid() {
        let mut grid = open_grid();
        grid.set_start(Point::new(1, 1)).unwrap();
        grid.set_end(Point::new(3, 3)).unwrap();

        for (start, end) in [
            (Point::new(2, 2), Point::new(3, 3)),
            (Point::new(1, 1), Point::new(2, 2)),
            (Point::new(3, 3), Point::new(1, 1)),
        ] {
            let result = AStar::new(&grid, start, end);
            assert!(
                matches!(result, Err(SearchError::InvalidEndpoints { .. })),
                "{} -> {}: {:?}",
                start,
                end,
                result
            );
        }
        assert!(AStar::new(&grid, Point::new(1, 1), Point::new(3, 3)).is_ok());
    }

    #[test]
    fn test_improved_frontier_cell_keeps_its_place() {
        // (3,1) is queued from (3,2) at g = 5, then reached from (2,1) at g = 3 while still queued
        let mut grid: Grid = "\
#######
#.S.#.#
#.#...#
#.....#
#..#..#
#..E.##
#######
"
        .parse()
        .unwrap();
        let (start, end) = grid.endpoints().unwrap();
        let mut search = AStar::new(&grid, start, end).unwrap();

        let mut expanded = Vec::new();
        while let Step::Expanded(point) = search.step(&mut grid) {
            expanded.push(point);
        }
        let expected: Vec<Point> = [
            (1, 2),
            (1, 3),
            (2, 3),
            (3, 3),
            (1, 1),
            (2, 4),
            (3, 2),
            (3, 4),
            (2, 1),
            (4, 2),
            (4, 4),
            (5, 2),
            (5, 4),
        ]
        .into_iter()
        .map(|(row, col)| Point::new(row, col))
        .collect();
        assert_eq!(expanded, expected);

        let SearchOutcome::Found(route) = search.finish(&mut grid) else {
            panic!("expected a path");
        };
        assert_eq!(route.length, 7);
        // its old priority kept it queued until the goal came up
        assert_eq!(grid.role(Point::new(3, 1)), Role::Frontier);
    }
}
