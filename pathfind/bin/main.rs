use std::{ops::ControlFlow, path::PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use pathfind::{find_path, util::parse_img, Grid, Point, SearchOutcome};

#[derive(Parser)]
#[command(name = "pathfind")]
#[command(about = "Find the shortest path through a grid map and print the explored grid")]
struct Args {
    /// Map file, either the text format or a square .png
    map: PathBuf,

    /// Start cell as row,col (overrides the S in a text map)
    #[arg(long)]
    start: Option<Point>,

    /// End cell as row,col (overrides the E in a text map)
    #[arg(long)]
    end: Option<Point>,

    /// Print the grid after every step
    #[arg(long)]
    trace: bool,

    /// Cancel the search after this many steps (0 = never)
    #[arg(long, default_value = "0")]
    max_steps: usize,

    /// Print the route as JSON
    #[arg(long)]
    json: bool,
}

fn load_grid(path: &PathBuf) -> Result<Grid, anyhow::Error> {
    let is_image = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));

    if is_image {
        let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        parse_img(&img)
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        text.parse()
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    let mut grid = load_grid(&args.map)?;

    if let Some(start) = args.start {
        if let Some(old) = grid.start() {
            grid.clear_cell(old)?;
        }
        grid.set_start(start)?;
    }
    if let Some(end) = args.end {
        if let Some(old) = grid.end() {
            grid.clear_cell(old)?;
        }
        grid.set_end(end)?;
    }

    let (start, end) = grid
        .endpoints()
        .ok_or_else(|| anyhow!("The map needs both a start and an end cell"))?;

    let mut steps = 0;
    let outcome = find_path(&mut grid, start, end, |grid| {
        steps += 1;
        if args.trace {
            println!("step {}\n{}", steps, grid);
        }
        if args.max_steps > 0 && steps >= args.max_steps {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    println!("{}", grid);

    match outcome {
        SearchOutcome::Found(route) if args.json => {
            println!("{}", serde_json::to_string_pretty(&route)?);
        }
        SearchOutcome::Found(route) => {
            println!(
                "Path found from {} to {}: {} moves after {} steps",
                route.start, route.goal, route.length, steps
            );
        }
        SearchOutcome::NotFound => println!("No path from {} to {}", start, end),
        SearchOutcome::Cancelled => println!("Search cancelled after {} steps", steps),
    }

    Ok(())
}
