use anyhow::bail;
use image::{DynamicImage, GenericImageView};

use crate::grid::{Grid, Point};

/// Builds a grid from a square image where dark pixels are barriers.
///
/// The outer ring of pixels is ignored, it always becomes the permanent border.
pub fn parse_img(img: &DynamicImage) -> Result<Grid, anyhow::Error> {
    let width = img.width() as usize;
    let height = img.height() as usize;

    if width != height {
        bail!("Map images must be square, got {}x{}", width, height);
    }
    if width < 3 {
        bail!("Map images must be at least 3x3, got {}x{}", width, height);
    }

    let mut grid = Grid::new(height, width);

    for row in 1..height - 1 {
        for col in 1..width - 1 {
            let p = img.get_pixel(col as u32, row as u32);

            if p.0[0] < 128 {
                grid.set_barrier(Point { row, col })?;
            }
        }
    }

    Ok(grid)
}
