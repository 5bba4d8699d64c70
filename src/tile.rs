//! Frame partitioning into square tiles and the shared tile cursor

use std::sync::Mutex;

use crate::config::Resolution;
use crate::scene::FrameShader;
use crate::{TILE_PIXELS, TILE_SIZE};

/// Tile position in tile units. `row` is the horizontal index, `col` the
/// vertical one; the tile's pixel origin is `(row * TILE_SIZE, col * TILE_SIZE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub row: u32,
    pub col: u32,
}

impl TileCoord {
    pub fn origin(&self) -> (u32, u32) {
        (self.row * TILE_SIZE, self.col * TILE_SIZE)
    }
}

/// A shaded block of `TILE_SIZE x TILE_SIZE` pixels, row-major
#[derive(Debug, Clone)]
pub struct Tile {
    pub coord: TileCoord,
    pub pixels: [u32; TILE_PIXELS],
}

impl Tile {
    pub fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            pixels: [0; TILE_PIXELS],
        }
    }

    /// Shade every pixel of the tile
    pub fn shade(&mut self, shader: &FrameShader) {
        let (x0, y0) = self.coord.origin();
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                self.pixels[(y * TILE_SIZE + x) as usize] = shader.shade_pixel(x0 + x, y0 + y);
            }
        }
    }

    /// Copy into a row-major framebuffer `width` pixels wide
    pub fn copy_into(&self, framebuffer: &mut [u32], width: u32) {
        let (x0, y0) = self.coord.origin();
        let size = TILE_SIZE as usize;
        for (y, src) in self.pixels.chunks_exact(size).enumerate() {
            let start = (y0 as usize + y) * width as usize + x0 as usize;
            framebuffer[start..start + size].copy_from_slice(src);
        }
    }
}

#[derive(Debug)]
struct Cursor {
    current_row: u32,
    current_col: u32,
    row_count: u32,
    col_count: u32,
    finished: bool,
}

/// Hands out every tile of a frame exactly once.
///
/// Rows advance fastest; once the column index runs past the last column the
/// scheduler is finished and stays finished.
#[derive(Debug)]
pub struct TileScheduler {
    cursor: Mutex<Cursor>,
}

impl TileScheduler {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            cursor: Mutex::new(Cursor {
                current_row: 0,
                current_col: 0,
                row_count: resolution.width() / TILE_SIZE,
                col_count: resolution.height() / TILE_SIZE,
                finished: false,
            }),
        }
    }

    /// Next unclaimed tile, or `None` once every tile has been handed out
    pub fn claim_next(&self) -> Option<TileCoord> {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());

        if cursor.finished || cursor.current_col >= cursor.col_count {
            cursor.finished = true;
            return None;
        }

        let coord = TileCoord {
            row: cursor.current_row,
            col: cursor.current_col,
        };

        cursor.current_row += 1;
        if cursor.current_row == cursor.row_count {
            cursor.current_row = 0;
            cursor.current_col += 1;
        }

        Some(coord)
    }

    /// True once a claim has come back empty
    pub fn is_finished(&self) -> bool {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner()).finished
    }

    pub fn tile_count(&self) -> usize {
        let cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        cursor.row_count as usize * cursor.col_count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn claim_all_concurrently(resolution: Resolution, claimants: usize) -> Vec<TileCoord> {
        let scheduler = TileScheduler::new(resolution);
        let claimed: Vec<Vec<TileCoord>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..claimants)
                .map(|_| {
                    s.spawn(|| {
                        let mut mine = Vec::new();
                        while let Some(coord) = scheduler.claim_next() {
                            mine.push(coord);
                        }
                        mine
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(scheduler.is_finished());
        claimed.into_iter().flatten().collect()
    }

    #[test]
    fn test_traversal_order() {
        let scheduler = TileScheduler::new(Resolution::new(12, 8).unwrap());
        let order: Vec<(u32, u32)> = std::iter::from_fn(|| scheduler.claim_next())
            .map(|c| (c.row, c.col))
            .collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_finished_is_sticky() {
        let scheduler = TileScheduler::new(Resolution::new(4, 4).unwrap());
        assert!(!scheduler.is_finished());
        assert_eq!(scheduler.claim_next(), Some(TileCoord { row: 0, col: 0 }));
        assert!(!scheduler.is_finished());
        assert_eq!(scheduler.claim_next(), None);
        assert!(scheduler.is_finished());
        for _ in 0..3 {
            assert_eq!(scheduler.claim_next(), None);
        }
        assert!(scheduler.is_finished());
    }

    #[test]
    fn test_every_tile_exactly_once() {
        for (width, height) in [(4, 4), (64, 32), (36, 100), (512, 512)] {
            let resolution = Resolution::new(width, height).unwrap();
            let expected = (width / TILE_SIZE * (height / TILE_SIZE)) as usize;
            for claimants in [1, 2, 8] {
                let claimed = claim_all_concurrently(resolution, claimants);
                assert_eq!(claimed.len(), expected, "{width}x{height} with {claimants} claimants");
                let unique: HashSet<_> = claimed.iter().collect();
                assert_eq!(unique.len(), expected);
                assert!(claimed
                    .iter()
                    .all(|c| c.row < width / TILE_SIZE && c.col < height / TILE_SIZE));
            }
        }
    }

    #[test]
    fn test_tile_count() {
        let scheduler = TileScheduler::new(Resolution::new(64, 32).unwrap());
        assert_eq!(scheduler.tile_count(), 16 * 8);
    }

    #[test]
    fn test_copy_into_places_pixels() {
        let width = 8u32;
        let mut framebuffer = vec![0u32; 8 * 8];
        let mut tile = Tile::new(TileCoord { row: 1, col: 1 });
        for (i, p) in tile.pixels.iter_mut().enumerate() {
            *p = i as u32 + 1;
        }
        tile.copy_into(&mut framebuffer, width);

        assert_eq!(framebuffer[4 * 8 + 4], 1);
        assert_eq!(framebuffer[4 * 8 + 7], 4);
        assert_eq!(framebuffer[7 * 8 + 7], 16);
        assert_eq!(framebuffer[0], 0);
        assert_eq!(framebuffer.iter().filter(|&&p| p != 0).count(), TILE_PIXELS);
    }
}
