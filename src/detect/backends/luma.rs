use anyhow::Result;
use image::GrayImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, DetectionResult};

const DEFAULT_THRESHOLD: u8 = 200;
const DEFAULT_CELL_SIZE: u32 = 8;
const DEFAULT_MIN_CELLS: usize = 4;

/// CPU backend that finds bright blobs.
///
/// The frame is divided into square cells; a cell is lit when its mean luma
/// reaches the threshold. Each 4-connected group of lit cells becomes one
/// candidate. Pairs with the synthetic capture, which renders subjects as
/// bright squares on a dark background.
pub struct LumaBlobBackend {
    threshold: u8,
    cell_size: u32,
    min_cells: usize,
}

impl LumaBlobBackend {
    pub fn new() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cell_size: DEFAULT_CELL_SIZE,
            min_cells: DEFAULT_MIN_CELLS,
        }
    }

    fn lit_cells(&self, image: &GrayImage) -> (Vec<bool>, usize, usize) {
        let (width, height) = image.dimensions();
        let cols = width.div_ceil(self.cell_size) as usize;
        let rows = height.div_ceil(self.cell_size) as usize;
        let raw = image.as_raw();
        let mut lit = vec![false; cols * rows];

        for row in 0..rows {
            for col in 0..cols {
                let x0 = col as u32 * self.cell_size;
                let y0 = row as u32 * self.cell_size;
                let x1 = (x0 + self.cell_size).min(width);
                let y1 = (y0 + self.cell_size).min(height);
                let mut sum = 0u64;
                let mut n = 0u64;
                for y in y0..y1 {
                    let start = (y * width + x0) as usize;
                    let end = (y * width + x1) as usize;
                    for &p in &raw[start..end] {
                        sum += p as u64;
                        n += 1;
                    }
                }
                if n > 0 && sum / n >= self.threshold as u64 {
                    lit[row * cols + col] = true;
                }
            }
        }
        (lit, cols, rows)
    }
}

impl Default for LumaBlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for LumaBlobBackend {
    fn name(&self) -> &'static str {
        "luma"
    }

    fn detect(&mut self, image: &GrayImage) -> Result<DetectionResult> {
        let (width, height) = image.dimensions();
        let (mut lit, cols, rows) = self.lit_cells(image);
        let mut boxes = Vec::new();
        let mut stack = Vec::new();

        for start in 0..lit.len() {
            if !lit[start] {
                continue;
            }
            lit[start] = false;
            stack.push(start);
            let (mut min_c, mut min_r, mut max_c, mut max_r) =
                (usize::MAX, usize::MAX, 0usize, 0usize);
            let mut cells = 0usize;

            while let Some(idx) = stack.pop() {
                let (r, c) = (idx / cols, idx % cols);
                cells += 1;
                min_c = min_c.min(c);
                min_r = min_r.min(r);
                max_c = max_c.max(c);
                max_r = max_r.max(r);

                if c > 0 && lit[idx - 1] {
                    lit[idx - 1] = false;
                    stack.push(idx - 1);
                }
                if c + 1 < cols && lit[idx + 1] {
                    lit[idx + 1] = false;
                    stack.push(idx + 1);
                }
                if r > 0 && lit[idx - cols] {
                    lit[idx - cols] = false;
                    stack.push(idx - cols);
                }
                if r + 1 < rows && lit[idx + cols] {
                    lit[idx + cols] = false;
                    stack.push(idx + cols);
                }
            }

            if cells < self.min_cells {
                continue;
            }
            let cell = self.cell_size;
            let x0 = min_c as u32 * cell;
            let y0 = min_r as u32 * cell;
            let x1 = ((max_c as u32 + 1) * cell).min(width);
            let y1 = ((max_r as u32 + 1) * cell).min(height);
            boxes.push(BoundingBox::new(
                x0 as f32,
                y0 as f32,
                (x1 - x0) as f32,
                (y1 - y0) as f32,
            ));
        }

        Ok(DetectionResult::new(boxes))
    }
}
