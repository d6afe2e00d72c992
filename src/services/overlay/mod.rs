// Overlay services
// Burns wrapped text onto resized news images

use image::imageops::FilterType;
use image::{DynamicImage, Pixel, Rgba, RgbaImage, RgbImage};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{BackingConfig, OverlayConfig, OverlayLayout};
use crate::errors::AppResult;
use crate::models::FrameSize;

pub mod typeface;

pub use typeface::{FontdueTypeface, Glyph, Typeface, VerticalMetrics};

/// Одна строка текста с вертикальной позицией базовой линии
#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    width: u32,
    baseline: i32,
}

/// Вертикальные границы блока текста
#[derive(Debug, Clone, Copy, PartialEq)]
struct BlockBounds {
    top: i32,
    bottom: i32,
}

pub struct OverlayRenderer {
    typeface: Arc<dyn Typeface>,
    font_size: f32,
    max_width_ratio: f32,
    margin: u32,
    text_color: [u8; 4],
    backing: Option<BackingConfig>,
    layout: OverlayLayout,
}

impl OverlayRenderer {
    pub fn new(config: &OverlayConfig, typeface: Arc<dyn Typeface>) -> Self {
        Self {
            typeface,
            font_size: config.font_size,
            max_width_ratio: config.max_width_ratio,
            margin: config.margin,
            text_color: config.text_color,
            backing: config.backing.clone(),
            layout: config.layout,
        }
    }

    /// Open `image_path`, fit it to `size` and draw `text` at the bottom
    pub fn render(&self, image_path: &Path, text: &str, size: FrameSize) -> AppResult<RgbImage> {
        let base = image::open(image_path)?;
        Ok(self.compose(&base, text, size))
    }

    /// Render and save as `<stem>_with_text.png` in `out_dir`
    pub fn render_to_file(
        &self,
        image_path: &Path,
        text: &str,
        size: FrameSize,
        out_dir: &Path,
    ) -> AppResult<PathBuf> {
        let frame = self.render(image_path, text, size)?;
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());
        std::fs::create_dir_all(out_dir)?;
        let out = out_dir.join(format!("{}_with_text.png", stem));
        frame.save(&out)?;
        debug!("Frame written to {}", out.display());
        Ok(out)
    }

    pub fn compose(&self, base: &DynamicImage, text: &str, size: FrameSize) -> RgbImage {
        let mut canvas: RgbaImage = base
            .resize_exact(size.width, size.height, FilterType::Lanczos3)
            .to_rgba8();

        let max_width = (size.width as f32 * self.max_width_ratio).max(1.0);
        let lines = self.wrap(text, max_width);
        if lines.is_empty() {
            return DynamicImage::ImageRgba8(canvas).to_rgb8();
        }

        let (placed, bounds) = match self.layout {
            OverlayLayout::Block => self.layout_block(&lines, size),
            OverlayLayout::GlyphBounds => self.layout_glyph_bounds(&lines, size),
        };

        if let Some(backing) = &self.backing {
            let widest = placed.iter().map(|l| l.width).max().unwrap_or(0) as i32;
            let pad = backing.padding as i32;
            let left = (size.width as i32 - widest) / 2 - pad;
            fill_rect(
                &mut canvas,
                left,
                bounds.top - pad,
                left + widest + 2 * pad,
                bounds.bottom + pad,
                Rgba(backing.color),
            );
        }

        for line in &placed {
            let x = (size.width as i32 - line.width as i32) / 2;
            self.draw_line(&mut canvas, &line.text, x, line.baseline);
        }

        DynamicImage::ImageRgba8(canvas).to_rgb8()
    }

    /// Жадный перенос по ширине в пикселях. Явные `\n` сохраняются,
    /// слово длиннее строки остаётся целым
    fn wrap(&self, text: &str, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if !current.is_empty() && self.measure(&candidate) as f32 > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            if !current.is_empty() {
                lines.push(current);
            }
        }
        lines
    }

    fn measure(&self, text: &str) -> u32 {
        self.typeface.text_width(text, self.font_size).ceil().max(0.0) as u32
    }

    /// Блок высотой lines × line_height над нижним отступом
    fn layout_block(&self, lines: &[String], size: FrameSize) -> (Vec<PlacedLine>, BlockBounds) {
        let metrics = self.typeface.vertical_metrics(self.font_size);
        let line_height = metrics.line_height() as i32;
        let block = line_height * lines.len() as i32;
        let top = (size.height as i32 - block - self.margin as i32).max(0);
        let ascent = metrics.ascent.round() as i32;

        let placed = lines
            .iter()
            .enumerate()
            .map(|(i, text)| PlacedLine {
                text: text.clone(),
                width: self.measure(text),
                baseline: top + i as i32 * line_height + ascent,
            })
            .collect();
        (
            placed,
            BlockBounds {
                top,
                bottom: top + block,
            },
        )
    }

    /// Каждая строка по реальным границам глифов, строки укладываются снизу вверх
    fn layout_glyph_bounds(&self, lines: &[String], size: FrameSize) -> (Vec<PlacedLine>, BlockBounds) {
        let spacing = (self.font_size * 0.2).round() as i32;
        // (над базовой линией, под базовой линией) для каждой строки
        let extents: Vec<(i32, i32)> = lines
            .iter()
            .map(|line| {
                let mut above = 0;
                let mut below = 0;
                for ch in line.chars() {
                    let glyph = self.typeface.rasterize(ch, self.font_size);
                    if glyph.height == 0 {
                        continue;
                    }
                    above = above.max(glyph.ymin + glyph.height as i32);
                    below = below.max(-glyph.ymin);
                }
                (above, below)
            })
            .collect();

        let bottom = size.height as i32 - self.margin as i32;
        let mut cursor = bottom;
        let mut placed = Vec::with_capacity(lines.len());
        for (text, (above, below)) in lines.iter().zip(&extents).rev() {
            let baseline = cursor - below;
            placed.push(PlacedLine {
                text: text.clone(),
                width: self.measure(text),
                baseline,
            });
            cursor = baseline - above - spacing;
        }
        placed.reverse();

        let top = (cursor + spacing).max(0);
        (placed, BlockBounds { top, bottom })
    }

    fn draw_line(&self, canvas: &mut RgbaImage, text: &str, x: i32, baseline: i32) {
        let mut pen = x as f32;
        for ch in text.chars() {
            let glyph = self.typeface.rasterize(ch, self.font_size);
            let gx = pen.round() as i32 + glyph.xmin;
            let gy = baseline - glyph.ymin - glyph.height as i32;
            blend_glyph(canvas, gx, gy, &glyph, self.text_color);
            pen += glyph.advance;
        }
    }
}

fn fill_rect(canvas: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            canvas.get_pixel_mut(x as u32, y as u32).blend(&color);
        }
    }
}

fn blend_glyph(canvas: &mut RgbaImage, x: i32, y: i32, glyph: &Glyph, color: [u8; 4]) {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    for row in 0..glyph.height {
        let py = y + row as i32;
        if py < 0 || py >= h {
            continue;
        }
        for col in 0..glyph.width {
            let px = x + col as i32;
            if px < 0 || px >= w {
                continue;
            }
            let coverage = glyph.coverage[row * glyph.width + col];
            if coverage == 0 {
                continue;
            }
            let alpha = (coverage as u16 * color[3] as u16 / 255) as u8;
            canvas
                .get_pixel_mut(px as u32, py as u32)
                .blend(&Rgba([color[0], color[1], color[2], alpha]));
        }
    }
}
