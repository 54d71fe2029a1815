//! Software rasterizer: executes paint commands onto an RGBA canvas

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

use crate::config::Color;
use crate::rendering::layout::{CHAR_WIDTH, LINE_HEIGHT};
use crate::rendering::paint::PaintCommand;
use crate::{Error, Result};

/// Largest canvas edge, in device pixels, that can be allocated
pub const MAX_CANVAS_DIMENSION: u32 = 16_384;

const DASH: u32 = 6;
const GAP: u32 = 4;

/// A device-pixel canvas addressed in CSS pixels scaled by `scale`
pub struct Canvas {
    pixels: RgbaImage,
    scale: f32,
}

impl Canvas {
    /// Allocate a canvas for a `width`×`height` CSS pixel box
    pub fn new(width: u32, height: u32, scale: f32) -> Result<Self> {
        let dw = device_len(width, scale);
        let dh = device_len(height, scale);
        if dw > MAX_CANVAS_DIMENSION || dh > MAX_CANVAS_DIMENSION {
            return Err(Error::RenderError(format!(
                "canvas of {}x{} exceeds the maximum of {}px per side",
                dw, dh, MAX_CANVAS_DIMENSION
            )));
        }
        Ok(Self {
            pixels: RgbaImage::new(dw.max(1), dh.max(1)),
            scale,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    fn to_device(&self, v: i32) -> i64 {
        (v as f64 * self.scale as f64).round() as i64
    }

    /// Fill a rect given in CSS pixels
    fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Color) {
        let x0 = self.to_device(x);
        let y0 = self.to_device(y);
        let x1 = self.to_device(x.saturating_add_unsigned(width));
        let y1 = self.to_device(y.saturating_add_unsigned(height));
        self.fill_device_rect(x0, y0, x1, y1, color.to_rgba());
    }

    fn fill_device_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
        let (w, h) = (self.pixels.width() as i64, self.pixels.height() as i64);
        let (x0, x1) = (x0.clamp(0, w), x1.clamp(0, w));
        let (y0, y1) = (y0.clamp(0, h), y1.clamp(0, h));
        for py in y0..y1 {
            for px in x0..x1 {
                let dst = self.pixels.get_pixel_mut(px as u32, py as u32);
                if color[3] == 255 {
                    *dst = color;
                } else {
                    dst.blend(&color);
                }
            }
        }
    }

    fn dashed_border(&mut self, x: i32, y: i32, width: u32, height: u32, thickness: u32, color: Color) {
        let t = thickness.min(width / 2).min(height / 2) as i32;
        let (w, h) = (width as i32, height as i32);
        let step = (DASH + GAP) as i32;

        let mut offset = 0;
        while offset < w {
            let len = (DASH as i32).min(w - offset) as u32;
            self.fill_rect(x + offset, y, len, t as u32, color);
            self.fill_rect(x + offset, y + h - t, len, t as u32, color);
            offset += step;
        }
        let mut offset = 0;
        while offset < h {
            let len = (DASH as i32).min(h - offset) as u32;
            self.fill_rect(x, y + offset, t as u32, len, color);
            self.fill_rect(x + w - t, y + offset, t as u32, len, color);
            offset += step;
        }
    }

    /// Block glyphs: every visible character is a solid cell inset by 1px
    fn text(&mut self, x: i32, y: i32, lines: &[String], scale: u32, color: Color) {
        let s = scale as i32;
        let cell = (CHAR_WIDTH * scale) as i32;
        let line_h = (LINE_HEIGHT * scale) as i32;
        for (row, line) in lines.iter().enumerate() {
            let top = y + row as i32 * line_h + s;
            for (col, ch) in line.chars().enumerate() {
                if ch.is_whitespace() {
                    continue;
                }
                let left = x + col as i32 * cell + s;
                self.fill_rect(left, top, (6 * s) as u32, (7 * s) as u32, color);
            }
        }
    }

    fn image(&mut self, x: i32, y: i32, width: u32, height: u32, source: &RgbaImage) {
        let dx = self.to_device(x);
        let dy = self.to_device(y);
        let dw = (self.to_device(x.saturating_add_unsigned(width)) - dx).max(1) as u32;
        let dh = (self.to_device(y.saturating_add_unsigned(height)) - dy).max(1) as u32;
        let scaled = if source.dimensions() == (dw, dh) {
            source.clone()
        } else {
            imageops::resize(source, dw, dh, FilterType::Triangle)
        };
        imageops::overlay(&mut self.pixels, &scaled, dx, dy);
    }

    /// Execute one command; `images` holds the loaded images of the capture
    pub fn execute(&mut self, cmd: &PaintCommand, images: &[RgbaImage]) {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, color } => {
                self.fill_rect(*x, *y, *width, *height, *color)
            }
            PaintCommand::DashedBorder { x, y, width, height, thickness, color } => {
                self.dashed_border(*x, *y, *width, *height, *thickness, *color)
            }
            PaintCommand::Text { x, y, lines, scale, color } => self.text(*x, *y, lines, *scale, *color),
            PaintCommand::Image { x, y, width, height, index } => {
                if let Some(source) = images.get(*index) {
                    self.image(*x, *y, *width, *height, source);
                }
            }
        }
    }
}

fn device_len(css: u32, scale: f32) -> u32 {
    (css as f64 * scale as f64).round().min(u32::MAX as f64) as u32
}

/// Execute `commands` on a fresh canvas and return its pixels
pub fn rasterize_commands(
    width: u32,
    height: u32,
    scale: f32,
    commands: &[PaintCommand],
    images: &[RgbaImage],
) -> Result<RgbaImage> {
    let mut canvas = Canvas::new(width, height, scale)?;
    for cmd in commands {
        canvas.execute(cmd, images);
    }
    Ok(canvas.into_image())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_is_scaled() {
        let c = Canvas::new(640, 100, 2.0).unwrap();
        assert_eq!((c.width(), c.height()), (1280, 200));
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        assert!(matches!(Canvas::new(640, 10_000, 2.0), Err(Error::RenderError(_))));
    }

    #[test]
    fn solid_rect_and_text_are_drawn() {
        let cmds = vec![
            PaintCommand::SolidRect { x: 0, y: 0, width: 64, height: 32, color: Color::WHITE },
            PaintCommand::Text { x: 0, y: 0, lines: vec!["A".into()], scale: 1, color: Color::BLACK },
        ];
        let img = rasterize_commands(64, 32, 1.0, &cmds, &[]).unwrap();
        assert_eq!(img.get_pixel(3, 3), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(40, 20), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn dashed_border_leaves_gaps() {
        let cmds = vec![
            PaintCommand::SolidRect { x: 0, y: 0, width: 40, height: 40, color: Color::WHITE },
            PaintCommand::DashedBorder { x: 0, y: 0, width: 40, height: 40, thickness: 2, color: Color::BLACK },
        ];
        let img = rasterize_commands(40, 40, 1.0, &cmds, &[]).unwrap();
        assert_eq!(img.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
        // x = 7 falls in the first gap (dash 0..6, gap 6..10)
        assert_eq!(img.get_pixel(7, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(20, 20), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn far_off_canvas_rects_are_clipped() {
        let cmds = vec![PaintCommand::SolidRect {
            x: 0,
            y: i32::MAX - 10,
            width: 20,
            height: u32::MAX,
            color: Color::BLACK,
        }];
        let img = rasterize_commands(20, 20, 1.0, &cmds, &[]).unwrap();
        assert_eq!(img.get_pixel(5, 5)[3], 0);
    }

    #[test]
    fn images_are_stretched_into_their_rect() {
        let red = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let cmds = vec![PaintCommand::Image { x: 10, y: 10, width: 20, height: 20, index: 0 }];
        let img = rasterize_commands(40, 40, 2.0, &cmds, &[red]).unwrap();
        assert_eq!(img.get_pixel(40, 40), &Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(5, 5)[3], 0);
    }
}
