//! Annotation of frames with detection boxes.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::detect::result::{DamageClass, Detection, DetectionResult};
use crate::frame::Frame;

const LINE_WIDTH: u32 = 2;
const FONT_PX: f32 = 16.0;
const LABEL_PAD: u32 = 3;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BITMAP_SCALE: u32 = 2;
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// Fonts tried when no font path is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn class_color(class: DamageClass) -> Rgb<u8> {
    match class {
        DamageClass::LongitudinalCrack => Rgb([255, 183, 3]),
        DamageClass::TransverseCrack => Rgb([33, 158, 188]),
        DamageClass::AlligatorCrack => Rgb([138, 201, 38]),
        DamageClass::Pothole => Rgb([230, 57, 70]),
    }
}

/// Draws outlined boxes with a "<label> <score>" tag on a copy of a frame.
///
/// Uses a TrueType font when one is available, otherwise a built-in 5x7
/// bitmap font.
pub struct Renderer {
    font: Option<FontVec>,
}

impl Renderer {
    /// Renderer with the built-in bitmap font only.
    pub fn new() -> Self {
        Self { font: None }
    }

    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(Self { font: Some(font) })
    }

    /// Use `configured` if given, else the first well-known system font that
    /// loads, else the bitmap font.
    pub fn discover(configured: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match configured {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
        };
        for path in candidates {
            if configured.is_none() && !path.exists() {
                continue;
            }
            match Self::with_font_file(&path) {
                Ok(renderer) => {
                    log::debug!("Renderer: using font {}", path.display());
                    return renderer;
                }
                Err(e) => log::warn!("Renderer: {:#}", e),
            }
        }
        log::debug!("Renderer: using built-in bitmap font");
        Self::new()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, result: &DetectionResult<'_>) -> Frame {
        let frame = result.frame();
        let mut canvas = frame.image().clone();
        for detection in result.detections() {
            self.draw_detection(&mut canvas, detection);
        }
        Frame::new(canvas, frame.index())
    }

    fn draw_detection(&self, canvas: &mut RgbImage, detection: &Detection) {
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let color = class_color(detection.class);
        let b = detection.bbox.clamp_to(width as f32, height as f32);
        let x = b.x.round() as i32;
        let y = b.y.round() as i32;
        let w = (b.w.round() as u32).max(1);
        let h = (b.h.round() as u32).max(1);

        for inset in 0..LINE_WIDTH {
            let (iw, ih) = (w.saturating_sub(2 * inset), h.saturating_sub(2 * inset));
            if iw == 0 || ih == 0 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(iw, ih);
            draw_hollow_rect_mut(canvas, rect, color);
        }

        let text = format!("{} {:.2}", detection.class.label(), detection.confidence);
        let (text_w, text_h) = self.text_extent(&text);
        let tag_w = text_w + 2 * LABEL_PAD;
        let tag_h = text_h + 2 * LABEL_PAD;
        // Tag sits above the box, or inside it when the box touches the top edge.
        let tag_y = if y >= tag_h as i32 { y - tag_h as i32 } else { y };
        draw_filled_rect_mut(canvas, Rect::at(x, tag_y).of_size(tag_w, tag_h), color);

        let text_x = x + LABEL_PAD as i32;
        let text_y = tag_y + LABEL_PAD as i32;
        match &self.font {
            Some(font) => {
                draw_text_mut(canvas, TEXT_COLOR, text_x, text_y, PxScale::from(FONT_PX), font, &text)
            }
            None => draw_bitmap_text(canvas, text_x, text_y, &text, TEXT_COLOR),
        }
    }

    fn text_extent(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(PxScale::from(FONT_PX), font, text),
            None => {
                let chars = text.chars().count() as u32;
                let advance = (GLYPH_W + 1) * BITMAP_SCALE;
                (
                    (chars * advance).saturating_sub(BITMAP_SCALE),
                    GLYPH_H * BITMAP_SCALE,
                )
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_bitmap_text(canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let scale = BITMAP_SCALE as i32;
    let mut pen_x = x;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_W as i32 {
                    if (bits >> (GLYPH_W as i32 - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let px = pen_x + col * scale + dx;
                            let py = y + row as i32 * scale + dy;
                            if px >= 0 && px < width && py >= 0 && py < height {
                                canvas.put_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
        pen_x += (GLYPH_W as i32 + 1) * scale;
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        _ => return None,
    };
    Some(rows)
}
