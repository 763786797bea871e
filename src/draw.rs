//! Software renderer into an RGBA8 framebuffer: flat rectangles and a 5x7 bitmap font.

use crate::judge::Rect;
use crate::session::{BirdSprite, Scene};

pub type Rgba = [u8; 4];

const SKY: Rgba = [112, 197, 206, 255];
const GROUND_LINE: Rgba = [222, 216, 149, 255];
const PIPE: Rgba = [92, 178, 62, 255];
const PIPE_RIM: Rgba = [44, 96, 30, 255];
const BIRD_FALLING: Rgba = [240, 200, 40, 255];
const BIRD_RISING: Rgba = [250, 150, 40, 255];
const PANEL: Rgba = [0, 0, 0, 140];
const TEXT: Rgba = [235, 235, 235, 255];
const BANNER: Rgba = [255, 90, 90, 255];
const BAR: Rgba = [120, 180, 255, 160];

/// Blending canvas over a `width * height * 4` byte frame. Everything is clipped to the frame,
/// so callers may pass shapes that hang off any edge.
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self { frame, width, height }
    }

    pub fn clear(&mut self, color: Rgba) {
        for px in self.frame.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    pub fn blend(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let idx = ((y as usize) * self.width as usize + x as usize) * 4;
        let Some(px) = self.frame.get_mut(idx..idx + 4) else {
            return;
        };
        let a = u16::from(color[3]);
        for (dst, src) in px.iter_mut().zip(color).take(3) {
            *dst = ((u16::from(src) * a + u16::from(*dst) * (255 - a)) / 255) as u8;
        }
        px[3] = 255;
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(i64::from(self.width));
        let y1 = (y + h).min(i64::from(self.height));
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color);
            }
        }
    }

    pub fn stroke_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba) {
        if w <= 0 || h <= 0 {
            return;
        }
        self.fill_rect(x, y, w, 1, color);
        self.fill_rect(x, y + h - 1, w, 1, color);
        self.fill_rect(x, y, 1, h, color);
        self.fill_rect(x + w - 1, y, 1, h, color);
    }

    /// Fills a world rectangle, rounding to whole pixels.
    pub fn fill_world(&mut self, rect: Rect, color: Rgba) {
        self.fill_rect(
            rect.x.round() as i64,
            rect.y.round() as i64,
            rect.w.round() as i64,
            rect.h.round() as i64,
            color,
        );
    }

    /// Draws one character and returns the horizontal advance. Unknown characters are blank.
    pub fn glyph(&mut self, ch: char, x: i64, y: i64, scale: i64, color: Rgba) -> i64 {
        if let Some(rows) = glyph_rows(ch) {
            for (ry, row) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if (row >> (4 - rx)) & 1 == 1 {
                        self.fill_rect(x + rx * scale, y + ry as i64 * scale, scale, scale, color);
                    }
                }
            }
        }
        6 * scale
    }

    pub fn text(&mut self, text: &str, x: i64, y: i64, scale: i64, color: Rgba) {
        let mut cx = x;
        for ch in text.chars() {
            cx += self.glyph(ch, cx, y, scale, color);
        }
    }

    /// Bar chart of the most recent values that fit in `w`.
    pub fn chart(&mut self, x: i64, y: i64, w: i64, h: i64, data: &[u32]) {
        self.stroke_rect(x, y, w, h, [200, 200, 200, 120]);
        let max = data.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return;
        }
        let bars = data.len().min((w / 6).max(1) as usize);
        let bar_w = (w / bars as i64).max(2);
        for (i, &v) in data[data.len() - bars..].iter().enumerate() {
            let bh = i64::from(v) * (h - 2) / i64::from(max);
            let bx = x + 1 + i as i64 * bar_w;
            self.fill_rect(bx, y + h - 1 - bh, bar_w - 1, bh, BAR);
        }
    }
}

fn glyph_rows(ch: char) -> Option<[u8; 7]> {
    const LETTERS: [[u8; 7]; 26] = [
        [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        [0b11110, 0b10001, 0b11110, 0b10001, 0b10001, 0b10001, 0b11110],
        [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110],
        [0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001, 0b10001],
        [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b11111],
        [0b00111, 0b00010, 0b00010, 0b00010, 0b10010, 0b10010, 0b01100],
        [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
    ];
    const DIGITS: [[u8; 7]; 10] = [
        [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
    ];
    let c = ch.to_ascii_uppercase();
    match c {
        'A'..='Z' => Some(LETTERS[(c as u8 - b'A') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        ':' => Some([0, 0b00100, 0, 0, 0b00100, 0, 0]),
        '.' => Some([0, 0, 0, 0, 0, 0b01100, 0b01100]),
        '/' => Some([0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        '+' => Some([0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0]),
        _ => None,
    }
}

fn draw_bird(canvas: &mut Canvas<'_>, bird: &BirdSprite) {
    let body = if bird.rising { BIRD_RISING } else { BIRD_FALLING };
    let b = bird.bounds;
    canvas.fill_world(b, [body[0], body[1], body[2], bird.alpha]);
    // eye near the front, wing lifted or dropped with the velocity
    let eye = Rect::new(b.right() - 12.0, b.y + 6.0, 6.0, 6.0);
    canvas.fill_world(eye, [20, 20, 20, bird.alpha]);
    let wing_y = if bird.rising { b.y + 4.0 } else { b.bottom() - 12.0 };
    canvas.fill_world(Rect::new(b.x + 6.0, wing_y, 14.0, 8.0), [255, 255, 255, bird.alpha]);
}

/// Draws `scene` into an RGBA8 `frame` of `width * height` pixels.
pub fn render_frame(frame: &mut [u8], width: u32, height: u32, scene: &Scene) {
    let mut canvas = Canvas::new(frame, width, height);
    canvas.clear(SKY);

    for pair in &scene.pipes {
        for r in [pair.top(), pair.bottom()] {
            canvas.fill_world(r, PIPE);
            canvas.stroke_rect(
                r.x.round() as i64,
                r.y.round() as i64,
                r.w.round() as i64,
                r.h.round() as i64,
                PIPE_RIM,
            );
        }
    }
    canvas.fill_rect(0, i64::from(height) - 2, i64::from(width), 2, GROUND_LINE);

    for bird in &scene.birds {
        draw_bird(&mut canvas, bird);
    }

    let lines = scene.hud.len() as i64;
    let chart_h = if scene.chart.is_empty() { 0 } else { 60 };
    canvas.fill_rect(8, 8, 260, 16 + lines * 22 + chart_h, PANEL);
    for (i, line) in scene.hud.iter().enumerate() {
        canvas.text(line, 16, 16 + i as i64 * 22, 2, TEXT);
    }
    if chart_h > 0 {
        canvas.chart(16, 12 + lines * 22, 244, chart_h - 8, &scene.chart);
    }

    if let Some(banner) = &scene.banner {
        let w = banner.chars().count() as i64 * 18;
        let x = (i64::from(width) - w) / 2;
        let y = i64::from(height) / 2 - 10;
        canvas.fill_rect(x - 12, y - 12, w + 24, 45, PANEL);
        canvas.text(banner, x, y, 3, BANNER);
    }
}
