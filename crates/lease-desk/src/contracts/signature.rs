//! Freehand signature capture, rasterized to a PNG artifact.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::error::ContractError;

/// Canvas size used by the signing pad.
pub const DEFAULT_CANVAS: (u32, u32) = (500, 200);

/// Largest canvas a capture will rasterize; larger requests are clamped.
pub const MAX_CANVAS: (u32, u32) = (DEFAULT_CANVAS.0 * 4, DEFAULT_CANVAS.1 * 4);

/// Upper bound on recorded points accepted from a client-side pad.
pub const MAX_STROKE_POINTS: usize = 10_000;

const INK: Rgba<u8> = Rgba([17, 24, 39, 255]);
const DEFAULT_PEN_WIDTH: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Encoded raster produced by [`SignatureCapture::export_image`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl SignatureImage {
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", B64.encode(&self.png))
    }
}

/// Pointer input collected as an ordered list of strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureCapture {
    width: u32,
    height: u32,
    pen_width: f32,
    strokes: Vec<Vec<StrokePoint>>,
    drawing: bool,
}

impl Default for SignatureCapture {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS.0, DEFAULT_CANVAS.1)
    }
}

impl SignatureCapture {
    /// Dimensions are clamped to `1..=MAX_CANVAS`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.clamp(1, MAX_CANVAS.0),
            height: height.clamp(1, MAX_CANVAS.1),
            pen_width: DEFAULT_PEN_WIDTH,
            strokes: Vec::new(),
            drawing: false,
        }
    }

    /// Rebuild a capture from strokes recorded client-side.
    pub fn from_strokes(width: u32, height: u32, strokes: &[Vec<StrokePoint>]) -> Self {
        let mut capture = Self::new(width, height);
        for stroke in strokes {
            let mut points = stroke.iter().copied();
            if let Some(first) = points.next() {
                capture.begin_stroke(first);
                points.for_each(|point| capture.extend_stroke(point));
                capture.end_stroke();
            }
        }
        capture
    }

    /// A non-finite point starts nothing and ends any stroke in progress.
    pub fn begin_stroke(&mut self, point: StrokePoint) {
        if !point.is_finite() {
            self.drawing = false;
            return;
        }
        self.strokes.push(vec![point]);
        self.drawing = true;
    }

    /// Ignored unless a stroke is in progress. Non-finite points are dropped.
    pub fn extend_stroke(&mut self, point: StrokePoint) {
        if !self.drawing || !point.is_finite() {
            return;
        }
        if let Some(stroke) = self.strokes.last_mut() {
            stroke.push(point);
        }
    }

    pub fn end_stroke(&mut self) {
        self.drawing = false;
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.drawing = false;
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn strokes(&self) -> &[Vec<StrokePoint>] {
        &self.strokes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Rasterize the strokes on a transparent canvas. Strokes are left intact,
    /// so a failed export can simply be retried.
    pub fn export_image(&self) -> Result<SignatureImage, ContractError> {
        let mut canvas = RgbaImage::new(self.width, self.height);
        let radius = self.pen_width / 2.0;

        for stroke in &self.strokes {
            match stroke.as_slice() {
                [] => {}
                [single] => stamp(&mut canvas, *single, radius),
                points => {
                    for pair in points.windows(2) {
                        draw_segment(&mut canvas, pair[0], pair[1], radius);
                    }
                }
            }
        }

        let mut png = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| ContractError::signature(format!("signature encoding failed: {err}")))?;

        Ok(SignatureImage {
            width: self.width,
            height: self.height,
            png,
        })
    }
}

fn draw_segment(canvas: &mut RgbaImage, from: StrokePoint, to: StrokePoint, radius: f32) {
    let (width, height) = canvas.dimensions();
    let Some((from, to)) = clip_segment(from, to, width, height, radius) else {
        return;
    };

    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let max_steps = 2 * (width as usize + height as usize);
    let steps = ((dx.hypot(dy) / 0.5).ceil().max(1.0) as usize).min(max_steps);
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        stamp(
            canvas,
            StrokePoint::new(from.x + dx * t, from.y + dy * t),
            radius,
        );
    }
}

/// Liang-Barsky clip of a segment to the canvas grown by the pen radius.
/// Computed in `f64` so spans between extreme `f32` coordinates stay finite.
fn clip_segment(
    from: StrokePoint,
    to: StrokePoint,
    width: u32,
    height: u32,
    radius: f32,
) -> Option<(StrokePoint, StrokePoint)> {
    let margin = f64::from(radius) + 1.0;
    let (x0, y0) = (f64::from(from.x), f64::from(from.y));
    let (dx, dy) = (f64::from(to.x) - x0, f64::from(to.y) - y0);
    let (min_x, min_y) = (-margin, -margin);
    let (max_x, max_y) = (f64::from(width) + margin, f64::from(height) + margin);

    let mut enter = 0.0_f64;
    let mut exit = 1.0_f64;
    for (p, q) in [
        (-dx, x0 - min_x),
        (dx, max_x - x0),
        (-dy, y0 - min_y),
        (dy, max_y - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let ratio = q / p;
        if p < 0.0 {
            if ratio > exit {
                return None;
            }
            enter = enter.max(ratio);
        } else {
            if ratio < enter {
                return None;
            }
            exit = exit.min(ratio);
        }
    }

    let at = |t: f64| StrokePoint::new((x0 + dx * t) as f32, (y0 + dy * t) as f32);
    Some((at(enter), at(exit)))
}

fn stamp(canvas: &mut RgbaImage, center: StrokePoint, radius: f32) {
    let (width, height) = canvas.dimensions();
    let min_x = (center.x - radius).floor().max(0.0) as u32;
    let min_y = (center.y - radius).floor().max(0.0) as u32;
    let max_x = (center.x + radius).ceil().min(width as f32 - 1.0);
    let max_y = (center.y + radius).ceil().min(height as f32 - 1.0);
    if max_x < 0.0 || max_y < 0.0 {
        return;
    }

    for y in min_y..=max_y as u32 {
        for x in min_x..=max_x as u32 {
            let px = x as f32 + 0.5 - center.x;
            let py = y as f32 + 0.5 - center.y;
            if px * px + py * py <= radius * radius + 0.25 {
                canvas.put_pixel(x, y, INK);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(image: &SignatureImage) -> RgbaImage {
        image::load_from_memory_with_format(&image.png, ImageFormat::Png)
            .expect("valid png")
            .to_rgba8()
    }

    fn inked_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|pixel| pixel.0[3] > 0).count()
    }

    #[test]
    fn blank_export_is_valid() {
        let capture = SignatureCapture::default();
        let image = capture.export_image().expect("blank export works");
        let decoded = decode(&image);
        assert_eq!(decoded.dimensions(), DEFAULT_CANVAS);
        assert_eq!(inked_pixels(&decoded), 0);
        assert!(image.data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn strokes_leave_ink() {
        let mut capture = SignatureCapture::new(100, 40);
        capture.begin_stroke(StrokePoint::new(10.0, 20.0));
        capture.extend_stroke(StrokePoint::new(90.0, 20.0));
        capture.end_stroke();

        let decoded = decode(&capture.export_image().expect("exports"));
        assert!(inked_pixels(&decoded) >= 80);
        assert!(decoded.get_pixel(50, 20).0[3] > 0);
        assert_eq!(decoded.get_pixel(50, 2).0[3], 0);
    }

    #[test]
    fn extend_without_active_stroke_is_ignored() {
        let mut capture = SignatureCapture::default();
        capture.extend_stroke(StrokePoint::new(1.0, 1.0));
        assert!(capture.is_empty());

        capture.begin_stroke(StrokePoint::new(1.0, 1.0));
        capture.end_stroke();
        capture.extend_stroke(StrokePoint::new(5.0, 5.0));
        assert_eq!(capture.strokes()[0].len(), 1);
    }

    #[test]
    fn clear_discards_all_strokes() {
        let mut capture = SignatureCapture::from_strokes(
            100,
            40,
            &[
                vec![StrokePoint::new(1.0, 1.0), StrokePoint::new(4.0, 4.0)],
                vec![StrokePoint::new(8.0, 8.0)],
                Vec::new(),
            ],
        );
        assert_eq!(capture.stroke_count(), 2);
        capture.clear();
        assert!(capture.is_empty());
    }

    #[test]
    fn out_of_bounds_points_are_clipped() {
        let capture = SignatureCapture::from_strokes(
            20,
            20,
            &[vec![StrokePoint::new(-30.0, -30.0), StrokePoint::new(60.0, 60.0)]],
        );
        let decoded = decode(&capture.export_image().expect("exports"));
        assert!(decoded.get_pixel(10, 10).0[3] > 0);
    }

    #[test]
    fn extreme_coordinates_render_only_the_visible_span() {
        let capture = SignatureCapture::from_strokes(
            500,
            200,
            &[
                vec![StrokePoint::new(0.0, 100.0), StrokePoint::new(3e38, 100.0)],
                vec![StrokePoint::new(-3e38, -3e38), StrokePoint::new(3e38, 3e38)],
                vec![StrokePoint::new(1e30, 1e30), StrokePoint::new(2e30, 1e30)],
            ],
        );
        let decoded = decode(&capture.export_image().expect("exports promptly"));
        assert!(decoded.get_pixel(250, 100).0[3] > 0);
        assert!(decoded.get_pixel(499, 100).0[3] > 0);
        assert_eq!(decoded.get_pixel(450, 10).0[3], 0);
    }

    #[test]
    fn non_finite_points_are_dropped() {
        let mut capture = SignatureCapture::default();
        capture.begin_stroke(StrokePoint::new(f32::NAN, 1.0));
        capture.extend_stroke(StrokePoint::new(4.0, 4.0));
        assert!(capture.is_empty());

        capture.begin_stroke(StrokePoint::new(1.0, 1.0));
        capture.extend_stroke(StrokePoint::new(f32::INFINITY, 4.0));
        capture.extend_stroke(StrokePoint::new(6.0, 6.0));
        assert_eq!(
            capture.strokes()[0],
            vec![StrokePoint::new(1.0, 1.0), StrokePoint::new(6.0, 6.0)]
        );
        capture.export_image().expect("exports");
    }

    #[test]
    fn oversized_canvas_is_clamped() {
        let capture = SignatureCapture::new(u32::MAX, u32::MAX);
        assert_eq!(capture.dimensions(), MAX_CANVAS);
        let image = capture.export_image().expect("bounded allocation");
        assert_eq!((image.width, image.height), MAX_CANVAS);
        assert_eq!(SignatureCapture::new(0, 0).dimensions(), (1, 1));
    }
}
