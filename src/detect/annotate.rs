//! Detection overlay drawing.
//!
//! Draws class-colored boxes with a small label tag bar onto a copy of the
//! frame. No font rasterizing in this path; the tag bar is sized to the
//! class name so distinct labels remain distinguishable.

use image::{Rgb, RgbImage};

use crate::detect::backend::RawDetection;

const PALETTE: &[Rgb<u8>] = &[
    Rgb([230, 57, 70]),
    Rgb([69, 123, 157]),
    Rgb([42, 157, 143]),
    Rgb([233, 196, 106]),
    Rgb([244, 162, 97]),
    Rgb([38, 70, 83]),
];

const BOX_THICKNESS: u32 = 2;
const TAG_HEIGHT: u32 = 10;
const TAG_CHAR_WIDTH: u32 = 6;

/// Draw every detection onto a new raster. The input frame is not mutated.
pub fn draw_detections(
    frame: &RgbImage,
    detections: &[RawDetection],
    class_names: &[String],
) -> RgbImage {
    let mut out = frame.clone();
    for det in detections {
        let Some(bbox) = clamp_box(det, out.dimensions()) else {
            continue;
        };
        let color = PALETTE[det.class_id % PALETTE.len()];
        draw_rect(&mut out, bbox, color, BOX_THICKNESS);
        let label_len = class_names
            .get(det.class_id)
            .map(|name| name.len() as u32)
            .unwrap_or(1);
        draw_tag(&mut out, bbox, color, label_len * TAG_CHAR_WIDTH);
    }
    out
}

/// Convert a detection box to clamped pixel coordinates; `None` for boxes
/// entirely outside the frame or degenerate after clamping.
fn clamp_box(det: &RawDetection, dims: (u32, u32)) -> Option<[u32; 4]> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min((max - 1) as f32) as u32 };
    let x0 = clamp(det.x1, w);
    let y0 = clamp(det.y1, h);
    let x1 = clamp(det.x2, w);
    let y1 = clamp(det.y2, h);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some([x0, y0, x1, y1])
}

/// Draw a rectangle border with the given thickness.
fn draw_rect(img: &mut RgbImage, bbox: [u32; 4], color: Rgb<u8>, thickness: u32) {
    let [x0, y0, x1, y1] = bbox;
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}

/// Filled tag bar anchored at the box's top-left corner.
fn draw_tag(img: &mut RgbImage, bbox: [u32; 4], color: Rgb<u8>, width: u32) {
    let (img_w, img_h) = img.dimensions();
    let [x0, y0, x1, _] = bbox;
    let tag_y0 = y0.saturating_sub(TAG_HEIGHT);
    let tag_x1 = x0.saturating_add(width).min(x1).min(img_w - 1);
    for y in tag_y0..y0.min(img_h) {
        for x in x0..=tag_x1 {
            img.put_pixel(x, y, color);
        }
    }
}
