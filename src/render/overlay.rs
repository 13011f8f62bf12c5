use kurbo::{Circle, Shape};

use crate::foundation::core::{BezPath, Point, Vec2};
use crate::geometry::{Handle, LayerFrame, ResizeHandle, rotate_vec};
use crate::mask::{MaskEngine, MaskMode};
use crate::scene::{LayerId, Scene};

const OUTLINE_WIDTH: f64 = 2.0;
const HANDLE_HALF: f64 = 4.0;
const ROTATE_KNOB_RADIUS: f64 = 5.0;
const POLYGON_DOT_RADIUS: f64 = 3.0;
const CURSOR_RING_WIDTH: f64 = 1.5;
const TOLERANCE: f64 = 0.1;

const SELECTION_RGBA: [u8; 4] = [59, 130, 246, 255];
const BRUSH_PREVIEW_RGBA: [u8; 4] = [255, 64, 64, 90];
const CURSOR_RGBA: [u8; 4] = [255, 255, 255, 220];
const POLYGON_RGBA: [u8; 4] = [16, 185, 129, 255];

/// Transient authoring affordances. Never part of an export.
#[derive(Clone, Debug)]
pub struct OverlayState {
    pub visible: bool,
    pub selection: Option<LayerId>,
    /// Last pointer position in canvas coordinates while brush mode is active.
    pub brush_cursor: Option<Point>,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self {
            visible: true,
            selection: None,
            brush_cursor: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverlayStyle {
    Fill,
    /// Stroke of this width in canvas pixels.
    Stroke(f64),
}

/// One overlay shape in canvas coordinates, straight-alpha color.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayShape {
    pub path: BezPath,
    pub rgba: [u8; 4],
    pub style: OverlayStyle,
}

impl OverlayShape {
    fn fill(path: BezPath, rgba: [u8; 4]) -> Self {
        Self {
            path,
            rgba,
            style: OverlayStyle::Fill,
        }
    }

    fn stroke(path: BezPath, rgba: [u8; 4], width: f64) -> Self {
        Self {
            path,
            rgba,
            style: OverlayStyle::Stroke(width),
        }
    }
}

pub(crate) fn overlay_shapes(
    scene: &Scene,
    mask: &MaskEngine,
    state: &OverlayState,
    preview: Option<&(LayerId, LayerFrame)>,
) -> Vec<OverlayShape> {
    let mut out = Vec::new();
    if !state.visible {
        return out;
    }

    if let Some(id) = &state.selection {
        let frame = match preview {
            Some((pid, frame)) if pid == id => Some(*frame),
            _ => scene.layer(id).map(|l| l.frame()),
        };
        if let Some(frame) = frame {
            selection_shapes(&frame, &mut out);
        }
    }

    match mask.mode() {
        MaskMode::None => {}
        MaskMode::Brush => {
            if !mask.brush().is_empty() {
                out.push(OverlayShape::fill(mask.brush().coverage(), BRUSH_PREVIEW_RGBA));
            }
            if let Some(c) = state.brush_cursor {
                // Ring sits just inside the brush footprint.
                let r = (mask.brush_size() - CURSOR_RING_WIDTH) / 2.0;
                if r > 0.0 {
                    out.push(OverlayShape::stroke(
                        Circle::new(c, r).to_path(TOLERANCE),
                        CURSOR_RGBA,
                        CURSOR_RING_WIDTH,
                    ));
                }
            }
        }
        MaskMode::Polygon => {
            let pts = mask.polygon_points();
            if pts.len() >= 2 {
                let mut line = BezPath::new();
                line.move_to(pts[0]);
                for &p in &pts[1..] {
                    line.line_to(p);
                }
                out.push(OverlayShape::stroke(line, POLYGON_RGBA, OUTLINE_WIDTH));
            }
            for &p in pts {
                out.push(OverlayShape::fill(
                    Circle::new(p, POLYGON_DOT_RADIUS).to_path(TOLERANCE),
                    POLYGON_RGBA,
                ));
            }
        }
    }
    out
}

fn selection_shapes(frame: &LayerFrame, out: &mut Vec<OverlayShape>) {
    let corners = frame.corners();
    let mut outline = BezPath::new();
    outline.move_to(corners[0]);
    for &c in &corners[1..] {
        outline.line_to(c);
    }
    outline.close_path();
    out.push(OverlayShape::stroke(outline, SELECTION_RGBA, OUTLINE_WIDTH));

    let rad = frame.rotation.to_radians();
    let handles = frame.handles();
    let top_mid = handles.iter().find_map(|(h, p)| match h {
        Handle::Resize(ResizeHandle::N) => Some(*p),
        _ => None,
    });
    for (handle, p) in handles {
        match handle {
            Handle::Resize(_) => {
                let mut sq = BezPath::new();
                let offs = [
                    Vec2::new(-HANDLE_HALF, -HANDLE_HALF),
                    Vec2::new(HANDLE_HALF, -HANDLE_HALF),
                    Vec2::new(HANDLE_HALF, HANDLE_HALF),
                    Vec2::new(-HANDLE_HALF, HANDLE_HALF),
                ];
                sq.move_to(p + rotate_vec(offs[0], rad));
                for o in &offs[1..] {
                    sq.line_to(p + rotate_vec(*o, rad));
                }
                sq.close_path();
                out.push(OverlayShape::fill(sq, SELECTION_RGBA));
            }
            Handle::Rotate => {
                if let Some(t) = top_mid {
                    let mut stem = BezPath::new();
                    stem.move_to(t);
                    stem.line_to(p);
                    out.push(OverlayShape::stroke(stem, SELECTION_RGBA, OUTLINE_WIDTH / 2.0));
                }
                out.push(OverlayShape::fill(
                    Circle::new(p, ROTATE_KNOB_RADIUS).to_path(TOLERANCE),
                    SELECTION_RGBA,
                ));
            }
        }
    }
}
