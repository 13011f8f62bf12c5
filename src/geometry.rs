//! Pure geometry used by the scene model, the controller and the renderer.
//!
//! Everything here works in canvas coordinates: origin top-left, x right, y down, rotation in
//! degrees (clockwise on screen because y points down).

use crate::foundation::core::{Affine, Canvas, Point, Rect, Size, Vec2};

/// Floor applied to layer width/height after any resize.
pub const MIN_LAYER_SIZE: f64 = 10.0;

/// Distance between the top edge of a selected layer and its rotate handle.
pub const ROTATE_HANDLE_OFFSET: f64 = 24.0;

/// Hit radius for transform handles.
pub const HANDLE_HIT_RADIUS: f64 = 7.0;

/// Axis-aligned rectangle with a rotation about its own center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerFrame {
    /// Top-left of the unrotated rectangle.
    pub origin: Point,
    pub size: Size,
    /// Degrees, unbounded.
    pub rotation: f64,
}

impl LayerFrame {
    pub fn new(origin: Point, size: Size, rotation: f64) -> Self {
        Self {
            origin,
            size,
            rotation,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width * 0.5,
            self.origin.y + self.size.height * 0.5,
        )
    }

    /// Map local rectangle coordinates `(0..w, 0..h)` into canvas space.
    ///
    /// The horizontal mirror is applied before the rotation, both about the center.
    pub fn to_canvas(&self, flip_horizontal: bool) -> Affine {
        let half = Vec2::new(self.size.width * 0.5, self.size.height * 0.5);
        let flip = if flip_horizontal {
            Affine::scale_non_uniform(-1.0, 1.0)
        } else {
            Affine::IDENTITY
        };
        Affine::translate(self.origin.to_vec2() + half)
            * Affine::rotate(self.rotation.to_radians())
            * flip
            * Affine::translate(-half)
    }

    pub fn contains(&self, p: Point) -> bool {
        let local = self.to_canvas(false).inverse() * p;
        local.x >= 0.0
            && local.y >= 0.0
            && local.x <= self.size.width
            && local.y <= self.size.height
    }

    /// Corners in canvas space, clockwise from top-left.
    pub fn corners(&self) -> [Point; 4] {
        let t = self.to_canvas(false);
        let (w, h) = (self.size.width, self.size.height);
        [
            t * Point::new(0.0, 0.0),
            t * Point::new(w, 0.0),
            t * Point::new(w, h),
            t * Point::new(0.0, h),
        ]
    }

    pub fn bounds(&self) -> Rect {
        let c = self.corners();
        let mut r = Rect::from_points(c[0], c[1]);
        r = r.union_pt(c[2]);
        r.union_pt(c[3])
    }

    /// Canvas positions of all transform handles for this frame.
    pub fn handles(&self) -> Vec<(Handle, Point)> {
        let c = self.center();
        let (hw, hh) = (self.size.width * 0.5, self.size.height * 0.5);
        let rot = self.rotation.to_radians();
        let mut out: Vec<(Handle, Point)> = ResizeHandle::ALL
            .iter()
            .map(|&h| {
                let (sx, sy) = h.unit_offset();
                let local = Vec2::new(sx * hw, sy * hh);
                (Handle::Resize(h), c + rotate_vec(local, rot))
            })
            .collect();
        let top = Vec2::new(0.0, -hh - ROTATE_HANDLE_OFFSET);
        out.push((Handle::Rotate, c + rotate_vec(top, rot)));
        out
    }

    /// Topmost handle within [`HANDLE_HIT_RADIUS`] of `p`. The rotate handle wins ties.
    pub fn handle_at(&self, p: Point) -> Option<Handle> {
        self.handles()
            .into_iter()
            .rev()
            .find(|(_, hp)| hp.distance(p) <= HANDLE_HIT_RADIUS)
            .map(|(h, _)| h)
    }
}

/// One of the eight resize anchors on a layer rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    NW,
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        ResizeHandle::NW,
        ResizeHandle::N,
        ResizeHandle::NE,
        ResizeHandle::E,
        ResizeHandle::SE,
        ResizeHandle::S,
        ResizeHandle::SW,
        ResizeHandle::W,
    ];

    fn unit_offset(self) -> (f64, f64) {
        match self {
            ResizeHandle::NW => (-1.0, -1.0),
            ResizeHandle::N => (0.0, -1.0),
            ResizeHandle::NE => (1.0, -1.0),
            ResizeHandle::E => (1.0, 0.0),
            ResizeHandle::SE => (1.0, 1.0),
            ResizeHandle::S => (0.0, 1.0),
            ResizeHandle::SW => (-1.0, 1.0),
            ResizeHandle::W => (-1.0, 0.0),
        }
    }
}

/// A grabbable affordance on the selected layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    Resize(ResizeHandle),
    Rotate,
}

/// Final state of a resize/rotate gesture, ready to be committed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformGesture {
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    /// Top-left that keeps the opposite anchor fixed on screen.
    pub position: Point,
}

impl TransformGesture {
    pub fn identity(frame: &LayerFrame) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: frame.rotation,
            position: frame.origin,
        }
    }

    /// Frame the gesture would produce, with the same size floor as the scene model.
    pub fn apply_to(&self, frame: &LayerFrame) -> LayerFrame {
        let size = resize_dimensions(frame.size, self.scale_x, self.scale_y);
        LayerFrame::new(self.position, size, self.rotation)
    }
}

/// Clamp a top-left position so the rectangle stays inside the canvas.
///
/// A rectangle larger than the canvas on an axis is pinned to 0 on that axis.
pub fn clamp_position(pos: Point, size: Size, canvas: Canvas) -> Point {
    let max_x = (canvas.width_f64() - size.width).max(0.0);
    let max_y = (canvas.height_f64() - size.height).max(0.0);
    Point::new(pos.x.min(max_x).max(0.0), pos.y.min(max_y).max(0.0))
}

/// Scale a size, flooring each dimension at [`MIN_LAYER_SIZE`].
pub fn resize_dimensions(size: Size, scale_x: f64, scale_y: f64) -> Size {
    fn floor(v: f64) -> f64 {
        if v.is_finite() {
            v.max(MIN_LAYER_SIZE)
        } else {
            MIN_LAYER_SIZE
        }
    }
    Size::new(floor(size.width * scale_x), floor(size.height * scale_y))
}

/// Decompose a resize-handle drag into scale factors and a compensating position.
///
/// `delta` is the pointer movement in canvas space since the gesture started. The edge or
/// corner opposite the handle stays where it was.
pub fn resize_gesture(frame: &LayerFrame, handle: ResizeHandle, delta: Vec2) -> TransformGesture {
    let rot = frame.rotation.to_radians();
    let d = rotate_vec(delta, -rot);
    let (hw, hh) = (frame.size.width * 0.5, frame.size.height * 0.5);
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (-hw, -hh, hw, hh);

    let (sx, sy) = handle.unit_offset();
    if sx < 0.0 {
        min_x = (min_x + d.x).min(max_x - MIN_LAYER_SIZE);
    } else if sx > 0.0 {
        max_x = (max_x + d.x).max(min_x + MIN_LAYER_SIZE);
    }
    if sy < 0.0 {
        min_y = (min_y + d.y).min(max_y - MIN_LAYER_SIZE);
    } else if sy > 0.0 {
        max_y = (max_y + d.y).max(min_y + MIN_LAYER_SIZE);
    }

    let (new_w, new_h) = (max_x - min_x, max_y - min_y);
    let local_center = Vec2::new((min_x + max_x) * 0.5, (min_y + max_y) * 0.5);
    let center = frame.center() + rotate_vec(local_center, rot);

    TransformGesture {
        scale_x: new_w / frame.size.width,
        scale_y: new_h / frame.size.height,
        rotation: frame.rotation,
        position: Point::new(center.x - new_w * 0.5, center.y - new_h * 0.5),
    }
}

/// Rotation after dragging the rotate handle from `start` to `pointer`.
pub fn rotate_gesture(frame: &LayerFrame, start: Point, pointer: Point) -> TransformGesture {
    let c = frame.center();
    let a0 = (start.y - c.y).atan2(start.x - c.x).to_degrees();
    let a1 = (pointer.y - c.y).atan2(pointer.x - c.x).to_degrees();
    TransformGesture {
        rotation: frame.rotation + normalize_angle_delta(a1 - a0),
        ..TransformGesture::identity(frame)
    }
}

/// Nonzero-winding point-in-polygon test. The polygon is implicitly closed.
///
/// Fewer than three points never contain anything.
pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut winding = 0i32;
    for (i, a) in poly.iter().enumerate() {
        let b = poly[(i + 1) % poly.len()];
        let cross = (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);
        if a.y <= p.y {
            if b.y > p.y && cross > 0.0 {
                winding += 1;
            }
        } else if b.y <= p.y && cross < 0.0 {
            winding -= 1;
        }
    }
    winding != 0
}

/// Rotation wrapped into `[0, 360)` for display. Stored rotations are never wrapped.
pub fn display_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    if d >= 360.0 { 0.0 } else { d }
}

pub(crate) fn rotate_vec(v: Vec2, radians: f64) -> Vec2 {
    let (s, c) = radians.sin_cos();
    Vec2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

fn normalize_angle_delta(delta: f64) -> f64 {
    let d = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if d == -180.0 { 180.0 } else { d }
}
