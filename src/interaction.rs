//! Interaction controller: pointer events in, scene/mask mutations and host notifications out.
//!
//! The controller never draws. It reports what changed through [`Action`]s and exposes the
//! transient state (selection, gesture preview, brush cursor) the render surface should show.

use crate::foundation::core::{Canvas, Point, Vec2};
use crate::geometry::{Handle, LayerFrame, TransformGesture, resize_gesture, rotate_gesture};
use crate::mask::{MaskEngine, MaskMode};
use crate::scene::{LayerId, Scene};

/// Effects of one pointer event, in the order they should be applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Adopt this scene as the current one.
    ReplaceScene(Scene),
    /// A layer drag or transform finished with changes; report the layer list.
    ItemsCommitted,
    /// A background drag finished with changes.
    BackgroundCommitted,
    LayerClicked(LayerId),
    SelectionCleared,
    PolygonPointsChanged(Vec<Point>),
    Redraw,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputState {
    Idle,
    DraggingLayer {
        id: LayerId,
        grab: Vec2,
        moved: bool,
    },
    DraggingBackground {
        grab: Vec2,
        moved: bool,
    },
    Transforming {
        id: LayerId,
        handle: Handle,
        start: LayerFrame,
        start_pointer: Point,
        gesture: TransformGesture,
    },
    Painting,
}

#[derive(Clone, Debug)]
pub struct Controller {
    canvas: Canvas,
    origin: Point,
    state: InputState,
    selection: Option<LayerId>,
    brush_cursor: Option<Point>,
}

impl Controller {
    /// `origin` is the canvas origin in surface coordinates.
    pub fn new(canvas: Canvas, origin: Point) -> Self {
        Self {
            canvas,
            origin,
            state: InputState::Idle,
            selection: None,
            brush_cursor: None,
        }
    }

    pub fn state(&self) -> &InputState {
        &self.state
    }

    pub fn selection(&self) -> Option<&LayerId> {
        self.selection.as_ref()
    }

    pub fn brush_cursor(&self) -> Option<Point> {
        self.brush_cursor
    }

    /// Frame the transforming layer would have if the gesture ended now.
    pub fn preview(&self) -> Option<(LayerId, LayerFrame)> {
        match &self.state {
            InputState::Transforming {
                id, start, gesture, ..
            } => Some((id.clone(), gesture.apply_to(start))),
            _ => None,
        }
    }

    pub fn select(&mut self, id: Option<LayerId>) {
        self.selection = id;
    }

    /// Drop a selection or gesture whose layer is gone from `scene`.
    pub fn reconcile(&mut self, scene: &Scene) -> Vec<Action> {
        let mut out = Vec::new();
        let gesture_target = match &self.state {
            InputState::DraggingLayer { id, .. } | InputState::Transforming { id, .. } => {
                Some(id.clone())
            }
            _ => None,
        };
        if let Some(id) = gesture_target
            && scene.layer(&id).is_none()
        {
            self.state = InputState::Idle;
        }
        if matches!(self.state, InputState::DraggingBackground { .. }) && scene.background.is_none()
        {
            self.state = InputState::Idle;
        }
        if let Some(sel) = &self.selection
            && scene.layer(sel).is_none()
        {
            self.selection = None;
            out.push(Action::SelectionCleared);
            out.push(Action::Redraw);
        }
        out
    }

    /// Abandon any gesture without committing it. Painting strokes are closed.
    pub fn cancel(&mut self, mask: &mut MaskEngine) {
        if matches!(self.state, InputState::Painting) {
            mask.end_stroke();
        }
        self.state = InputState::Idle;
    }

    fn to_canvas(&self, surface_pt: Point) -> Point {
        surface_pt - self.origin.to_vec2()
    }

    pub fn on_pointer_down(
        &mut self,
        scene: &Scene,
        mask: &mut MaskEngine,
        surface_pt: Point,
    ) -> Vec<Action> {
        if self.state != InputState::Idle {
            return Vec::new();
        }
        let p = self.to_canvas(surface_pt);

        match mask.mode() {
            MaskMode::Brush => {
                if self.canvas.contains(p) && mask.begin_stroke(p) {
                    self.state = InputState::Painting;
                    self.brush_cursor = Some(p);
                    return vec![Action::Redraw];
                }
                return Vec::new();
            }
            MaskMode::Polygon => {
                if self.canvas.contains(p) && mask.push_polygon_point(p) {
                    return vec![
                        Action::PolygonPointsChanged(mask.polygon_points().to_vec()),
                        Action::Redraw,
                    ];
                }
                return Vec::new();
            }
            MaskMode::None => {}
        }

        if let Some(sel) = &self.selection
            && let Some(layer) = scene.layer(sel)
        {
            let frame = layer.frame();
            if let Some(handle) = frame.handle_at(p) {
                self.state = InputState::Transforming {
                    id: sel.clone(),
                    handle,
                    start: frame,
                    start_pointer: p,
                    gesture: TransformGesture::identity(&frame),
                };
                return vec![Action::Redraw];
            }
        }

        if let Some(layer) = scene.topmost_layer_at(p) {
            self.selection = Some(layer.id.clone());
            self.state = InputState::DraggingLayer {
                id: layer.id.clone(),
                grab: p - layer.position,
                moved: false,
            };
            return vec![Action::LayerClicked(layer.id.clone()), Action::Redraw];
        }

        let mut out = Vec::new();
        if self.selection.take().is_some() {
            out.push(Action::SelectionCleared);
            out.push(Action::Redraw);
        }
        if let Some(bg) = &scene.background
            && bg.frame().contains(p)
        {
            self.state = InputState::DraggingBackground {
                grab: p - bg.position,
                moved: false,
            };
        }
        out
    }

    pub fn on_pointer_move(
        &mut self,
        scene: &Scene,
        mask: &mut MaskEngine,
        surface_pt: Point,
    ) -> Vec<Action> {
        let p = self.to_canvas(surface_pt);
        let canvas = self.canvas;
        match &mut self.state {
            InputState::Idle => {
                if mask.mode() == MaskMode::Brush {
                    self.brush_cursor = canvas.contains(p).then_some(p);
                    return vec![Action::Redraw];
                }
                Vec::new()
            }
            InputState::Painting => {
                self.brush_cursor = Some(p);
                mask.extend_stroke(p);
                vec![Action::Redraw]
            }
            InputState::DraggingLayer { id, grab, moved } => {
                let target = p - *grab;
                let next = scene.move_layer(id, target.x, target.y, canvas);
                if next == *scene {
                    return Vec::new();
                }
                *moved = true;
                vec![Action::ReplaceScene(next), Action::Redraw]
            }
            InputState::DraggingBackground { grab, moved } => {
                let target = p - *grab;
                let next = scene.move_background(target.x, target.y);
                if next == *scene {
                    return Vec::new();
                }
                *moved = true;
                vec![Action::ReplaceScene(next), Action::Redraw]
            }
            InputState::Transforming {
                handle,
                start,
                start_pointer,
                gesture,
                ..
            } => {
                *gesture = match *handle {
                    Handle::Resize(h) => resize_gesture(start, h, p - *start_pointer),
                    Handle::Rotate => rotate_gesture(start, *start_pointer, p),
                };
                vec![Action::Redraw]
            }
        }
    }

    pub fn on_pointer_up(
        &mut self,
        scene: &Scene,
        mask: &mut MaskEngine,
        surface_pt: Point,
    ) -> Vec<Action> {
        let mut out = self.on_pointer_move(scene, mask, surface_pt);
        let latest = out
            .iter()
            .rev()
            .find_map(|a| match a {
                Action::ReplaceScene(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_else(|| scene.clone());
        out.extend(self.finish(&latest, mask));
        out
    }

    /// Pointer left the surface: finish the active gesture as it stands.
    pub fn on_pointer_leave(&mut self, scene: &Scene, mask: &mut MaskEngine) -> Vec<Action> {
        let had_cursor = self.brush_cursor.take().is_some();
        let mut out = self.finish(scene, mask);
        if had_cursor && !out.contains(&Action::Redraw) {
            out.push(Action::Redraw);
        }
        out
    }

    fn finish(&mut self, scene: &Scene, mask: &mut MaskEngine) -> Vec<Action> {
        match std::mem::replace(&mut self.state, InputState::Idle) {
            InputState::Idle => Vec::new(),
            InputState::Painting => {
                mask.end_stroke();
                vec![Action::Redraw]
            }
            InputState::DraggingLayer { moved, .. } => {
                if moved {
                    vec![Action::ItemsCommitted]
                } else {
                    Vec::new()
                }
            }
            InputState::DraggingBackground { moved, .. } => {
                if moved {
                    vec![Action::BackgroundCommitted]
                } else {
                    Vec::new()
                }
            }
            InputState::Transforming {
                id, start, gesture, ..
            } => {
                let mut out = Vec::new();
                if gesture != TransformGesture::identity(&start) {
                    let next = scene
                        .resize_layer(&id, gesture.scale_x, gesture.scale_y, gesture.rotation)
                        .position_layer(&id, gesture.position);
                    tracing::debug!(
                        id = %id,
                        scale_x = gesture.scale_x,
                        scale_y = gesture.scale_y,
                        rotation = gesture.rotation,
                        "transform committed"
                    );
                    if next != *scene {
                        out.push(Action::ReplaceScene(next));
                        out.push(Action::ItemsCommitted);
                    }
                }
                out.push(Action::Redraw);
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Size;
    use crate::geometry::ResizeHandle;
    use crate::scene::{Background, Layer, LayerRank};

    fn scene() -> Scene {
        Scene::new(
            None,
            vec![Layer::new(
                LayerId::new("a"),
                "a.png",
                Point::new(100.0, 100.0),
                Size::new(120.0, 120.0),
            )],
        )
    }

    fn controller() -> Controller {
        Controller::new(Canvas::default(), Point::ZERO)
    }

    fn replaced(actions: &[Action]) -> Option<&Scene> {
        actions.iter().rev().find_map(|a| match a {
            Action::ReplaceScene(s) => Some(s),
            _ => None,
        })
    }

    #[test]
    fn drag_keeps_grab_offset_and_commits_on_release() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        let down = c.on_pointer_down(&s, &mut mask, Point::new(110.0, 120.0));
        assert!(down.contains(&Action::LayerClicked(LayerId::new("a"))));
        assert_eq!(c.selection(), Some(&LayerId::new("a")));

        let mv = c.on_pointer_move(&s, &mut mask, Point::new(210.0, 220.0));
        let s2 = replaced(&mv).unwrap().clone();
        assert_eq!(s2.layers[0].position, Point::new(200.0, 200.0));

        let up = c.on_pointer_up(&s2, &mut mask, Point::new(210.0, 220.0));
        assert!(up.contains(&Action::ItemsCommitted));
        assert_eq!(c.state(), &InputState::Idle);
        assert_eq!(c.selection(), Some(&LayerId::new("a")));
    }

    #[test]
    fn drag_is_clamped_to_canvas() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        c.on_pointer_down(&s, &mut mask, Point::new(110.0, 110.0));
        let mv = c.on_pointer_move(&s, &mut mask, Point::new(5000.0, -5000.0));
        assert_eq!(replaced(&mv).unwrap().layers[0].position, Point::new(840.0, 0.0));
    }

    #[test]
    fn click_without_motion_commits_nothing() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0));
        let up = c.on_pointer_up(&s, &mut mask, Point::new(150.0, 150.0));
        assert!(!up.contains(&Action::ItemsCommitted));
        assert!(replaced(&up).is_none());
    }

    #[test]
    fn pointer_coordinates_subtract_canvas_origin() {
        let mut c = Controller::new(Canvas::default(), Point::new(20.0, 20.0));
        let mut mask = MaskEngine::new();
        let s = scene();
        assert!(c.on_pointer_down(&s, &mut mask, Point::new(110.0, 110.0)).is_empty());
        let down = c.on_pointer_down(&s, &mut mask, Point::new(125.0, 125.0));
        assert!(down.contains(&Action::LayerClicked(LayerId::new("a"))));
    }

    #[test]
    fn clicking_empty_area_clears_selection() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0));
        c.on_pointer_up(&s, &mut mask, Point::new(150.0, 150.0));
        let down = c.on_pointer_down(&s, &mut mask, Point::new(600.0, 400.0));
        assert!(down.contains(&Action::SelectionCleared));
        assert!(c.selection().is_none());
    }

    #[test]
    fn layers_win_over_background_and_background_drags_freely() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene().set_background(Background {
            source_url: "bg.png".to_owned(),
            position: Point::ZERO,
            size: Size::new(960.0, 540.0),
            rank: LayerRank::Behind,
        });
        c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0));
        assert!(matches!(c.state(), InputState::DraggingLayer { .. }));
        c.on_pointer_up(&s, &mut mask, Point::new(150.0, 150.0));

        c.on_pointer_down(&s, &mut mask, Point::new(500.0, 300.0));
        assert!(matches!(c.state(), InputState::DraggingBackground { .. }));
        assert!(
            c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0)).is_empty(),
            "second drag must not start"
        );
        let mv = c.on_pointer_move(&s, &mut mask, Point::new(-500.0, 300.0));
        let s2 = replaced(&mv).unwrap().clone();
        assert_eq!(s2.background.as_ref().unwrap().position, Point::new(-1000.0, 0.0));
        assert_eq!(s2.layers, s.layers);
        let up = c.on_pointer_up(&s2, &mut mask, Point::new(-500.0, 300.0));
        assert!(up.contains(&Action::BackgroundCommitted));
    }

    #[test]
    fn resize_previews_then_commits_once() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        c.select(Some(LayerId::new("a")));
        c.on_pointer_down(&s, &mut mask, Point::new(220.0, 220.0));
        assert!(matches!(
            c.state(),
            InputState::Transforming {
                handle: Handle::Resize(ResizeHandle::SE),
                ..
            }
        ));
        let mv = c.on_pointer_move(&s, &mut mask, Point::new(280.0, 250.0));
        assert!(replaced(&mv).is_none());
        let (_, frame) = c.preview().unwrap();
        assert_eq!(frame.size, Size::new(180.0, 150.0));

        let up = c.on_pointer_up(&s, &mut mask, Point::new(280.0, 250.0));
        let s2 = replaced(&up).unwrap();
        assert_eq!(s2.layers[0].size, Size::new(180.0, 150.0));
        assert_eq!(s2.layers[0].position, Point::new(100.0, 100.0));
        assert!(up.contains(&Action::ItemsCommitted));
        assert!(c.preview().is_none());
    }

    #[test]
    fn rotate_handle_sets_rotation() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = Scene::new(
            None,
            vec![Layer::new(
                LayerId::new("a"),
                "a.png",
                Point::new(100.0, 100.0),
                Size::new(100.0, 100.0),
            )],
        );
        c.select(Some(LayerId::new("a")));
        c.on_pointer_down(&s, &mut mask, Point::new(150.0, 76.0));
        let up = c.on_pointer_up(&s, &mut mask, Point::new(224.0, 150.0));
        let l = &replaced(&up).unwrap().layers[0];
        assert!((l.rotation - 90.0).abs() < 1e-9);
        assert_eq!(l.size, Size::new(100.0, 100.0));
    }

    #[test]
    fn brush_mode_paints_instead_of_dragging() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        mask.set_mode(MaskMode::Brush);
        let s = scene();
        assert_eq!(
            c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0)),
            vec![Action::Redraw]
        );
        assert_eq!(c.state(), &InputState::Painting);
        c.on_pointer_move(&s, &mut mask, Point::new(170.0, 150.0));
        let up = c.on_pointer_up(&s, &mut mask, Point::new(190.0, 150.0));
        assert!(replaced(&up).is_none());
        assert!(mask.is_active());
        assert!(!mask.is_painting());
        assert!(c.selection().is_none());
        assert!(c.on_pointer_down(&s, &mut mask, Point::new(-5.0, 10.0)).is_empty());
    }

    #[test]
    fn polygon_clicks_append_points() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        mask.set_mode(MaskMode::Polygon);
        let s = scene();
        c.on_pointer_down(&s, &mut mask, Point::new(10.0, 10.0));
        let down = c.on_pointer_down(&s, &mut mask, Point::new(50.0, 10.0));
        assert_eq!(
            down[0],
            Action::PolygonPointsChanged(vec![Point::new(10.0, 10.0), Point::new(50.0, 10.0)])
        );
        assert_eq!(c.state(), &InputState::Idle);
    }

    #[test]
    fn reconcile_drops_removed_selection() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0));
        let gone = s.remove_layer(&LayerId::new("a"));
        let actions = c.reconcile(&gone);
        assert!(actions.contains(&Action::SelectionCleared));
        assert_eq!(c.state(), &InputState::Idle);
        assert!(c.reconcile(&gone).is_empty());
    }

    #[test]
    fn leaving_mid_drag_commits() {
        let mut c = controller();
        let mut mask = MaskEngine::new();
        let s = scene();
        c.on_pointer_down(&s, &mut mask, Point::new(150.0, 150.0));
        let mv = c.on_pointer_move(&s, &mut mask, Point::new(160.0, 150.0));
        let s2 = replaced(&mv).unwrap().clone();
        assert_eq!(c.on_pointer_leave(&s2, &mut mask), vec![Action::ItemsCommitted]);
    }
}
