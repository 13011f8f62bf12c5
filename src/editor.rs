//! Editor facade: one editing session over a scene, its mask, the controller and the surface.
//!
//! Host inputs (items, background, mask settings, export token) go in through setters. Pointer
//! events go through the controller. Everything the host must hear about comes back through
//! [`EditorListener`]. Nothing is redrawn until [`Editor::redraw_if_dirty`] is called.

use crate::assets::{ImageFetcher, LoadRequest, LoadState};
use crate::config::EditorConfig;
use crate::export::{ExportOutput, ExportTrigger, export};
use crate::foundation::core::Point;
use crate::foundation::error::{MoodboardError, MoodboardResult};
use crate::foundation::math::PlacementRng;
use crate::interaction::{Action, Controller};
use crate::mask::{MaskEngine, MaskMode};
use crate::render::{FrameRGBA, RenderSurface};
use crate::scene::{Background, BlendMode, Layer, LayerId, LayerRank, Scene};

/// Who the editor is working for. Supplied by the host; never read from ambient state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Host callbacks. Every method defaults to doing nothing.
pub trait EditorListener {
    /// Full layer list after a drag, transform, or editor-side layer command.
    fn items_changed(&mut self, _items: &[Layer]) {}
    fn background_changed(&mut self, _background: Option<&Background>) {}
    fn polygon_points_changed(&mut self, _points: &[Point]) {}
    fn layer_clicked(&mut self, _id: &LayerId) {}
    fn selection_cleared(&mut self) {}
    /// `png_data_url` and `jpeg_data_url` are base64 `data:` URLs of `output`'s encodings.
    fn export_completed(
        &mut self,
        _output: &ExportOutput,
        _png_data_url: &str,
        _jpeg_data_url: &str,
    ) {
    }
    fn export_failed(&mut self, _error: &MoodboardError) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl EditorListener for NoopListener {}

pub struct Editor<L: EditorListener = NoopListener> {
    session: Session,
    config: EditorConfig,
    scene: Scene,
    mask: MaskEngine,
    controller: Controller,
    surface: RenderSurface,
    rng: PlacementRng,
    trigger: ExportTrigger,
    dirty: bool,
    listener: L,
}

impl<L: EditorListener> Editor<L> {
    pub fn new(session: Session, config: EditorConfig, listener: L) -> MoodboardResult<Self> {
        config.validate()?;
        let surface = RenderSurface::new(config.canvas, config.headroom_px, config.proxy.clone())?;
        let controller = Controller::new(config.canvas, surface.canvas_origin());
        tracing::debug!(user = %session.user_id, canvas = ?config.canvas, "editor created");
        Ok(Self {
            session,
            rng: PlacementRng::new(config.placement_seed),
            config,
            scene: Scene::default(),
            mask: MaskEngine::new(),
            controller,
            surface,
            trigger: ExportTrigger::default(),
            dirty: true,
            listener,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn mask(&self) -> &MaskEngine {
        &self.mask
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn selection(&self) -> Option<&LayerId> {
        self.controller.selection()
    }

    /// Load a persisted scene. Malformed input degrades to an empty scene.
    #[tracing::instrument(skip_all, fields(bytes = json.len()))]
    pub fn hydrate(&mut self, json: &str) {
        let scene = Scene::from_json(json);
        self.set_scene(scene);
    }

    /// Replace the whole scene from the host. The host already knows it, so nothing is echoed.
    pub fn set_scene(&mut self, scene: Scene) {
        self.controller.cancel(&mut self.mask);
        self.scene = scene;
        self.after_scene_change();
        let actions = self.controller.reconcile(&self.scene);
        self.apply(actions);
    }

    pub fn set_items(&mut self, items: Vec<Layer>) {
        let scene = Scene::new(self.scene.background.clone(), items);
        self.set_scene(scene);
    }

    /// Set the background by URL. The same URL keeps its current placement.
    pub fn set_background_url(&mut self, url: Option<&str>) {
        let next = match url {
            None => self.scene.clear_background(),
            Some(u) => match &self.scene.background {
                Some(bg) if bg.source_url == u => return,
                _ => self
                    .scene
                    .set_background(Background::covering(u, self.config.canvas)),
            },
        };
        self.set_scene(next);
    }

    pub fn add_layer(&mut self, source_url: &str) -> LayerId {
        let (next, id) = self.scene.add_layer(source_url, &mut self.rng);
        tracing::debug!(id = %id, "layer added");
        self.commit_items(next);
        id
    }

    pub fn remove_layer(&mut self, id: &LayerId) {
        let next = self.scene.remove_layer(id);
        self.commit_items(next);
    }

    pub fn rotate_layer(&mut self, id: &LayerId, delta_degrees: f64) {
        let next = self.scene.rotate_layer(id, delta_degrees);
        self.commit_items(next);
    }

    pub fn flip_layer(&mut self, id: &LayerId) {
        let next = self.scene.flip_layer(id);
        self.commit_items(next);
    }

    pub fn toggle_shadow(&mut self, id: &LayerId) {
        let next = self.scene.toggle_shadow(id);
        self.commit_items(next);
    }

    pub fn set_blend_mode(&mut self, id: &LayerId, mode: Option<BlendMode>) {
        let next = self.scene.set_blend_mode(id, mode);
        self.commit_items(next);
    }

    pub fn bring_to_front(&mut self, id: &LayerId) {
        let next = self.scene.bring_to_front(id);
        self.commit_items(next);
    }

    pub fn send_to_back(&mut self, id: &LayerId) {
        let next = self.scene.send_to_back(id);
        self.commit_items(next);
    }

    pub fn set_background_rank(&mut self, rank: LayerRank) {
        let next = self.scene.set_background_rank(rank);
        if next != self.scene {
            self.set_scene(next);
            self.listener.background_changed(self.scene.background.as_ref());
        }
    }

    /// Drop every layer and the background, and any authored mask.
    pub fn clear(&mut self) {
        let next = self.scene.clear();
        self.mask.clear();
        self.commit_items(next);
        self.listener.background_changed(None);
    }

    pub fn set_mask_mode(&mut self, mode: MaskMode) {
        if mode == self.mask.mode() {
            return;
        }
        self.controller.cancel(&mut self.mask);
        self.mask.set_mode(mode);
        self.dirty = true;
    }

    pub fn set_brush_size(&mut self, diameter: f64) {
        self.mask.set_brush_size(diameter);
        self.dirty = true;
    }

    pub fn set_polygon_points(&mut self, points: impl IntoIterator<Item = Point>) {
        self.mask.set_polygon_points(points);
        self.dirty = true;
    }

    /// Observe the host's export token; a change from the previous value exports once.
    ///
    /// Returns `true` when an export ran, whether or not it succeeded.
    pub fn set_export_token(&mut self, token: u64) -> bool {
        if !self.trigger.observe(token) {
            return false;
        }
        match self.export_now() {
            Ok(out) => {
                let (png_url, jpeg_url) = (out.png_data_url(), out.jpeg_data_url());
                self.listener.export_completed(&out, &png_url, &jpeg_url);
            }
            Err(e) => {
                tracing::warn!(error = %e, "export failed");
                self.listener.export_failed(&e);
            }
        }
        true
    }

    pub fn export_now(&mut self) -> MoodboardResult<ExportOutput> {
        let out = export(&mut self.surface, &self.scene, &self.mask, &self.config.export);
        // export() redraws without the transform preview and with overlays hidden
        self.dirty = true;
        out
    }

    pub fn pointer_down(&mut self, surface_pt: Point) {
        let actions = self
            .controller
            .on_pointer_down(&self.scene, &mut self.mask, surface_pt);
        self.apply(actions);
    }

    pub fn pointer_move(&mut self, surface_pt: Point) {
        let actions = self
            .controller
            .on_pointer_move(&self.scene, &mut self.mask, surface_pt);
        self.apply(actions);
    }

    pub fn pointer_up(&mut self, surface_pt: Point) {
        let actions = self
            .controller
            .on_pointer_up(&self.scene, &mut self.mask, surface_pt);
        self.apply(actions);
    }

    pub fn pointer_leave(&mut self) {
        let actions = self.controller.on_pointer_leave(&self.scene, &mut self.mask);
        self.apply(actions);
    }

    pub fn take_pending_loads(&mut self) -> Vec<LoadRequest> {
        self.surface.take_pending_loads()
    }

    pub fn deliver_load(&mut self, request: &LoadRequest, result: MoodboardResult<Vec<u8>>) {
        if self.surface.deliver_load(request, result) {
            self.dirty = true;
        }
    }

    /// Resolve every pending image through `fetcher`. Returns `true` when anything became drawable.
    pub fn pump_loads(&mut self, fetcher: &dyn ImageFetcher) -> bool {
        let changed = self.surface.pump_loads(fetcher);
        if changed {
            self.dirty = true;
        }
        changed
    }

    pub fn image_state(&self, url: &str) -> Option<&LoadState> {
        self.surface.image_state(url)
    }

    /// Redraw the live frame if anything changed since the last draw.
    pub fn redraw_if_dirty(&mut self) -> MoodboardResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.surface.draw(&self.scene, &self.mask)?;
        self.dirty = false;
        Ok(true)
    }

    pub fn frame(&self) -> FrameRGBA {
        self.surface.frame()
    }

    fn commit_items(&mut self, next: Scene) {
        if next == self.scene {
            return;
        }
        self.set_scene(next);
        self.listener.items_changed(&self.scene.layers);
    }

    fn after_scene_change(&mut self) {
        self.surface.sync_images(&self.scene);
        self.dirty = true;
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ReplaceScene(next) => {
                    self.scene = next;
                    self.after_scene_change();
                }
                Action::ItemsCommitted => self.listener.items_changed(&self.scene.layers),
                Action::BackgroundCommitted => {
                    self.listener.background_changed(self.scene.background.as_ref());
                }
                Action::LayerClicked(id) => self.listener.layer_clicked(&id),
                Action::SelectionCleared => self.listener.selection_cleared(),
                Action::PolygonPointsChanged(points) => {
                    self.listener.polygon_points_changed(&points);
                }
                Action::Redraw => self.dirty = true,
            }
        }
        self.surface.set_selection(self.controller.selection().cloned());
        self.surface.set_transform_preview(self.controller.preview());
        self.surface.set_brush_cursor(self.controller.brush_cursor());
    }
}

impl<L: EditorListener> std::fmt::Debug for Editor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("session", &self.session)
            .field("layers", &self.scene.layers.len())
            .field("mask", &self.mask.mode())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::assets::MemoryFetcher;
    use crate::foundation::core::Size;

    #[derive(Default)]
    struct Recorder {
        items: Vec<usize>,
        clicked: Vec<LayerId>,
        cleared: usize,
        polygons: Vec<usize>,
        exports: Vec<(u32, u32)>,
        urls: Vec<(String, String)>,
        failures: usize,
        backgrounds: usize,
    }

    impl EditorListener for Recorder {
        fn items_changed(&mut self, items: &[Layer]) {
            self.items.push(items.len());
        }
        fn background_changed(&mut self, _background: Option<&Background>) {
            self.backgrounds += 1;
        }
        fn polygon_points_changed(&mut self, points: &[Point]) {
            self.polygons.push(points.len());
        }
        fn layer_clicked(&mut self, id: &LayerId) {
            self.clicked.push(id.clone());
        }
        fn selection_cleared(&mut self) {
            self.cleared += 1;
        }
        fn export_completed(&mut self, output: &ExportOutput, png_url: &str, jpeg_url: &str) {
            self.exports.push((output.width, output.height));
            self.urls.push((png_url.to_owned(), jpeg_url.to_owned()));
        }
        fn export_failed(&mut self, _error: &MoodboardError) {
            self.failures += 1;
        }
    }

    fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn small_config() -> EditorConfig {
        EditorConfig {
            canvas: crate::foundation::core::Canvas::new(200, 100).unwrap(),
            headroom_px: 10,
            ..EditorConfig::default()
        }
    }

    fn editor() -> Editor<Recorder> {
        Editor::new(Session::new("u-1"), small_config(), Recorder::default()).unwrap()
    }

    fn at(origin: Point, x: f64, y: f64) -> Point {
        Point::new(origin.x + x, origin.y + y)
    }

    fn one_layer(id: &str, x: f64, y: f64) -> Layer {
        Layer::new(
            LayerId::new(id),
            "red.png",
            Point::new(x, y),
            Size::new(40.0, 40.0),
        )
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = EditorConfig {
            export: crate::export::ExportOpts {
                jpeg_quality: 0,
                ..Default::default()
            },
            ..EditorConfig::default()
        };
        assert!(Editor::new(Session::new("u"), cfg, NoopListener).is_err());
    }

    #[test]
    fn set_items_does_not_echo() {
        let mut ed = editor();
        ed.set_items(vec![one_layer("a", 10.0, 10.0)]);
        assert_eq!(ed.scene().layers.len(), 1);
        assert!(ed.listener().items.is_empty());
        assert!(ed.is_dirty());
    }

    #[test]
    fn layer_commands_report_items() {
        let mut ed = editor();
        let a = ed.add_layer("red.png");
        let b = ed.add_layer("red.png");
        assert_ne!(a, b);
        assert_eq!(ed.scene().instance_count("red.png"), 2);
        ed.send_to_back(&b);
        assert_eq!(ed.scene().layers[0].id, b);
        ed.remove_layer(&LayerId::new("missing"));
        assert_eq!(ed.listener().items, vec![1, 2, 2]);
    }

    #[test]
    fn drag_commits_once_on_release() {
        let mut ed = editor();
        ed.set_items(vec![one_layer("a", 10.0, 10.0)]);
        let origin = ed.surface().canvas_origin();
        ed.pointer_down(at(origin, 20.0, 20.0));
        ed.pointer_move(at(origin, 40.0, 30.0));
        ed.pointer_move(at(origin, 60.0, 40.0));
        assert!(ed.listener().items.is_empty());
        ed.pointer_up(at(origin, 60.0, 40.0));
        assert_eq!(ed.listener().items, vec![1]);
        assert_eq!(ed.listener().clicked, vec![LayerId::new("a")]);
        assert_eq!(ed.scene().layers[0].position, Point::new(50.0, 30.0));
        assert_eq!(ed.surface().selection(), Some(&LayerId::new("a")));
    }

    #[test]
    fn removing_selected_layer_clears_selection() {
        let mut ed = editor();
        ed.set_items(vec![one_layer("a", 10.0, 10.0)]);
        let origin = ed.surface().canvas_origin();
        ed.pointer_down(at(origin, 20.0, 20.0));
        ed.pointer_up(at(origin, 20.0, 20.0));
        ed.remove_layer(&LayerId::new("a"));
        assert_eq!(ed.selection(), None);
        assert_eq!(ed.surface().selection(), None);
        assert_eq!(ed.listener().cleared, 1);
    }

    #[test]
    fn polygon_clicks_reach_listener_and_mode_switch_discards() {
        let mut ed = editor();
        ed.set_mask_mode(MaskMode::Polygon);
        let origin = ed.surface().canvas_origin();
        for (x, y) in [(10.0, 10.0), (90.0, 10.0), (50.0, 80.0)] {
            ed.pointer_down(at(origin, x, y));
            ed.pointer_up(at(origin, x, y));
        }
        assert_eq!(ed.listener().polygons, vec![1, 2, 3]);
        assert!(ed.mask().is_active());
        ed.set_mask_mode(MaskMode::None);
        assert!(!ed.mask().is_active());
        assert!(ed.mask().polygon_points().is_empty());
    }

    #[test]
    fn redraw_happens_only_when_dirty() {
        let mut ed = editor();
        assert!(ed.redraw_if_dirty().unwrap());
        assert!(!ed.redraw_if_dirty().unwrap());
        ed.set_brush_size(12.0);
        assert!(ed.redraw_if_dirty().unwrap());
        let f = ed.frame();
        assert_eq!((f.width, f.height), (220, 120));
    }

    #[test]
    fn loads_mark_dirty_and_draw() {
        let mut ed = editor();
        ed.set_items(vec![one_layer("a", 0.0, 0.0)]);
        ed.redraw_if_dirty().unwrap();
        assert!(matches!(ed.image_state("red.png"), Some(LoadState::Pending)));
        let fetcher = MemoryFetcher::new().with("red.png", png(4, 4, [255, 0, 0, 255]));
        assert!(ed.pump_loads(&fetcher));
        assert!(ed.redraw_if_dirty().unwrap());
        let origin = ed.surface().canvas_origin();
        let px = ed
            .frame()
            .pixel(origin.x as u32 + 20, origin.y as u32 + 20)
            .unwrap();
        assert_eq!(px, [255, 0, 0, 255]);
    }

    #[test]
    fn export_token_fires_once_per_change() {
        let mut ed = editor();
        assert!(!ed.set_export_token(1));
        assert!(!ed.set_export_token(1));
        assert!(ed.set_export_token(2));
        assert!(!ed.set_export_token(2));
        assert_eq!(ed.listener().exports, vec![(400, 200)]);
        let (png_url, jpeg_url) = &ed.listener().urls[0];
        assert!(png_url.starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert!(jpeg_url.starts_with("data:image/jpeg;base64,/9j/"));
        assert_eq!(ed.listener().failures, 0);
        assert!(ed.surface().overlays_visible());
    }

    #[test]
    fn background_url_keeps_placement_for_same_url() {
        let mut ed = editor();
        ed.set_background_url(Some("bg.png"));
        let moved = ed.scene().move_background(-20.0, -5.0);
        ed.set_scene(moved);
        ed.set_background_url(Some("bg.png"));
        assert_eq!(
            ed.scene().background.as_ref().map(|b| b.position),
            Some(Point::new(-20.0, -5.0))
        );
        ed.set_background_rank(LayerRank::Front);
        assert_eq!(ed.listener().backgrounds, 1);
        ed.set_background_url(None);
        assert!(ed.scene().background.is_none());
    }

    #[test]
    fn hydrate_tolerates_garbage() {
        let mut ed = editor();
        ed.hydrate("{ not json");
        assert!(ed.scene().is_empty());
        ed.hydrate(
            r#"{"draggableImages":[{"id":"a","url":"red.png","x":1,"y":2,"width":30,"height":30}],
                "backgroundImage":null}"#,
        );
        assert_eq!(ed.scene().layers.len(), 1);
    }
}
