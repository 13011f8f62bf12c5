use moodboard::{
    Background, Canvas, Editor, EditorConfig, EditorListener, ExportOutput, Layer, LayerId,
    MoodboardError, Point, ProxyConfig, Scene, Session, Size,
};

#[derive(Default)]
struct Host {
    items: Vec<Vec<Layer>>,
    backgrounds: Vec<Option<Background>>,
    clicked: Vec<LayerId>,
    exports: Vec<ExportOutput>,
    export_urls: Vec<String>,
    failures: Vec<String>,
}

impl EditorListener for Host {
    fn items_changed(&mut self, items: &[Layer]) {
        self.items.push(items.to_vec());
    }

    fn background_changed(&mut self, background: Option<&Background>) {
        self.backgrounds.push(background.cloned());
    }

    fn layer_clicked(&mut self, id: &LayerId) {
        self.clicked.push(id.clone());
    }

    fn export_completed(&mut self, output: &ExportOutput, png_url: &str, jpeg_url: &str) {
        self.exports.push(output.clone());
        self.export_urls.push(png_url.to_owned());
        self.export_urls.push(jpeg_url.to_owned());
    }

    fn export_failed(&mut self, error: &MoodboardError) {
        self.failures.push(error.to_string());
    }
}

fn editor() -> Editor<Host> {
    let cfg = EditorConfig {
        canvas: Canvas::new(400, 300).unwrap(),
        headroom_px: 50,
        proxy: ProxyConfig {
            endpoint: "https://app.example.com/proxy".to_owned(),
            ..ProxyConfig::default()
        },
        ..EditorConfig::default()
    };
    Editor::new(Session::new("designer"), cfg, Host::default()).unwrap()
}

fn surface(ed: &Editor<Host>, x: f64, y: f64) -> Point {
    ed.surface().to_surface(Point::new(x, y))
}

fn scene_with(layers: Vec<Layer>) -> Scene {
    Scene::new(None, layers)
}

#[test]
fn drag_resize_and_persist_round_trip() {
    let mut ed = editor();
    ed.set_scene(scene_with(vec![Layer::new(
        LayerId::new("a"),
        "a.png",
        Point::new(100.0, 100.0),
        Size::new(100.0, 80.0),
    )]));

    // drag by (+30, +20)
    ed.pointer_down(surface(&ed, 150.0, 140.0));
    ed.pointer_move(surface(&ed, 180.0, 160.0));
    ed.pointer_up(surface(&ed, 180.0, 160.0));
    assert_eq!(ed.listener().clicked, vec![LayerId::new("a")]);
    assert_eq!(ed.listener().items.len(), 1);
    assert_eq!(ed.scene().layers[0].position, Point::new(130.0, 120.0));

    // bottom-right handle sits on the corner; drag it out by (+50, +40)
    ed.pointer_down(surface(&ed, 230.0, 200.0));
    ed.pointer_move(surface(&ed, 260.0, 220.0));
    assert!(ed.surface().transform_preview().is_some());
    assert_eq!(ed.scene().layers[0].size, Size::new(100.0, 80.0));
    ed.pointer_up(surface(&ed, 280.0, 240.0));
    assert!(ed.surface().transform_preview().is_none());

    let l = &ed.scene().layers[0];
    assert!((l.size.width - 150.0).abs() < 1e-9);
    assert!((l.size.height - 120.0).abs() < 1e-9);
    assert!((l.position.x - 130.0).abs() < 1e-9);
    assert!((l.position.y - 120.0).abs() < 1e-9);
    assert_eq!(ed.listener().items.len(), 2);
    assert_eq!(ed.listener().items[1], ed.scene().layers);

    let json = ed.scene().to_json().unwrap();
    let mut other = editor();
    other.hydrate(&json);
    assert_eq!(other.scene(), ed.scene());
}

#[test]
fn clicking_empty_canvas_clears_selection_and_drags_background() {
    let mut ed = editor();
    ed.set_scene(
        scene_with(vec![Layer::new(
            LayerId::new("a"),
            "a.png",
            Point::new(10.0, 10.0),
            Size::new(40.0, 40.0),
        )])
        .set_background(Background::covering("bg.png", Canvas::new(400, 300).unwrap())),
    );
    ed.pointer_down(surface(&ed, 20.0, 20.0));
    ed.pointer_up(surface(&ed, 20.0, 20.0));
    assert!(ed.selection().is_some());

    ed.pointer_down(surface(&ed, 300.0, 200.0));
    assert!(ed.selection().is_none());
    ed.pointer_move(surface(&ed, 280.0, 190.0));
    ed.pointer_leave();

    let bg = ed.scene().background.as_ref().unwrap();
    assert_eq!(bg.position, Point::new(-20.0, -10.0));
    assert_eq!(ed.listener().backgrounds.len(), 1);
    assert!(ed.listener().items.is_empty());
}

#[test]
fn remote_images_route_through_proxy_with_fallback() {
    let mut ed = editor();
    let url = "https://drive.example.com/file?id=1&x=a b";
    ed.set_scene(scene_with(vec![Layer::new(
        LayerId::new("r"),
        url,
        Point::new(0.0, 0.0),
        Size::new(20.0, 20.0),
    )]));

    let first = ed.take_pending_loads();
    assert_eq!(first.len(), 1);
    assert!(first[0].via_proxy);
    assert_eq!(
        first[0].fetch_url,
        "https://app.example.com/proxy?url=https%3A%2F%2Fdrive.example.com%2Ffile%3Fid%3D1%26x%3Da%20b"
    );
    ed.deliver_load(&first[0], Err(MoodboardError::load("proxy unavailable")));

    let retry = ed.take_pending_loads();
    assert_eq!(retry.len(), 1);
    assert!(!retry[0].via_proxy);
    assert_eq!(retry[0].fetch_url, url);
    ed.deliver_load(&retry[0], Err(MoodboardError::load("cors")));

    assert!(matches!(ed.image_state(url), Some(moodboard::LoadState::Failed)));
    assert!(ed.take_pending_loads().is_empty());
    assert_eq!(ed.scene().layers.len(), 1);
    ed.redraw_if_dirty().unwrap();
}

#[test]
fn export_token_protocol() {
    let mut ed = editor();
    ed.set_export_token(0);
    assert!(ed.listener().exports.is_empty());
    ed.add_layer("a.png");
    ed.set_export_token(1);
    ed.set_export_token(1);
    ed.set_export_token(2);
    assert_eq!(ed.listener().exports.len(), 2);
    assert_eq!(ed.listener().exports[0].png, ed.listener().exports[1].png);
    assert_eq!(ed.listener().exports[0].width, 800);
    assert_eq!(ed.listener().export_urls[0], ed.listener().exports[0].png_data_url());
    assert_eq!(ed.listener().export_urls[1], ed.listener().exports[0].jpeg_data_url());
    assert!(ed.listener().failures.is_empty());
}

#[test]
fn clear_drops_everything() {
    let mut ed = editor();
    ed.add_layer("a.png");
    ed.set_background_url(Some("bg.png"));
    ed.clear();
    assert!(ed.scene().is_empty());
    assert_eq!(ed.listener().items.last().map(Vec::len), Some(0));
    assert_eq!(ed.listener().backgrounds.last(), Some(&None));
}
