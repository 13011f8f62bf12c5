use crate::assets::{ImageCache, ImageFetcher, LoadRequest, LoadState, ProxyConfig};
use crate::foundation::core::{Affine, BezPath, Canvas, Point, Rect, Vec2};
use crate::foundation::error::{MoodboardError, MoodboardResult};
use crate::foundation::math::{mul_div255_u8, unpremultiply_rgba8_in_place};
use crate::geometry::LayerFrame;
use crate::mask::MaskEngine;
use crate::render::blur::{blur_alpha, radius_for_sigma};
use crate::render::composite::{
    PixelRect, apply_mask_in_place, blend_region_in_place, clear_region, over_alpha_in_place,
};
use crate::render::overlay::{OverlayShape, OverlayState, OverlayStyle, overlay_shapes};
use crate::scene::{Background, BlendMode, LayerId, Scene};

/// Drop shadow offset in canvas pixels.
pub const SHADOW_OFFSET: Vec2 = Vec2::new(5.0, 5.0);
/// Canvas-style shadow blur; the Gaussian sigma is half of it.
pub const SHADOW_BLUR: f64 = 10.0;
/// Shadow color is black at this alpha.
pub const SHADOW_ALPHA: u8 = 128;

/// Read-back pixels, row-major RGBA8.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Same pixels with straight (non-premultiplied) alpha, as image encoders expect.
    #[must_use]
    pub fn into_straight(mut self) -> FrameRGBA {
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut self.data);
            self.premultiplied = false;
        }
        self
    }
}

struct Target {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
    scratch: vello_cpu::Pixmap,
}

impl Target {
    fn new(width: u32, height: u32) -> MoodboardResult<Self> {
        if width == 0 || height == 0 {
            return Err(MoodboardError::render("surface must be non-empty"));
        }
        let w: u16 = width
            .try_into()
            .map_err(|_| MoodboardError::render("surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| MoodboardError::render("surface height exceeds u16"))?;
        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
            scratch: vello_cpu::Pixmap::new(w, h),
        })
    }

    fn stride(&self) -> u32 {
        u32::from(self.width)
    }

    fn full(&self) -> PixelRect {
        PixelRect::full(u32::from(self.width), u32::from(self.height))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct MaskKey {
    engine: u64,
    revision: u64,
    width: u16,
    height: u16,
    view: [f64; 6],
}

#[derive(Default)]
struct MaskRaster {
    key: Option<MaskKey>,
    alpha: Vec<u8>,
}

struct DrawItem<'a> {
    url: &'a str,
    frame: LayerFrame,
    flip: bool,
    shadow: bool,
    blend: BlendMode,
}

impl<'a> DrawItem<'a> {
    fn background(bg: &'a Background) -> Self {
        Self {
            url: &bg.source_url,
            frame: bg.frame(),
            flip: false,
            shadow: false,
            blend: BlendMode::Normal,
        }
    }
}

struct ComposeInput<'a> {
    scene: &'a Scene,
    mask: &'a MaskEngine,
    view: Affine,
    preview: Option<&'a (LayerId, LayerFrame)>,
    overlay: Option<&'a OverlayState>,
}

/// Owner of the drawing surface and the draw-order algorithm.
///
/// The surface is the canvas plus `headroom` pixels on every side; the canvas origin sits at
/// `(headroom, headroom)` in surface coordinates. Callers never touch the pixmaps directly.
pub struct RenderSurface {
    canvas: Canvas,
    headroom: u32,
    live: Target,
    images: ImageCache,
    overlay: OverlayState,
    preview: Option<(LayerId, LayerFrame)>,
    live_mask: MaskRaster,
    export_mask: MaskRaster,
}

impl std::fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSurface")
            .field("canvas", &self.canvas)
            .field("headroom", &self.headroom)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

impl RenderSurface {
    pub fn new(canvas: Canvas, headroom: u32, proxy: ProxyConfig) -> MoodboardResult<Self> {
        let (w, h) = surface_size(canvas, headroom, 1)?;
        Ok(Self {
            canvas,
            headroom,
            live: Target::new(w, h)?,
            images: ImageCache::new(proxy),
            overlay: OverlayState::default(),
            preview: None,
            live_mask: MaskRaster::default(),
            export_mask: MaskRaster::default(),
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn headroom(&self) -> u32 {
        self.headroom
    }

    /// Surface size in pixels, headroom included.
    pub fn size(&self) -> (u32, u32) {
        (u32::from(self.live.width), u32::from(self.live.height))
    }

    pub fn canvas_origin(&self) -> Point {
        let h = f64::from(self.headroom);
        Point::new(h, h)
    }

    pub fn to_canvas(&self, surface_pt: Point) -> Point {
        surface_pt - self.canvas_origin().to_vec2()
    }

    pub fn to_surface(&self, canvas_pt: Point) -> Point {
        canvas_pt + self.canvas_origin().to_vec2()
    }

    /// Track the images `scene` references; new URLs queue loads, dropped ones are forgotten.
    pub fn sync_images(&mut self, scene: &Scene) {
        self.images.sync(&scene.referenced_urls());
    }

    pub fn take_pending_loads(&mut self) -> Vec<LoadRequest> {
        self.images.take_pending_loads()
    }

    /// Returns `true` when the delivered image became drawable.
    pub fn deliver_load(
        &mut self,
        request: &LoadRequest,
        result: MoodboardResult<Vec<u8>>,
    ) -> bool {
        self.images.deliver(request, result)
    }

    pub fn pump_loads(&mut self, fetcher: &dyn ImageFetcher) -> bool {
        self.images.pump(fetcher)
    }

    pub fn has_pending_loads(&self) -> bool {
        self.images.has_pending()
    }

    pub fn image_state(&self, url: &str) -> Option<&LoadState> {
        self.images.state(url)
    }

    pub fn overlays_visible(&self) -> bool {
        self.overlay.visible
    }

    pub fn set_overlays_visible(&mut self, visible: bool) {
        self.overlay.visible = visible;
    }

    pub fn selection(&self) -> Option<&LayerId> {
        self.overlay.selection.as_ref()
    }

    pub fn set_selection(&mut self, id: Option<LayerId>) {
        self.overlay.selection = id;
    }

    pub fn set_brush_cursor(&mut self, canvas_pt: Option<Point>) {
        self.overlay.brush_cursor = canvas_pt;
    }

    /// Draw `id` with `frame` instead of its committed geometry until cleared.
    pub fn set_transform_preview(&mut self, preview: Option<(LayerId, LayerFrame)>) {
        self.preview = preview;
    }

    pub fn transform_preview(&self) -> Option<&(LayerId, LayerFrame)> {
        self.preview.as_ref()
    }

    /// Redraw the live editing frame, overlays included when visible.
    #[tracing::instrument(level = "debug", skip_all, fields(layers = scene.layers.len()))]
    pub fn draw(&mut self, scene: &Scene, mask: &MaskEngine) -> MoodboardResult<()> {
        self.sync_images(scene);
        let h = f64::from(self.headroom);
        let input = ComposeInput {
            scene,
            mask,
            view: Affine::translate((h, h)),
            preview: self.preview.as_ref(),
            overlay: Some(&self.overlay),
        };
        compose(&mut self.live, &self.images, &mut self.live_mask, &input)
    }

    /// Last drawn live frame, premultiplied.
    pub fn frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: u32::from(self.live.width),
            height: u32::from(self.live.height),
            data: self.live.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    /// Draw the whole surface at `pixel_ratio` and read back only the canvas region.
    ///
    /// Transform previews are never included; overlays follow the current visibility.
    #[tracing::instrument(level = "debug", skip(self, scene, mask))]
    pub fn render_canvas(
        &mut self,
        scene: &Scene,
        mask: &MaskEngine,
        pixel_ratio: u32,
    ) -> MoodboardResult<FrameRGBA> {
        if pixel_ratio == 0 {
            return Err(MoodboardError::validation("pixel ratio must be >= 1"));
        }
        self.sync_images(scene);
        let (w, h) = surface_size(self.canvas, self.headroom, pixel_ratio)?;
        let mut target = Target::new(w, h)?;
        let ratio = f64::from(pixel_ratio);
        let head = f64::from(self.headroom);
        let input = ComposeInput {
            scene,
            mask,
            view: Affine::scale(ratio) * Affine::translate((head, head)),
            preview: None,
            overlay: Some(&self.overlay),
        };
        compose(&mut target, &self.images, &mut self.export_mask, &input)?;

        let out_w = self.canvas.width * pixel_ratio;
        let out_h = self.canvas.height * pixel_ratio;
        let x0 = (self.headroom * pixel_ratio) as usize;
        let y0 = (self.headroom * pixel_ratio) as usize;
        let src = target.pixmap.data_as_u8_slice();
        let src_stride = w as usize * 4;
        let row_len = out_w as usize * 4;
        let mut data = Vec::with_capacity(row_len * out_h as usize);
        for y in 0..out_h as usize {
            let start = (y0 + y) * src_stride + x0 * 4;
            data.extend_from_slice(&src[start..start + row_len]);
        }
        Ok(FrameRGBA {
            width: out_w,
            height: out_h,
            data,
            premultiplied: true,
        })
    }
}

fn surface_size(canvas: Canvas, headroom: u32, ratio: u32) -> MoodboardResult<(u32, u32)> {
    let grow = |v: u32| -> Option<u32> {
        headroom
            .checked_mul(2)
            .and_then(|h| v.checked_add(h))
            .and_then(|v| v.checked_mul(ratio))
    };
    let w = grow(canvas.width).ok_or_else(|| MoodboardError::render("surface width overflow"))?;
    let h = grow(canvas.height).ok_or_else(|| MoodboardError::render("surface height overflow"))?;
    if w > u32::from(u16::MAX) || h > u32::from(u16::MAX) {
        return Err(MoodboardError::render(format!(
            "surface {w}x{h} exceeds the rasterizer limit"
        )));
    }
    Ok((w, h))
}

fn compose(
    target: &mut Target,
    images: &ImageCache,
    mask_raster: &mut MaskRaster,
    input: &ComposeInput<'_>,
) -> MoodboardResult<()> {
    let stride = target.stride();
    let full = target.full();
    clear_region(target.pixmap.data_as_u8_slice_mut(), stride, full)?;

    let background = input.scene.background.as_ref();
    if let Some(bg) = background.filter(|b| b.rank.draws_before_layers()) {
        draw_image(target, images, &DrawItem::background(bg), input.view)?;
    }
    for layer in &input.scene.layers {
        let frame = match input.preview {
            Some((id, frame)) if *id == layer.id => *frame,
            _ => layer.frame(),
        };
        let item = DrawItem {
            url: &layer.source_url,
            frame,
            flip: layer.flip_horizontal,
            shadow: layer.shadow,
            blend: layer.blend_mode.unwrap_or_default(),
        };
        draw_image(target, images, &item, input.view)?;
    }
    if let Some(bg) = background.filter(|b| !b.rank.draws_before_layers()) {
        draw_image(target, images, &DrawItem::background(bg), input.view)?;
    }

    if input.mask.is_active() {
        let key = MaskKey {
            engine: input.mask.id(),
            revision: input.mask.revision(),
            width: target.width,
            height: target.height,
            view: input.view.as_coeffs(),
        };
        if mask_raster.key != Some(key) {
            if let Some(coverage) = input.mask.coverage() {
                mask_raster.alpha = rasterize_coverage(target, &coverage, input.view);
                mask_raster.key = Some(key);
                tracing::debug!(
                    engine = key.engine,
                    revision = key.revision,
                    "mask raster rebuilt"
                );
            }
        }
        if mask_raster.key == Some(key) {
            apply_mask_in_place(target.pixmap.data_as_u8_slice_mut(), &mask_raster.alpha)?;
        }
    }

    if let Some(state) = input.overlay {
        let shapes = overlay_shapes(input.scene, input.mask, state, input.preview);
        if !shapes.is_empty() {
            draw_shapes(target, &shapes, input.view)?;
        }
    }
    Ok(())
}

fn draw_image(
    target: &mut Target,
    images: &ImageCache,
    item: &DrawItem<'_>,
    view: Affine,
) -> MoodboardResult<()> {
    let Some(img) = images.ready(item.url) else {
        return Ok(());
    };
    let (iw, ih) = (f64::from(img.width), f64::from(img.height));
    let xf = view
        * item.frame.to_canvas(item.flip)
        * Affine::scale_non_uniform(item.frame.size.width / iw, item.frame.size.height / ih);
    let src_rect = Rect::new(0.0, 0.0, iw, ih);
    let bounds = xf.transform_rect_bbox(src_rect).inflate(1.0, 1.0);
    let stride = target.stride();
    let Some(region) = PixelRect::covering(bounds, stride, u32::from(target.height)) else {
        return Ok(());
    };

    clear_region(target.scratch.data_as_u8_slice_mut(), stride, region)?;
    let mut ctx = vello_cpu::RenderContext::new(target.width, target.height);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(affine_to_cpu(xf));
    ctx.set_paint(img.paint.clone());
    ctx.fill_rect(&rect_to_cpu(src_rect));
    ctx.flush();
    ctx.render_to_pixmap(&mut target.scratch);

    if item.shadow {
        composite_shadow(target, region, view_scale(view))?;
    }
    blend_region_in_place(
        target.pixmap.data_as_u8_slice_mut(),
        target.scratch.data_as_u8_slice(),
        stride,
        region,
        item.blend,
    )
}

/// Blurred black silhouette of the layer currently in `scratch`, composited under it.
fn composite_shadow(target: &mut Target, layer: PixelRect, scale: f64) -> MoodboardResult<()> {
    let off_x = (SHADOW_OFFSET.x * scale).round() as i64;
    let off_y = (SHADOW_OFFSET.y * scale).round() as i64;
    let sigma = (SHADOW_BLUR * 0.5 * scale) as f32;
    let radius = radius_for_sigma(sigma);
    let pad = i64::from(radius);
    let stride = target.stride();

    let bounds = Rect::new(
        (i64::from(layer.x0) + off_x - pad) as f64,
        (i64::from(layer.y0) + off_y - pad) as f64,
        (i64::from(layer.x1) + off_x + pad) as f64,
        (i64::from(layer.y1) + off_y + pad) as f64,
    );
    let Some(region) = PixelRect::covering(bounds, stride, u32::from(target.height)) else {
        return Ok(());
    };

    let (rw, rh) = (region.width() as usize, region.height() as usize);
    let mut silhouette = vec![0u8; rw * rh];
    let scratch = target.scratch.data_as_u8_slice();
    for py in 0..rh {
        let sy = i64::from(region.y0) + py as i64 - off_y;
        if sy < i64::from(layer.y0) || sy >= i64::from(layer.y1) {
            continue;
        }
        for px in 0..rw {
            let sx = i64::from(region.x0) + px as i64 - off_x;
            if sx < i64::from(layer.x0) || sx >= i64::from(layer.x1) {
                continue;
            }
            let a = scratch[(sy as usize * stride as usize + sx as usize) * 4 + 3];
            silhouette[py * rw + px] = mul_div255_u8(u16::from(a), u16::from(SHADOW_ALPHA));
        }
    }

    let blurred = blur_alpha(&silhouette, region.width(), region.height(), sigma)?;
    over_alpha_in_place(
        target.pixmap.data_as_u8_slice_mut(),
        stride,
        region,
        &blurred,
        [0, 0, 0],
    )
}

fn rasterize_coverage(target: &mut Target, path: &BezPath, view: Affine) -> Vec<u8> {
    target.scratch.data_as_u8_slice_mut().fill(0);
    let mut ctx = vello_cpu::RenderContext::new(target.width, target.height);
    ctx.set_transform(affine_to_cpu(view));
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
    ctx.fill_path(&bezpath_to_cpu(path));
    ctx.flush();
    ctx.render_to_pixmap(&mut target.scratch);
    target
        .scratch
        .data_as_u8_slice()
        .chunks_exact(4)
        .map(|px| px[3])
        .collect()
}

fn draw_shapes(target: &mut Target, shapes: &[OverlayShape], view: Affine) -> MoodboardResult<()> {
    let stride = target.stride();
    let full = target.full();
    clear_region(target.scratch.data_as_u8_slice_mut(), stride, full)?;
    let mut ctx = vello_cpu::RenderContext::new(target.width, target.height);
    ctx.set_transform(affine_to_cpu(view));
    for shape in shapes {
        let [r, g, b, a] = shape.rgba;
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        let path = bezpath_to_cpu(&shape.path);
        match shape.style {
            OverlayStyle::Fill => ctx.fill_path(&path),
            OverlayStyle::Stroke(width) => {
                ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
                ctx.stroke_path(&path);
            }
        }
    }
    ctx.flush();
    ctx.render_to_pixmap(&mut target.scratch);
    blend_region_in_place(
        target.pixmap.data_as_u8_slice_mut(),
        target.scratch.data_as_u8_slice(),
        stride,
        full,
        BlendMode::Normal,
    )
}

fn view_scale(view: Affine) -> f64 {
    let c = view.as_coeffs();
    c[0].hypot(c[1])
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
