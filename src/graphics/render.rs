//! CPU rendering of draw trees into premultiplied frames with `vello_cpu`.
//!
//! Each leaf element is rasterized into its own full-canvas layer, then clipped, shadowed and
//! composited onto its parent with the element's blend mode and alpha. Groups render their
//! children into a fresh layer first. User space is y-up with the origin at the bottom-left;
//! paths are mapped to device space before rasterization.

use std::collections::HashMap;
use std::sync::Arc;

use kurbo::{BezPath, PathEl, Point, Rect, StrokeOpts};
use rayon::prelude::*;

use crate::foundation::core::{Affine, Color, FrameRGBA};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::graphics::blur::blur_premul;
use crate::graphics::composite::{
    BlendMode, apply_mask, composite_in_place, inverse_coverage, offset, tint,
};
use crate::graphics::draw::{DrawElement, DrawKind, Gradient, GradientStop, ImageRef, Shadow};

const STROKE_TOLERANCE: f64 = 0.05;

pub(crate) type ImageMap = HashMap<ImageRef, Arc<FrameRGBA>>;

/// Draw `element` onto `frame`.
pub(crate) fn draw(
    frame: &mut FrameRGBA,
    element: &DrawElement,
    images: &ImageMap,
) -> MovingImagesResult<()> {
    let mut raster = Rasterizer::new(frame.width, frame.height)?;
    let base = raster.base;
    raster.render_element(&mut frame.data, element, base, images)
}

/// Fill a y-up user-space path on a transparent `width`x`height` canvas.
pub(crate) fn fill_layer(
    width: u32,
    height: u32,
    path: &BezPath,
    transform: Affine,
    color: Color,
) -> MovingImagesResult<Vec<u8>> {
    let mut raster = Rasterizer::new(width, height)?;
    let device = raster.base * transform;
    Ok(raster.fill(&(device * path), color))
}

/// Draw `image` into the user-space rectangle `dest` of a transparent canvas.
pub(crate) fn image_layer(
    width: u32,
    height: u32,
    image: &FrameRGBA,
    dest: Rect,
    transform: Affine,
) -> MovingImagesResult<Vec<u8>> {
    let mut raster = Rasterizer::new(width, height)?;
    let ctm = raster.base * transform;
    raster.image(image, dest, ctm)
}

struct Rasterizer {
    width: u32,
    height: u32,
    /// Flips y-up user space into y-down device space.
    base: Affine,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
}

impl Rasterizer {
    fn new(width: u32, height: u32) -> MovingImagesResult<Self> {
        let w: u16 = width.try_into().map_err(|_| {
            MovingImagesError::operation_failed(format!("canvas width {width} exceeds 65535"))
        })?;
        let h: u16 = height.try_into().map_err(|_| {
            MovingImagesError::operation_failed(format!("canvas height {height} exceeds 65535"))
        })?;
        Ok(Self {
            width,
            height,
            base: Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, f64::from(height)]),
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
        })
    }

    fn blank(&self) -> Vec<u8> {
        vec![0u8; self.width as usize * self.height as usize * 4]
    }

    fn finish(&mut self) -> Vec<u8> {
        self.pixmap.data_as_u8_slice_mut().fill(0);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        self.pixmap.data_as_u8_slice().to_vec()
    }

    /// Rasterize a device-space path.
    fn fill(&mut self, device_path: &BezPath, color: Color) -> Vec<u8> {
        self.ctx.reset();
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        let [r, g, b, a] = color.to_rgba8();
        self.ctx
            .set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        self.ctx.fill_path(&bezpath_to_cpu(device_path));
        self.finish()
    }

    fn coverage(&mut self, device_path: &BezPath) -> Vec<u8> {
        self.fill(device_path, Color::new(1.0, 1.0, 1.0, 1.0))
    }

    /// `dest` is in user space; `ctm` maps user space to device space.
    fn image(&mut self, image: &FrameRGBA, dest: Rect, ctm: Affine) -> MovingImagesResult<Vec<u8>> {
        if image.width == 0 || image.height == 0 || dest.area() == 0.0 {
            return Ok(self.blank());
        }
        let (iw, ih) = (f64::from(image.width), f64::from(image.height));
        // Image rows run top to bottom, so image y flips into user y.
        let placement = Affine::new([
            dest.width() / iw,
            0.0,
            0.0,
            -dest.height() / ih,
            dest.x0,
            dest.y0 + dest.height(),
        ]);
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(frame_to_pixmap(image)?)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.ctx.reset();
        self.ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        self.ctx.set_transform(affine_to_cpu(ctm * placement));
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_paint(paint);
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
        Ok(self.finish())
    }

    fn render_element(
        &mut self,
        dst: &mut [u8],
        el: &DrawElement,
        parent: Affine,
        images: &ImageMap,
    ) -> MovingImagesResult<()> {
        let ctm = parent * el.transform;
        let mut layer = match &el.kind {
            DrawKind::Fill { path, color } => self.fill(&(ctm * path), *color),
            DrawKind::Stroke {
                path,
                color,
                stroke,
            } => {
                if stroke.width <= 0.0 {
                    self.blank()
                } else {
                    let outline = kurbo::stroke(
                        path.iter(),
                        stroke,
                        &StrokeOpts::default(),
                        STROKE_TOLERANCE,
                    );
                    self.fill(&(ctm * &outline), *color)
                }
            }
            DrawKind::InnerShadow { path, fill, inner } => {
                self.inner_shadow(&(ctm * path), *fill, inner)?
            }
            DrawKind::Gradient {
                gradient,
                stops,
                area,
            } => {
                let mut layer = self.gradient(gradient, stops, ctm)?;
                if let Some(area) = area {
                    let mask = self.coverage(&(ctm * area));
                    apply_mask(&mut layer, &mask)?;
                }
                layer
            }
            DrawKind::Image {
                source,
                destination,
                source_rect,
            } => {
                let image = images.get(source).ok_or_else(|| match source {
                    ImageRef::Identifier(id) => MovingImagesError::invalid_image_identifier(
                        format!("no image '{id}' in the collection"),
                    ),
                    ImageRef::Object(sel) => {
                        MovingImagesError::invalid_receiver(format!("no image source {sel}"))
                    }
                })?;
                match source_rect {
                    Some(r) => self.image(&crop(image, *r)?, *destination, ctm)?,
                    None => self.image(image, *destination, ctm)?,
                }
            }
            DrawKind::Group(children) => {
                let mut group = self.blank();
                for child in children {
                    self.render_element(&mut group, child, ctm, images)?;
                }
                group
            }
        };

        if let Some(clip) = &el.clip {
            let mask = self.coverage(&(ctm * clip));
            apply_mask(&mut layer, &mask)?;
        }
        if let Some(shadow) = &el.shadow {
            let cast = self.cast_shadow(&layer, shadow)?;
            composite_in_place(dst, &cast, BlendMode::Normal, el.alpha)?;
        }
        composite_in_place(dst, &layer, el.blend, el.alpha)
    }

    fn cast_shadow(&self, layer: &[u8], shadow: &Shadow) -> MovingImagesResult<Vec<u8>> {
        let tinted = tint(layer, shadow.color);
        let blurred = blur_premul(&tinted, self.width, self.height, shadow.blur / 2.0)?;
        Ok(offset(
            &blurred,
            self.width,
            self.height,
            shadow.offset.x.round() as i64,
            -(shadow.offset.y.round() as i64),
        ))
    }

    fn inner_shadow(
        &mut self,
        device_path: &BezPath,
        fill: Option<Color>,
        inner: &Shadow,
    ) -> MovingImagesResult<Vec<u8>> {
        let shape = self.coverage(device_path);
        let mut out = match fill {
            Some(c) => self.fill(device_path, c),
            None => self.blank(),
        };
        let outside = inverse_coverage(&shape);
        let mut cast = self.cast_shadow(&outside, inner)?;
        apply_mask(&mut cast, &shape)?;
        composite_in_place(&mut out, &cast, BlendMode::Normal, 1.0)?;
        Ok(out)
    }

    fn gradient(
        &self,
        gradient: &Gradient,
        stops: &[GradientStop],
        ctm: Affine,
    ) -> MovingImagesResult<Vec<u8>> {
        if ctm.determinant().abs() < f64::EPSILON {
            return Ok(self.blank());
        }
        let inverse = ctm.inverse();
        let mut out = self.blank();
        let row_bytes = self.width as usize * 4;
        if row_bytes == 0 {
            return Ok(out);
        }
        out.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let user = inverse * Point::new(x as f64 + 0.5, y as f64 + 0.5);
                    if let Some(t) = gradient_param(gradient, user) {
                        px.copy_from_slice(&color_at(stops, t).to_premul().to_array());
                    }
                }
            });
        Ok(out)
    }
}

/// Gradient parameter at `p`, clamped to `0..=1`; `None` where nothing is painted.
fn gradient_param(gradient: &Gradient, p: Point) -> Option<f64> {
    match *gradient {
        Gradient::Linear { start, end } => {
            let d = end - start;
            let len2 = d.hypot2();
            if len2 == 0.0 {
                return None;
            }
            Some(((p - start).dot(d) / len2).clamp(0.0, 1.0))
        }
        Gradient::Radial { c0, r0, c1, r1 } => {
            let cd = c1 - c0;
            let pd = p - c0;
            let dr = r1 - r0;
            let a = cd.hypot2() - dr * dr;
            let b = pd.dot(cd) + r0 * dr;
            let c = pd.hypot2() - r0 * r0;
            let radius_ok = |t: f64| r0 + t * dr >= 0.0;
            let t = if a.abs() < 1e-12 {
                if b.abs() < 1e-12 {
                    return None;
                }
                Some(c / (2.0 * b)).filter(|&t| radius_ok(t))
            } else {
                let disc = b * b - a * c;
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                let (t_hi, t_lo) = {
                    let t1 = (b + root) / a;
                    let t2 = (b - root) / a;
                    (t1.max(t2), t1.min(t2))
                };
                [t_hi, t_lo].into_iter().find(|&t| radius_ok(t))
            }?;
            Some(t.clamp(0.0, 1.0))
        }
    }
}

/// Straight-alpha interpolation between the surrounding stops.
fn color_at(stops: &[GradientStop], t: f64) -> Color {
    let Some(first) = stops.first() else {
        return Color::CLEAR;
    };
    if t <= first.location {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if t <= b.location {
            let span = b.location - a.location;
            let k = if span > 0.0 { (t - a.location) / span } else { 1.0 };
            let mix = |x: f64, y: f64| x + (y - x) * k;
            return Color::new(
                mix(a.color.red, b.color.red),
                mix(a.color.green, b.color.green),
                mix(a.color.blue, b.color.blue),
                mix(a.color.alpha, b.color.alpha),
            );
        }
    }
    stops.last().map_or(Color::CLEAR, |s| s.color)
}

/// Sub-image for a y-up source rectangle in image pixels.
fn crop(image: &FrameRGBA, r: Rect) -> MovingImagesResult<FrameRGBA> {
    let bounds = Rect::new(0.0, 0.0, f64::from(image.width), f64::from(image.height));
    let r = r.intersect(bounds).round();
    if r.area() <= 0.0 {
        return Err(MovingImagesError::invalid_parameter(
            "'sourcerectangle' does not overlap the image",
        ));
    }
    let (x0, w) = (r.x0 as usize, r.width() as usize);
    let top = image.height as usize - r.y1 as usize;
    let h = r.height() as usize;
    let row_bytes = image.width as usize * 4;
    let mut data = Vec::with_capacity(w * h * 4);
    for row in image.data.chunks_exact(row_bytes).skip(top).take(h) {
        data.extend_from_slice(&row[x0 * 4..(x0 + w) * 4]);
    }
    FrameRGBA::from_premul(w as u32, h as u32, data)
}

fn frame_to_pixmap(frame: &FrameRGBA) -> MovingImagesResult<vello_cpu::Pixmap> {
    let w: u16 = frame
        .width
        .try_into()
        .map_err(|_| MovingImagesError::operation_failed("image width exceeds u16"))?;
    let h: u16 = frame
        .height
        .try_into()
        .map_err(|_| MovingImagesError::operation_failed("image height exceeds u16"))?;
    let mut may_have_opacities = false;
    let pixels = frame
        .data
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
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

#[cfg(test)]
#[path = "../../tests/unit/graphics/render.rs"]
mod tests;
