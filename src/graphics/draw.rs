//! Typed draw-instruction tree parsed from `drawinstructions`.

use kurbo::{BezPath, Cap, Join, Point, Rect, Stroke, Vec2};

use crate::foundation::core::{Affine, Color};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::graphics::composite::BlendMode;
use crate::graphics::path;
use crate::protocol::command::parse_selector;
use crate::protocol::values::Fields;
use crate::registry::Selector;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Shadow {
    /// Offset in device pixels, y-up.
    pub(crate) offset: Vec2,
    pub(crate) blur: f64,
    pub(crate) color: Color,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ImageRef {
    Identifier(String),
    Object(Selector),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GradientStop {
    pub(crate) location: f64,
    pub(crate) color: Color,
}

#[derive(Clone, Debug)]
pub(crate) enum Gradient {
    Linear {
        start: Point,
        end: Point,
    },
    /// Two-point conical gradient from circle (c0, r0) to circle (c1, r1).
    Radial {
        c0: Point,
        r0: f64,
        c1: Point,
        r1: f64,
    },
}

#[derive(Clone, Debug)]
pub(crate) enum DrawKind {
    Fill {
        path: BezPath,
        color: Color,
    },
    Stroke {
        path: BezPath,
        color: Color,
        stroke: Stroke,
    },
    InnerShadow {
        path: BezPath,
        fill: Option<Color>,
        inner: Shadow,
    },
    Gradient {
        gradient: Gradient,
        stops: Vec<GradientStop>,
        /// Area to paint; the whole canvas when absent.
        area: Option<BezPath>,
    },
    Image {
        source: ImageRef,
        destination: Rect,
        source_rect: Option<Rect>,
    },
    Group(Vec<DrawElement>),
}

#[derive(Clone, Debug)]
pub(crate) struct DrawElement {
    pub(crate) kind: DrawKind,
    pub(crate) transform: Affine,
    pub(crate) blend: BlendMode,
    pub(crate) alpha: f64,
    pub(crate) clip: Option<BezPath>,
    pub(crate) shadow: Option<Shadow>,
}

impl DrawElement {
    /// Every image the tree draws, in drawing order.
    pub(crate) fn image_refs(&self) -> Vec<&ImageRef> {
        let mut out = Vec::new();
        self.collect_images(&mut out);
        out
    }

    fn collect_images<'a>(&'a self, out: &mut Vec<&'a ImageRef>) {
        match &self.kind {
            DrawKind::Image { source, .. } => out.push(source),
            DrawKind::Group(children) => {
                for c in children {
                    c.collect_images(out);
                }
            }
            _ => {}
        }
    }
}

/// Parse one element and its children. Nesting deeper than `max_depth` is rejected.
pub(crate) fn parse_element(
    f: &Fields<'_>,
    depth: usize,
    max_depth: usize,
) -> MovingImagesResult<DrawElement> {
    if depth >= max_depth {
        return Err(MovingImagesError::invalid_parameter(format!(
            "draw instructions nest deeper than {max_depth} levels"
        )));
    }

    let element_type = f.str("elementtype")?;
    let kind = match element_type {
        "fillrectangle" => fill(f, path::rect_path(f.rect("rect")?))?,
        "strokerectangle" => stroke(f, path::rect_path(f.rect("rect")?))?,
        "filloval" => fill(f, path::oval_path(f.rect("rect")?))?,
        "strokeoval" => stroke(f, path::oval_path(f.rect("rect")?))?,
        "fillroundedrectangle" => fill(f, path::rounded_rect(f.rect("rect")?, f)?)?,
        "strokeroundedrectangle" => stroke(f, path::rounded_rect(f.rect("rect")?, f)?)?,
        "drawline" => {
            let line = f.nested("line")?;
            let points = [line.point("startpoint")?, line.point("endpoint")?];
            stroke(f, path::polyline(&points))?
        }
        "drawlines" => {
            let points = f
                .array("points")?
                .iter()
                .map(|p| {
                    let p = f.with(p)?;
                    Ok(Point::new(p.f64("x")?, p.f64("y")?))
                })
                .collect::<MovingImagesResult<Vec<_>>>()?;
            if points.len() < 2 {
                return Err(MovingImagesError::invalid_parameter(
                    "'points' needs at least two points",
                ));
            }
            stroke(f, path::polyline(&points))?
        }
        "fillpath" => fill(f, path::parse_path(f)?)?,
        "strokepath" => stroke(f, path::parse_path(f)?)?,
        "fillinnershadowpath" => DrawKind::InnerShadow {
            path: path::parse_path(f)?,
            fill: f.opt_color("fillcolor")?,
            inner: parse_shadow(&f.nested("innershadow")?)?,
        },
        "lineargradientfill" => {
            let line = f.nested("line")?;
            DrawKind::Gradient {
                gradient: Gradient::Linear {
                    start: line.point("startpoint")?,
                    end: line.point("endpoint")?,
                },
                stops: parse_stops(f)?,
                area: gradient_area(f)?,
            }
        }
        "radialgradientfill" => DrawKind::Gradient {
            gradient: Gradient::Radial {
                c0: f.point("centerpoint")?,
                r0: f.f64("radius")?.max(0.0),
                c1: f.point("centerpoint2")?,
                r1: f.f64("radius2")?.max(0.0),
            },
            stops: parse_stops(f)?,
            area: gradient_area(f)?,
        },
        "drawimage" => DrawKind::Image {
            source: parse_image_ref(f)?,
            destination: f.rect("destinationrectangle")?,
            source_rect: f.opt_rect("sourcerectangle")?,
        },
        "arrayofelements" => DrawKind::Group(
            f.array("arrayofelements")?
                .iter()
                .map(|child| parse_element(&f.with(child)?, depth + 1, max_depth))
                .collect::<MovingImagesResult<Vec<_>>>()?,
        ),
        "drawbasicstring" => {
            return Err(MovingImagesError::operation_failed(
                "text drawing is not supported",
            ));
        }
        other => {
            return Err(MovingImagesError::invalid_parameter(format!(
                "unknown elementtype '{other}'"
            )));
        }
    };

    Ok(DrawElement {
        kind,
        transform: f.transform()?,
        blend: f
            .opt_str("blendmode")?
            .map(str::parse)
            .transpose()?
            .unwrap_or_default(),
        alpha: f.opt_f64("alpha")?.unwrap_or(1.0).clamp(0.0, 1.0),
        clip: f
            .opt_nested("clippingpath")?
            .map(|c| path::parse_path(&c))
            .transpose()?,
        shadow: f.opt_nested("shadow")?.map(|s| parse_shadow(&s)).transpose()?,
    })
}

pub(crate) fn parse_image_ref(f: &Fields<'_>) -> MovingImagesResult<ImageRef> {
    if let Some(id) = f.opt_str("imageidentifier")? {
        return Ok(ImageRef::Identifier(id.to_owned()));
    }
    match f.opt_nested("sourceobject")? {
        Some(obj) => Ok(ImageRef::Object(parse_selector(&obj)?)),
        None => Err(MovingImagesError::invalid_parameter(
            "expected 'imageidentifier' or 'sourceobject'",
        )),
    }
}

fn fill(f: &Fields<'_>, path: BezPath) -> MovingImagesResult<DrawKind> {
    Ok(DrawKind::Fill {
        path,
        color: f.opt_color("fillcolor")?.unwrap_or(Color::BLACK),
    })
}

fn stroke(f: &Fields<'_>, path: BezPath) -> MovingImagesResult<DrawKind> {
    let width = f.opt_f64("linewidth")?.unwrap_or(1.0);
    if !(width.is_finite() && width >= 0.0) {
        return Err(MovingImagesError::invalid_parameter(
            "'linewidth' must be a non-negative number",
        ));
    }
    let mut stroke = Stroke::new(width);
    if let Some(cap) = f.opt_str("linecap")? {
        stroke = stroke.with_caps(match cg_name(cap, "kCGLineCap").as_str() {
            "butt" => Cap::Butt,
            "round" => Cap::Round,
            "square" => Cap::Square,
            _ => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown linecap '{cap}'"
                )));
            }
        });
    }
    if let Some(join) = f.opt_str("linejoin")? {
        stroke = stroke.with_join(match cg_name(join, "kCGLineJoin").as_str() {
            "miter" => Join::Miter,
            "round" => Join::Round,
            "bevel" => Join::Bevel,
            _ => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown linejoin '{join}'"
                )));
            }
        });
    }
    if let Some(limit) = f.opt_f64("miter")? {
        stroke = stroke.with_miter_limit(limit);
    }
    Ok(DrawKind::Stroke {
        path,
        color: f.opt_color("strokecolor")?.unwrap_or(Color::BLACK),
        stroke,
    })
}

/// `kCGLineCapRound` and `round` name the same thing.
fn cg_name(s: &str, prefix: &str) -> String {
    s.strip_prefix(prefix).unwrap_or(s).to_ascii_lowercase()
}

fn parse_shadow(s: &Fields<'_>) -> MovingImagesResult<Shadow> {
    let offset = match s.opt_nested("offset")? {
        Some(o) => Vec2::new(o.f64("width")?, o.f64("height")?),
        None => Vec2::new(
            s.opt_f64("width")?.unwrap_or(0.0),
            s.opt_f64("height")?.unwrap_or(0.0),
        ),
    };
    Ok(Shadow {
        offset,
        blur: s.opt_f64("blur")?.unwrap_or(0.0).max(0.0),
        color: s
            .opt_color("fillcolor")?
            .unwrap_or(Color::new(0.0, 0.0, 0.0, 1.0 / 3.0)),
    })
}

fn parse_stops(f: &Fields<'_>) -> MovingImagesResult<Vec<GradientStop>> {
    let colors = f.array("arrayofcolors")?;
    if colors.is_empty() {
        return Err(MovingImagesError::invalid_parameter(
            "'arrayofcolors' must not be empty",
        ));
    }
    let locations = f.opt_array("arrayoflocations")?;
    if !locations.is_empty() && locations.len() != colors.len() {
        return Err(MovingImagesError::invalid_parameter(
            "'arrayoflocations' and 'arrayofcolors' differ in length",
        ));
    }
    let last = (colors.len().max(2) - 1) as f64;
    colors
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let c = f.with(c)?;
            let color = Color::new(
                c.f64("red")?,
                c.f64("green")?,
                c.f64("blue")?,
                c.opt_f64("alpha")?.unwrap_or(1.0),
            );
            let location = match locations.get(i) {
                Some(l) => f.number(l)?,
                None => i as f64 / last,
            };
            Ok(GradientStop {
                location: location.clamp(0.0, 1.0),
                color,
            })
        })
        .collect()
}

fn gradient_area(f: &Fields<'_>) -> MovingImagesResult<Option<BezPath>> {
    if f.has("arrayofpathelements") {
        return path::parse_path(f).map(Some);
    }
    Ok(None)
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/draw.rs"]
mod tests;
