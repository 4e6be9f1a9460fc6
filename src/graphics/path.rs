use kurbo::{Arc, BezPath, Ellipse, PathEl, Point, Rect, RoundedRect, RoundedRectRadii, Shape, Vec2};

use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::protocol::values::Fields;

const TOLERANCE: f64 = 0.05;

/// Build a path from `startpoint` plus `arrayofpathelements` of `f`.
pub(crate) fn parse_path(f: &Fields<'_>) -> MovingImagesResult<BezPath> {
    let mut builder = PathBuilder::default();
    if let Some(start) = f.opt_point("startpoint")? {
        builder.move_to(start);
    }
    for el in f.array("arrayofpathelements")? {
        builder.element(&f.with(el)?)?;
    }
    Ok(builder.path)
}

/// Rectangle with per-corner radii listed anti-clockwise from the bottom-right corner
/// (`[bottomright, topright, topleft, bottomleft]`) in y-up user space.
pub(crate) fn rounded_rect(rect: Rect, f: &Fields<'_>) -> MovingImagesResult<BezPath> {
    let radii = if f.has("radiuses") {
        let list = f.array("radiuses")?;
        if list.len() != 4 {
            return Err(MovingImagesError::invalid_parameter(
                "'radiuses' must list four corner radii",
            ));
        }
        let mut r = [0.0; 4];
        for (slot, v) in r.iter_mut().zip(list) {
            *slot = f.number(v)?.max(0.0);
        }
        let [br, tr, tl, bl] = r;
        // kurbo's "top" is min-y, which is the visual bottom once y points up.
        RoundedRectRadii::new(bl, br, tr, tl)
    } else {
        RoundedRectRadii::from_single_radius(f.f64("radius")?.max(0.0))
    };
    Ok(RoundedRect::from_rect(rect, radii).to_path(TOLERANCE))
}

pub(crate) fn rect_path(rect: Rect) -> BezPath {
    rect.to_path(TOLERANCE)
}

pub(crate) fn oval_path(rect: Rect) -> BezPath {
    Ellipse::from_rect(rect).to_path(TOLERANCE)
}

/// Open polyline through `points`.
pub(crate) fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut it = points.iter();
    if let Some(first) = it.next() {
        path.move_to(*first);
        for p in it {
            path.line_to(*p);
        }
    }
    path
}

#[derive(Default)]
struct PathBuilder {
    path: BezPath,
    current: Option<Point>,
    subpath_start: Option<Point>,
}

impl PathBuilder {
    fn move_to(&mut self, p: Point) {
        self.path.move_to(p);
        self.current = Some(p);
        self.subpath_start = Some(p);
    }

    fn require_current(&self, what: &str) -> MovingImagesResult<()> {
        if self.current.is_none() {
            return Err(MovingImagesError::invalid_parameter(format!(
                "'{what}' needs a current point; add a startpoint or pathmoveto"
            )));
        }
        Ok(())
    }

    fn append_closed(&mut self, shape: BezPath) {
        // Closed shapes leave the current point at their start.
        if let Some(PathEl::MoveTo(p)) = shape.elements().first() {
            self.current = Some(*p);
            self.subpath_start = Some(*p);
        }
        self.path.extend(shape);
    }

    fn element(&mut self, e: &Fields<'_>) -> MovingImagesResult<()> {
        match e.str("elementtype")? {
            "pathmoveto" => {
                let p = e.opt_point("point")?.map_or_else(|| e.point("endpoint"), Ok)?;
                self.move_to(p);
            }
            "pathlineto" => {
                self.require_current("pathlineto")?;
                let p = e.point("endpoint")?;
                self.path.line_to(p);
                self.current = Some(p);
            }
            "pathbezierto" => {
                self.require_current("pathbezierto")?;
                let p = e.point("endpoint")?;
                self.path
                    .curve_to(e.point("controlpoint1")?, e.point("controlpoint2")?, p);
                self.current = Some(p);
            }
            "pathquadraticto" => {
                self.require_current("pathquadraticto")?;
                let p = e.point("endpoint")?;
                self.path.quad_to(e.point("controlpoint1")?, p);
                self.current = Some(p);
            }
            "pathrectangle" => self.append_closed(rect_path(e.rect("rect")?)),
            "pathroundedrectangle" => self.append_closed(rounded_rect(e.rect("rect")?, e)?),
            "pathoval" => self.append_closed(oval_path(e.rect("rect")?)),
            "pathaddarc" => self.arc(e)?,
            "closesubpath" => {
                self.path.close_path();
                self.current = self.subpath_start;
            }
            other => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown path elementtype '{other}'"
                )));
            }
        }
        Ok(())
    }

    /// Angles are radians anti-clockwise from +x in y-up space.
    fn arc(&mut self, e: &Fields<'_>) -> MovingImagesResult<()> {
        let center = e.point("centerpoint")?;
        let radius = e.f64("radius")?;
        let start = e.f64("startangle")?;
        let end = e.f64("endangle")?;
        let clockwise = e.bool_or("clockwise", false)?;

        let full = std::f64::consts::TAU;
        let mut sweep = end - start;
        if clockwise {
            while sweep > 0.0 {
                sweep -= full;
            }
        } else {
            while sweep < 0.0 {
                sweep += full;
            }
        }

        let arc = Arc::new(center, Vec2::new(radius, radius), start, sweep, 0.0);
        let first = center + Vec2::from_angle(start) * radius;
        if self.current.is_some() {
            self.path.line_to(first);
        } else {
            self.move_to(first);
        }
        for el in arc.append_iter(TOLERANCE) {
            self.path.push(el);
        }
        self.current = Some(center + Vec2::from_angle(start + sweep) * radius);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/graphics/path.rs"]
mod tests;
