//! Vector paths painted by the page content stream

use super::{Color, Page};
use crate::error::Result;
use crate::geometry::{Matrix, Point, Rect};
use lopdf::content::Content;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Path segment in user space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathItem {
    Move(Point),
    Line(Point, Point),
    /// Start, two control points, end
    Curve(Point, Point, Point, Point),
    /// Axis-aligned rectangle from `re` under an unrotated transform
    Rect(Rect),
    Close,
}

/// A path together with how it was painted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub items: Vec<PathItem>,
    /// Bounds of all path points
    pub rect: Rect,
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    /// Line width scaled into user space
    pub width: f32,
    /// Filled with the even-odd rule
    pub even_odd: bool,
}

#[derive(Debug, Clone)]
struct PaintState {
    ctm: Matrix,
    fill: Color,
    stroke: Color,
    width: f32,
}

#[derive(Default)]
struct PathBuilder {
    items: Vec<PathItem>,
    bounds: Option<Rect>,
    current: Option<Point>,
    start: Option<Point>,
}

impl PathBuilder {
    fn include(&mut self, p: Point) {
        self.bounds = Some(match self.bounds {
            Some(b) => b.include_point(p),
            None => Rect::from_point(p),
        });
    }

    fn move_to(&mut self, p: Point) {
        self.include(p);
        self.items.push(PathItem::Move(p));
        self.current = Some(p);
        self.start = Some(p);
    }

    fn line_to(&mut self, p: Point) {
        let from = self.current.unwrap_or(p);
        self.include(p);
        self.items.push(PathItem::Line(from, p));
        self.current = Some(p);
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        let from = self.current.unwrap_or(c1);
        for point in [c1, c2, p] {
            self.include(point);
        }
        self.items.push(PathItem::Curve(from, c1, c2, p));
        self.current = Some(p);
    }

    fn close(&mut self) {
        if !self.items.is_empty() {
            self.items.push(PathItem::Close);
            self.current = self.start;
        }
    }

    fn rect(&mut self, corners: [Point; 4]) {
        let [p0, p1, p2, p3] = corners;
        let axis_aligned = (p0.y - p1.y).abs() < 1e-4 && (p1.x - p2.x).abs() < 1e-4;
        if axis_aligned {
            let rect = Rect::new(p0.x, p0.y, p2.x, p2.y);
            for point in corners {
                self.include(point);
            }
            self.items.push(PathItem::Rect(rect));
            self.current = Some(p0);
            self.start = Some(p0);
        } else {
            self.move_to(p0);
            self.line_to(p1);
            self.line_to(p2);
            self.line_to(p3);
            self.close();
        }
    }
}

impl<'a> Page<'a> {
    /// Painted paths of the page's own content stream, in painting order.
    /// Paths ended with `n` and clipping paths are skipped.
    pub fn drawings(&self) -> Result<Vec<Drawing>> {
        let doc = self.lo()?;
        let content = Content::decode(&doc.get_page_content(self.id)?)?;

        let mut drawings = Vec::new();
        let mut stack: Vec<PaintState> = Vec::new();
        let mut gs = PaintState {
            ctm: Matrix::identity(),
            fill: Color::black(),
            stroke: Color::black(),
            width: 1.0,
        };
        let mut path = PathBuilder::default();

        for op in &content.operations {
            let operands = &op.operands;
            let nums: Vec<f32> = operands.iter().filter_map(|o| o.as_float().ok()).collect();
            let point = |i: usize, ctm: &Matrix| {
                ctm.apply(Point::new(
                    nums.get(i).copied().unwrap_or(0.0),
                    nums.get(i + 1).copied().unwrap_or(0.0),
                ))
            };
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "w" => gs.width = nums.first().copied().unwrap_or(1.0),
                "G" | "RG" | "K" | "SC" | "SCN" => {
                    if let Some(color) = Color::from_components(&nums) {
                        gs.stroke = color;
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = Color::from_components(&nums) {
                        gs.fill = color;
                    }
                }
                "m" => path.move_to(point(0, &gs.ctm)),
                "l" => path.line_to(point(0, &gs.ctm)),
                "c" => path.curve_to(point(0, &gs.ctm), point(2, &gs.ctm), point(4, &gs.ctm)),
                "v" => {
                    let c1 = path.current.unwrap_or_else(|| point(0, &gs.ctm));
                    path.curve_to(c1, point(0, &gs.ctm), point(2, &gs.ctm));
                }
                "y" => {
                    let end = point(2, &gs.ctm);
                    path.curve_to(point(0, &gs.ctm), end, end);
                }
                "re" if nums.len() == 4 => {
                    let (x, y, w, h) = (nums[0], nums[1], nums[2], nums[3]);
                    path.rect([
                        gs.ctm.apply(Point::new(x, y)),
                        gs.ctm.apply(Point::new(x + w, y)),
                        gs.ctm.apply(Point::new(x + w, y + h)),
                        gs.ctm.apply(Point::new(x, y + h)),
                    ]);
                }
                "h" => path.close(),
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    let operator = op.operator.as_str();
                    if matches!(operator, "s" | "b" | "b*") {
                        path.close();
                    }
                    let built = std::mem::take(&mut path);
                    let Some(rect) = built.bounds else {
                        continue;
                    };
                    let strokes = matches!(operator, "S" | "s" | "B" | "B*" | "b" | "b*");
                    let fills = !matches!(operator, "S" | "s");
                    drawings.push(Drawing {
                        items: built.items,
                        rect,
                        fill: fills.then_some(gs.fill),
                        stroke: strokes.then_some(gs.stroke),
                        width: gs.width * scale_of(&gs.ctm),
                        even_odd: operator.ends_with('*'),
                    });
                }
                "n" => path = PathBuilder::default(),
                _ => {}
            }
        }
        debug!(page = self.index, drawings = drawings.len(), "collected drawings");
        Ok(drawings)
    }
}

/// Uniform scale factor of a transform
fn scale_of(m: &Matrix) -> f32 {
    (m.a * m.d - m.b * m.c).abs().sqrt()
}
