//! Vector paths and contour assembly from boundary edges.
//!
//! The assembler walks the edges left in an [`EdgeSet`] into closed
//! polygons. Consecutive edges in the same direction are merged, so a path
//! only has a vertex where the outline actually turns and its size follows
//! the outline's complexity rather than the pixel count.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::geometry::{Direction, RectI, VecI};
use crate::selection::edges::EdgeSet;

/// One path command in document pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(VecI),
    LineTo(VecI),
    Close,
}

/// How overlapping sub-paths combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillRule {
    /// Each boundary crossing toggles inside/outside; nested paths are holes.
    #[default]
    EvenOdd,
    /// Non-zero winding number.
    Winding,
}

/// Ordered sub-paths of move/line commands.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorPath {
    commands: Vec<PathCommand>,
    fill_rule: FillRule,
}

impl VectorPath {
    /// Empty path with the even-odd fill rule.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fill_rule(fill_rule: FillRule) -> Self {
        Self {
            commands: Vec::new(),
            fill_rule,
        }
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn move_to(&mut self, point: VecI) {
        self.commands.push(PathCommand::MoveTo(point));
    }

    pub fn line_to(&mut self, point: VecI) {
        self.commands.push(PathCommand::LineTo(point));
    }

    pub fn close(&mut self) {
        self.commands.push(PathCommand::Close);
    }

    /// Vertex lists of each sub-path. Sub-paths are implicitly closed.
    pub fn subpaths(&self) -> Vec<Vec<VecI>> {
        let mut result: Vec<Vec<VecI>> = Vec::new();
        let mut current: Vec<VecI> = Vec::new();
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    if !current.is_empty() {
                        result.push(std::mem::take(&mut current));
                    }
                    current.push(p);
                }
                PathCommand::LineTo(p) => current.push(p),
                PathCommand::Close => {
                    if !current.is_empty() {
                        result.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
        result
    }

    /// Tight integer bounds of all vertices.
    pub fn bounds(&self) -> Option<RectI> {
        let mut points = self.commands.iter().filter_map(|c| match *c {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(p),
            PathCommand::Close => None,
        });
        let first = points.next()?;
        let (mut min, mut max) = (first, first);
        for p in points {
            min = VecI::new(min.x.min(p.x), min.y.min(p.y));
            max = VecI::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(RectI::from_sides(min.x, min.y, max.x, max.y))
    }

    /// Point-in-path test under the path's fill rule (ray cast towards +x).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut winding = 0i32;
        let mut crossings = 0u32;
        for polygon in self.subpaths() {
            for (a, b) in segments(&polygon) {
                let (ay, by) = (a.y as f64, b.y as f64);
                if (ay <= y) == (by <= y) {
                    continue;
                }
                let t = (y - ay) / (by - ay);
                let cross_x = a.x as f64 + t * (b.x as f64 - a.x as f64);
                if cross_x > x {
                    crossings += 1;
                    winding += if by > ay { 1 } else { -1 };
                }
            }
        }
        match self.fill_rule {
            FillRule::EvenOdd => crossings % 2 == 1,
            FillRule::Winding => winding != 0,
        }
    }

    /// Copy of the path moved by `offset`.
    pub fn translated(&self, offset: VecI) -> VectorPath {
        let commands = self
            .commands
            .iter()
            .map(|c| match *c {
                PathCommand::MoveTo(p) => PathCommand::MoveTo(p + offset),
                PathCommand::LineTo(p) => PathCommand::LineTo(p + offset),
                PathCommand::Close => PathCommand::Close,
            })
            .collect();
        VectorPath {
            commands,
            fill_rule: self.fill_rule,
        }
    }

    /// Convert to SVG path data.
    pub fn to_svg_path(&self) -> String {
        let mut path = String::new();
        for command in &self.commands {
            match command {
                PathCommand::MoveTo(p) => path.push_str(&format!("M {},{} ", p.x, p.y)),
                PathCommand::LineTo(p) => path.push_str(&format!("L {},{} ", p.x, p.y)),
                PathCommand::Close => path.push_str("Z "),
            }
        }
        path.trim_end().to_string()
    }

    /// Flat array: [num_contours, len1, x1, y1, x2, y2, ..., len2, ...]
    pub fn to_flat(&self) -> Vec<f32> {
        let polygons = self.subpaths();
        let mut result = Vec::new();
        result.push(polygons.len() as f32);
        for polygon in polygons {
            result.push(polygon.len() as f32);
            for p in polygon {
                result.push(p.x as f32);
                result.push(p.y as f32);
            }
        }
        result
    }

    /// Rasterize pixel centres: 255 = inside, 0 = outside.
    pub fn to_mask(&self, width: usize, height: usize) -> Vec<u8> {
        let mut mask = vec![0u8; width * height];
        let polygons = self.subpaths();
        let mut crossings: Vec<(f64, i32)> = Vec::new();

        for y in 0..height {
            let cy = y as f64 + 0.5;
            crossings.clear();
            for polygon in &polygons {
                for (a, b) in segments(polygon) {
                    let (ay, by) = (a.y as f64, b.y as f64);
                    if (ay <= cy) == (by <= cy) {
                        continue;
                    }
                    let t = (cy - ay) / (by - ay);
                    let x = a.x as f64 + t * (b.x as f64 - a.x as f64);
                    crossings.push((x, if by > ay { 1 } else { -1 }));
                }
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let row = &mut mask[y * width..(y + 1) * width];
            let mut winding = 0;
            let mut parity = false;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                parity = !parity;
                let inside = match self.fill_rule {
                    FillRule::EvenOdd => parity,
                    FillRule::Winding => winding != 0,
                };
                if !inside {
                    continue;
                }
                // pixels whose centre lies in [left, right)
                let left = (pair[0].0 - 0.5).ceil().max(0.0) as usize;
                let right = ((pair[1].0 - 0.5).ceil().max(0.0) as usize).min(width);
                for value in row.iter_mut().take(right).skip(left) {
                    *value = 255;
                }
            }
        }
        mask
    }
}

/// Closing segments of a polygon, including last -> first.
fn segments(polygon: &[VecI]) -> impl Iterator<Item = (VecI, VecI)> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

/// Walk the remaining edges into closed sub-paths, consuming the set.
///
/// Each sub-path starts at a corner and gets one vertex per direction
/// change. At a corner shared by two outlines the walk turns right before
/// it turns left, so the choice depends only on the local geometry.
pub fn build_contour(mut edges: EdgeSet) -> VectorPath {
    let mut path = VectorPath::new();

    while let Some((first, direction)) = edges.pop() {
        // back up to the corner where this straight run begins
        let mut start = first.start;
        while let Some(previous) = edges.remove_at(start - direction.vector(), direction) {
            start = previous.start;
        }

        path.move_to(start);
        let mut cursor = first.end;
        let mut direction = direction;
        loop {
            while let Some(next) = edges.remove_at(cursor, direction) {
                cursor = next.end;
            }
            if cursor == start {
                path.close();
                break;
            }
            path.line_to(cursor);
            let turns: [Direction; 2] = [direction.turn_right(), direction.turn_left()];
            match edges.remove_any_at(cursor, &turns) {
                Some((edge, turned)) => {
                    cursor = edge.end;
                    direction = turned;
                }
                None => {
                    warn!("contour chain ended at {cursor} before returning to {start}");
                    break;
                }
            }
        }
    }

    path
}
