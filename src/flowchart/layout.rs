//! Grid layout and orthogonal edge routing.
//!
//! Symbols are placed on an integer grid by walking the flow from its root:
//! every connection puts its target in the neighbouring cell on the side it
//! leaves from, sliding down when that cell is taken. Occupied columns and
//! rows are then sized to their largest symbol and separated by
//! `line-length`.

use std::collections::{BTreeMap, HashSet, VecDeque};

use unicode_width::UnicodeWidthStr;

use super::style::StyleConfig;
use super::types::{Diagram, Direction, Symbol, SymbolKind};

/// Blank border around the drawing.
pub const PADDING: f32 = 20.0;
const CHAR_WIDTH_RATIO: f32 = 0.6;
const LINE_HEIGHT_RATIO: f32 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn step(self, direction: Direction, distance: f32) -> Self {
        match direction {
            Direction::Top => Self::new(self.x, self.y - distance),
            Direction::Bottom => Self::new(self.x, self.y + distance),
            Direction::Left => Self::new(self.x - distance, self.y),
            Direction::Right => Self::new(self.x + distance, self.y),
        }
    }

    fn approx_eq(self, other: Self) -> bool {
        (self.x - other.x).abs() < 0.01 && (self.y - other.y).abs() < 0.01
    }
}

/// A symbol's box; `index` points into [`Diagram::symbols`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSymbol {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PlacedSymbol {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Midpoint of the given side.
    pub fn port(&self, side: Direction) -> Point {
        let center = self.center();
        match side {
            Direction::Top => Point::new(center.x, self.y),
            Direction::Bottom => Point::new(center.x, self.bottom()),
            Direction::Left => Point::new(self.x, center.y),
            Direction::Right => Point::new(self.right(), center.y),
        }
    }
}

/// A routed connection; `connection` points into [`Diagram::connections`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedEdge {
    pub connection: usize,
    pub from: usize,
    pub to: usize,
    pub exit: Direction,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub symbols: Vec<PlacedSymbol>,
    pub edges: Vec<PlacedEdge>,
    pub width: f32,
    pub height: f32,
}

/// Compute geometry for every symbol and connection of `diagram`.
pub fn layout_diagram(diagram: &Diagram, style: &StyleConfig) -> Layout {
    let sizes: Vec<(f32, f32)> = diagram
        .symbols()
        .iter()
        .map(|symbol| symbol_size(symbol, style))
        .collect();
    let cells = assign_cells(diagram);
    let mut symbols = place_symbols(&cells, &sizes, style.line_length);

    let gap = style.line_length / 2.0;
    let mut edges: Vec<PlacedEdge> = diagram
        .connections()
        .iter()
        .enumerate()
        .filter_map(|(connection, edge)| {
            let from = diagram.symbol_index(&edge.from)?;
            let to = diagram.symbol_index(&edge.to)?;
            let exit = edge.exit_direction();
            Some(PlacedEdge {
                connection,
                from,
                to,
                exit,
                points: route_edge(&symbols[from], &symbols[to], exit, gap),
            })
        })
        .collect();

    let (width, height) = fit_to_origin(&mut symbols, &mut edges, style);
    Layout {
        symbols,
        edges,
        width,
        height,
    }
}

/// Estimated rendered width of `text` at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let columns = text.width() as f32;
    columns * font_size * CHAR_WIDTH_RATIO
}

fn symbol_size(symbol: &Symbol, style: &StyleConfig) -> (f32, f32) {
    let font_size = style
        .resolve(symbol.kind, symbol.flowstate.as_deref())
        .font_size;
    let margin = style.text_margin;
    let width = text_width(&symbol.label, font_size) + 2.0 * margin;
    let height = font_size.mul_add(LINE_HEIGHT_RATIO, 2.0 * margin);
    match symbol.kind {
        SymbolKind::Start | SymbolKind::End => (width + margin, height),
        SymbolKind::Operation | SymbolKind::Parallel => (width, height),
        // room for the slanted sides
        SymbolKind::InputOutput => (width + height, height),
        SymbolKind::Subroutine => (2.0f32.mul_add(margin, width), height),
        SymbolKind::Condition => (width * 1.6, height * 1.8),
    }
}

fn assign_cells(diagram: &Diagram) -> Vec<(i32, i32)> {
    let count = diagram.symbols().len();
    let mut cells: Vec<Option<(i32, i32)>> = vec![None; count];
    let mut occupied: HashSet<(i32, i32)> = HashSet::new();

    // Unreachable symbols start a fresh column to the right.
    for seed in diagram.root().into_iter().chain(0..count) {
        if cells[seed].is_some() {
            continue;
        }
        let column = occupied.iter().map(|(c, _)| c + 1).max().unwrap_or(0);
        let row = occupied.iter().map(|(_, r)| *r).min().unwrap_or(0);
        cells[seed] = Some((column, row));
        occupied.insert((column, row));

        let mut queue = VecDeque::from([seed]);
        while let Some(current) = queue.pop_front() {
            let Some((column, row)) = cells[current] else {
                continue;
            };
            for (_, connection) in diagram.outgoing(&diagram.symbols()[current].id) {
                let Some(target) = diagram.symbol_index(&connection.to) else {
                    continue;
                };
                if cells[target].is_some() {
                    continue;
                }
                let (dc, dr) = connection.exit_direction().delta();
                let mut cell = (column + dc, row + dr);
                while occupied.contains(&cell) {
                    cell.1 += 1;
                }
                cells[target] = Some(cell);
                occupied.insert(cell);
                queue.push_back(target);
            }
        }
    }

    cells.into_iter().map(Option::unwrap_or_default).collect()
}

fn place_symbols(cells: &[(i32, i32)], sizes: &[(f32, f32)], spacing: f32) -> Vec<PlacedSymbol> {
    let columns = track_offsets(
        cells.iter().map(|cell| cell.0),
        sizes.iter().map(|size| size.0),
        spacing,
    );
    let rows = track_offsets(
        cells.iter().map(|cell| cell.1),
        sizes.iter().map(|size| size.1),
        spacing,
    );

    cells
        .iter()
        .zip(sizes)
        .enumerate()
        .map(|(index, (&(column, row), &(width, height)))| {
            let (col_start, col_size) = columns[&column];
            let (row_start, row_size) = rows[&row];
            PlacedSymbol {
                index,
                x: col_start + (col_size - width) / 2.0,
                y: row_start + (row_size - height) / 2.0,
                width,
                height,
            }
        })
        .collect()
}

/// Start offset and extent of every occupied track; empty tracks collapse.
fn track_offsets(
    coords: impl Iterator<Item = i32>,
    extents: impl Iterator<Item = f32>,
    spacing: f32,
) -> BTreeMap<i32, (f32, f32)> {
    let mut sizes: BTreeMap<i32, f32> = BTreeMap::new();
    for (coord, extent) in coords.zip(extents) {
        let size = sizes.entry(coord).or_insert(0.0);
        *size = size.max(extent);
    }
    let mut offset = 0.0;
    sizes
        .into_iter()
        .map(|(coord, size)| {
            let start = offset;
            offset += size + spacing;
            (coord, (start, size))
        })
        .collect()
}

fn route_edge(from: &PlacedSymbol, to: &PlacedSymbol, exit: Direction, gap: f32) -> Vec<Point> {
    let start = from.port(exit);
    let stub = start.step(exit, gap);

    let points = if to.y >= from.bottom() {
        let end = to.port(Direction::Top);
        elbow(start, stub, exit, end.step(Direction::Top, gap), end)
    } else if to.bottom() <= from.y && exit == Direction::Top {
        let end = to.port(Direction::Bottom);
        elbow(start, stub, exit, end.step(Direction::Bottom, gap), end)
    } else if to.bottom() <= from.y {
        // Back edge: go around the outside and come in from the side.
        let side = if exit == Direction::Left {
            Direction::Left
        } else {
            Direction::Right
        };
        let end = to.port(side);
        let outer_x = if side == Direction::Left {
            from.x.min(to.x) - gap
        } else {
            from.right().max(to.right()) + gap
        };
        vec![
            start,
            stub,
            Point::new(outer_x, stub.y),
            Point::new(outer_x, end.y),
            end,
        ]
    } else {
        let side = if to.center().x >= from.center().x {
            Direction::Left
        } else {
            Direction::Right
        };
        let end = to.port(side);
        elbow(start, stub, exit, end.step(side, gap), end)
    };
    simplify(points)
}

fn elbow(start: Point, stub: Point, exit: Direction, approach: Point, end: Point) -> Vec<Point> {
    let corner = match exit {
        Direction::Top | Direction::Bottom => Point::new(approach.x, stub.y),
        Direction::Left | Direction::Right => Point::new(stub.x, approach.y),
    };
    vec![start, stub, corner, approach, end]
}

/// Drop repeated points and the middle of straight runs.
fn simplify(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        if out.last().is_some_and(|last| last.approx_eq(point)) {
            continue;
        }
        let straight = match out.as_slice() {
            [.., a, b] => {
                ((a.x - b.x).abs() < 0.01 && (b.x - point.x).abs() < 0.01)
                    || ((a.y - b.y).abs() < 0.01 && (b.y - point.y).abs() < 0.01)
            }
            _ => false,
        };
        if straight {
            out.pop();
        }
        out.push(point);
    }
    out
}

/// Shift everything so the drawing starts at `PADDING + (x, y)`; returns the canvas size.
fn fit_to_origin(
    symbols: &mut [PlacedSymbol],
    edges: &mut [PlacedEdge],
    style: &StyleConfig,
) -> (f32, f32) {
    if symbols.is_empty() {
        return (2.0f32.mul_add(PADDING, style.x), 2.0f32.mul_add(PADDING, style.y));
    }

    let mut min = Point::new(f32::MAX, f32::MAX);
    let mut max = Point::new(f32::MIN, f32::MIN);
    let corners = symbols
        .iter()
        .flat_map(|s| [Point::new(s.x, s.y), Point::new(s.right(), s.bottom())]);
    let bends = edges.iter().flat_map(|edge| edge.points.iter().copied());
    for point in corners.chain(bends) {
        min.x = min.x.min(point.x);
        min.y = min.y.min(point.y);
        max.x = max.x.max(point.x);
        max.y = max.y.max(point.y);
    }

    let dx = PADDING + style.x - min.x;
    let dy = PADDING + style.y - min.y;
    for symbol in symbols.iter_mut() {
        symbol.x += dx;
        symbol.y += dy;
    }
    for point in edges.iter_mut().flat_map(|edge| edge.points.iter_mut()) {
        point.x += dx;
        point.y += dy;
    }

    (
        2.0f32.mul_add(PADDING, max.x - min.x) + style.x,
        2.0f32.mul_add(PADDING, max.y - min.y) + style.y,
    )
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::flowchart::parse_flowchart;

    fn layout(source: &str) -> (Diagram, Layout) {
        let diagram = parse_flowchart(source).unwrap();
        let layout = layout_diagram(&diagram, &StyleConfig::default());
        (diagram, layout)
    }

    fn overlaps(a: &PlacedSymbol, b: &PlacedSymbol) -> bool {
        a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
    }

    fn assert_near(actual: Point, expected: Point) {
        assert!(actual.approx_eq(expected), "{actual:?} != {expected:?}");
    }

    fn assert_no_overlap(layout: &Layout) {
        for (i, a) in layout.symbols.iter().enumerate() {
            for b in &layout.symbols[i + 1..] {
                assert!(!overlaps(a, b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_start_end_stack_vertically_with_straight_edge() {
        let (_, layout) = layout("st=>start: Start\ne=>end: End\nst->e");
        let (st, e) = (&layout.symbols[0], &layout.symbols[1]);
        assert!(e.y > st.bottom());
        assert!((st.center().x - e.center().x).abs() < 0.01);
        let edge = &layout.edges[0];
        assert_eq!(edge.points.len(), 2);
        assert_near(edge.points[0], st.port(Direction::Bottom));
        assert_near(edge.points[1], e.port(Direction::Top));
    }

    #[test]
    fn test_no_branch_goes_to_the_right() {
        let (_, layout) = layout(
            "c=>condition: Ok?\na=>operation: A\nb=>operation: B\nc(yes)->a\nc(no)->b",
        );
        let (c, a, b) = (&layout.symbols[0], &layout.symbols[1], &layout.symbols[2]);
        assert!(a.y > c.bottom());
        assert!(b.x > c.right());
        assert_eq!(layout.edges[1].exit, Direction::Right);
        assert_near(layout.edges[1].points[0], c.port(Direction::Right));
    }

    #[test]
    fn test_back_edge_routes_around_the_outside() {
        let (_, layout) = layout(
            "op=>operation: Work\nc=>condition: Done?\ne=>end: End\nop->c\nc(yes)->e\nc(no)->op",
        );
        let (op, c) = (&layout.symbols[0], &layout.symbols[1]);
        let back = &layout.edges[2];
        assert_near(back.points[back.points.len() - 1], op.port(Direction::Right));
        let outer = back.points.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert!(outer > c.right());
    }

    #[test]
    fn test_taken_cell_slides_target_down() {
        let (_, layout) = layout(
            "op=>operation: Split\na=>operation: A\nb=>operation: B\nop->a\nop->b",
        );
        assert_no_overlap(&layout);
        assert!(layout.symbols[2].y > layout.symbols[1].bottom());
    }

    #[test]
    fn test_unreachable_symbols_get_their_own_column() {
        let (_, layout) = layout("st=>start: Start\ne=>end: End\nlone=>operation: Alone\nst->e");
        assert_no_overlap(&layout);
        assert!(layout.symbols[2].x > layout.symbols[0].right());
    }

    #[test]
    fn test_drawing_is_padded_and_offset() {
        let source = "st=>start: Start\ne=>end: End\nst->e";
        let diagram = parse_flowchart(source).unwrap();
        let style = StyleConfig {
            x: 30.0,
            y: 10.0,
            ..StyleConfig::default()
        };
        let layout = layout_diagram(&diagram, &style);
        let min_x = layout.symbols.iter().map(|s| s.x).fold(f32::MAX, f32::min);
        let min_y = layout.symbols.iter().map(|s| s.y).fold(f32::MAX, f32::min);
        assert!((min_x - (PADDING + 30.0)).abs() < 0.01);
        assert!((min_y - (PADDING + 10.0)).abs() < 0.01);
        for symbol in &layout.symbols {
            assert!(symbol.right() <= layout.width - PADDING + 0.01);
            assert!(symbol.bottom() <= layout.height - PADDING + 0.01);
        }
    }

    #[test]
    fn test_condition_is_larger_than_operation_with_same_label() {
        let (_, layout) = layout("c=>condition: Same\no=>operation: Same");
        assert!(layout.symbols[0].width > layout.symbols[1].width);
        assert!(layout.symbols[0].height > layout.symbols[1].height);
    }

    #[test]
    fn test_wide_labels_use_display_width() {
        assert!(text_width("日本", 10.0) > text_width("ab", 10.0));
    }

    proptest! {
        #[test]
        fn prop_chains_never_overlap(directions in proptest::collection::vec(0u8..4, 1..12)) {
            let mut source = String::new();
            for idx in 0..=directions.len() {
                source.push_str(&format!("n{idx}=>operation: Step {idx}\n"));
            }
            for (idx, dir) in directions.iter().enumerate() {
                let side = ["top", "bottom", "left", "right"][usize::from(*dir)];
                source.push_str(&format!("n{idx}({side})->n{}\n", idx + 1));
            }
            let (_, layout) = layout(&source);
            assert_no_overlap(&layout);
            for edge in &layout.edges {
                for point in &edge.points {
                    prop_assert!(point.x >= 0.0 && point.x <= layout.width);
                    prop_assert!(point.y >= 0.0 && point.y <= layout.height);
                }
            }
        }
    }
}
