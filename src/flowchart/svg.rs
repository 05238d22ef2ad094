//! SVG emission for a laid-out flowchart.
//!
//! Pure string building. Paint order: background, connections, branch
//! labels, symbols.

use std::fmt::Write as _;

use super::layout::{Layout, PlacedEdge, PlacedSymbol, Point, text_width};
use super::style::{ArrowEnd, ResolvedSymbolStyle, StyleConfig};
use super::types::{Branch, Diagram, Direction, Link, SymbolKind};

const ARROW_ID: &str = "flowchart-arrow";
const TEXT_BASELINE_SHIFT: f32 = 0.35;
const TERMINAL_RADIUS: f32 = 20.0;

pub fn render_svg(diagram: &Diagram, layout: &Layout, style: &StyleConfig) -> String {
    let mut out = String::with_capacity(1024 + 512 * layout.symbols.len());
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        fmt_num(layout.width * style.scale),
        fmt_num(layout.height * style.scale),
        fmt_num(layout.width),
        fmt_num(layout.height),
    );
    out.push('\n');

    if let Some(marker) = arrow_marker(style) {
        let _ = writeln!(out, "<defs>{marker}</defs>");
    }
    if let Some(background) = &style.background {
        let _ = writeln!(
            out,
            r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
            fmt_num(layout.width),
            fmt_num(layout.height),
            escape_xml(background),
        );
    }

    for edge in &layout.edges {
        out.push_str(&render_edge(edge, style));
    }
    for edge in &layout.edges {
        if let Some(label) = branch_label(diagram, edge, style) {
            out.push_str(&label);
        }
    }
    for placed in &layout.symbols {
        out.push_str(&render_symbol(diagram, placed, style));
    }

    out.push_str("</svg>\n");
    out
}

fn arrow_marker(style: &StyleConfig) -> Option<String> {
    let size = style.line_width.mul_add(2.5, 5.0);
    let half = size / 2.0;
    let stroke = escape_xml(&style.line_color);
    let shape = match style.arrow_end {
        ArrowEnd::None => return None,
        ArrowEnd::Block => format!(
            r#"<polygon points="0,0 {s},{h} 0,{s}" fill="{stroke}"/>"#,
            s = fmt_num(size),
            h = fmt_num(half),
        ),
        ArrowEnd::Classic => format!(
            r#"<polygon points="0,0 {s},{h} 0,{s} {n},{h}" fill="{stroke}"/>"#,
            s = fmt_num(size),
            h = fmt_num(half),
            n = fmt_num(size * 0.3),
        ),
        ArrowEnd::Open => format!(
            r#"<polyline points="0,0 {s},{h} 0,{s}" fill="none" stroke="{stroke}" stroke-width="{w}"/>"#,
            s = fmt_num(size),
            h = fmt_num(half),
            w = fmt_num(style.line_width.max(1.0) / 1.5),
        ),
    };
    Some(format!(
        r#"<marker id="{ARROW_ID}" markerUnits="userSpaceOnUse" markerWidth="{s}" markerHeight="{s}" viewBox="0 0 {s} {s}" refX="{s}" refY="{h}" orient="auto">{shape}</marker>"#,
        s = fmt_num(size),
        h = fmt_num(half),
    ))
}

fn render_edge(edge: &PlacedEdge, style: &StyleConfig) -> String {
    if edge.points.len() < 2 {
        return String::new();
    }
    let marker = if style.arrow_end == ArrowEnd::None {
        String::new()
    } else {
        format!(r#" marker-end="url(#{ARROW_ID})""#)
    };
    format!(
        "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{marker}/>\n",
        path_data(&edge.points),
        escape_xml(&style.line_color),
        fmt_num(style.line_width),
    )
}

fn path_data(points: &[Point]) -> String {
    let mut data = String::new();
    for (idx, point) in points.iter().enumerate() {
        let command = if idx == 0 { 'M' } else { 'L' };
        let _ = write!(data, "{command}{},{} ", fmt_num(point.x), fmt_num(point.y));
    }
    data.trim_end().to_string()
}

/// `yes`/`no` text next to where a condition's branch leaves it.
fn branch_label(diagram: &Diagram, edge: &PlacedEdge, style: &StyleConfig) -> Option<String> {
    let connection = diagram.connections().get(edge.connection)?;
    let source = diagram.symbols().get(edge.from)?;
    let resolved = style.resolve(source.kind, source.flowstate.as_deref());
    let text = match connection.branch? {
        Branch::Yes => resolved.yes_text,
        Branch::No => resolved.no_text,
        Branch::Path1 | Branch::Path2 | Branch::Path3 => return None,
    };
    if text.is_empty() {
        return None;
    }

    let start = edge.points.first()?;
    let font_size = style.font_size;
    let (x, y, anchor) = match edge.exit {
        Direction::Bottom => (start.x + 4.0, start.y + font_size, "start"),
        Direction::Left => (start.x - 4.0, start.y - 4.0, "end"),
        Direction::Top | Direction::Right => (start.x + 4.0, start.y - 4.0, "start"),
    };
    Some(format!(
        "<text x=\"{}\" y=\"{}\" text-anchor=\"{anchor}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>\n",
        fmt_num(x),
        fmt_num(y),
        escape_xml(&style.font_family),
        fmt_num(font_size),
        escape_xml(&style.font_color),
        escape_xml(text),
    ))
}

fn render_symbol(diagram: &Diagram, placed: &PlacedSymbol, style: &StyleConfig) -> String {
    let Some(symbol) = diagram.symbols().get(placed.index) else {
        return String::new();
    };
    let resolved = style.resolve(symbol.kind, symbol.flowstate.as_deref());

    let mut body = String::new();
    body.push_str(&symbol_shape(symbol.kind, placed, &resolved, style));
    body.push_str(&symbol_label(&symbol.label, placed, &resolved, style));

    let body = match &symbol.link {
        Some(link) => wrap_link(link, &body),
        None => body,
    };
    format!(
        "<g id=\"{}\" class=\"symbol {}\">\n{body}</g>\n",
        escape_xml(&symbol.id),
        symbol.kind,
    )
}

fn symbol_shape(
    kind: SymbolKind,
    placed: &PlacedSymbol,
    resolved: &ResolvedSymbolStyle<'_>,
    style: &StyleConfig,
) -> String {
    let PlacedSymbol {
        x,
        y,
        width: w,
        height: h,
        ..
    } = *placed;
    let paint = format!(
        r#"fill="{}" stroke="{}" stroke-width="{}""#,
        escape_xml(resolved.fill),
        escape_xml(resolved.element_color),
        fmt_num(style.line_width),
    );
    let stroke_only = format!(
        r#"stroke="{}" stroke-width="{}""#,
        escape_xml(resolved.element_color),
        fmt_num(style.line_width),
    );

    match kind {
        SymbolKind::Start | SymbolKind::End => {
            let r = TERMINAL_RADIUS.min(h / 2.0);
            format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{r}\" ry=\"{r}\" {paint}/>\n",
                fmt_num(x),
                fmt_num(y),
                fmt_num(w),
                fmt_num(h),
                r = fmt_num(r),
            )
        }
        SymbolKind::Operation => rect(x, y, w, h, &paint),
        SymbolKind::InputOutput => {
            let skew = h / 2.0;
            polygon(
                &[
                    Point::new(x + skew, y),
                    Point::new(x + w, y),
                    Point::new(x + w - skew, y + h),
                    Point::new(x, y + h),
                ],
                &paint,
            )
        }
        SymbolKind::Subroutine => {
            let inset = style.text_margin;
            let mut shape = rect(x, y, w, h, &paint);
            for line_x in [x + inset, x + w - inset] {
                shape.push_str(&line(
                    Point::new(line_x, y),
                    Point::new(line_x, y + h),
                    &stroke_only,
                ));
            }
            shape
        }
        SymbolKind::Condition => {
            let (cx, cy) = (x + w / 2.0, y + h / 2.0);
            polygon(
                &[
                    Point::new(cx, y),
                    Point::new(x + w, cy),
                    Point::new(cx, y + h),
                    Point::new(x, cy),
                ],
                &paint,
            )
        }
        SymbolKind::Parallel => {
            let offset = style.line_width.mul_add(2.0, 2.0);
            let mut shape = rect(x, y, w, h, &paint);
            shape.push_str(&line(
                Point::new(x, y + offset),
                Point::new(x + w, y + offset),
                &stroke_only,
            ));
            shape
        }
    }
}

fn symbol_label(
    label: &str,
    placed: &PlacedSymbol,
    resolved: &ResolvedSymbolStyle<'_>,
    style: &StyleConfig,
) -> String {
    let center = placed.center();
    let y = resolved.font_size.mul_add(TEXT_BASELINE_SHIFT, center.y);
    format!(
        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" fill=\"{}\" textLength=\"{}\" lengthAdjust=\"spacingAndGlyphs\">{}</text>\n",
        fmt_num(center.x),
        fmt_num(y),
        escape_xml(&style.font_family),
        fmt_num(resolved.font_size),
        escape_xml(resolved.font_weight),
        escape_xml(resolved.font_color),
        fmt_num(text_width(label, resolved.font_size)),
        escape_xml(label),
    )
}

fn wrap_link(link: &Link, body: &str) -> String {
    let target = link.target.as_deref().map_or_else(String::new, |target| {
        let target = if target.starts_with('_') {
            target.to_string()
        } else {
            format!("_{target}")
        };
        format!(r#" target="{}""#, escape_xml(&target))
    });
    format!(
        "<a xlink:href=\"{}\"{target}>\n{body}</a>\n",
        escape_xml(&link.url)
    )
}

fn rect(x: f32, y: f32, w: f32, h: f32, paint: &str) -> String {
    format!(
        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" {paint}/>\n",
        fmt_num(x),
        fmt_num(y),
        fmt_num(w),
        fmt_num(h),
    )
}

fn polygon(points: &[Point], paint: &str) -> String {
    let points = points
        .iter()
        .map(|p| format!("{},{}", fmt_num(p.x), fmt_num(p.y)))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<polygon points=\"{points}\" {paint}/>\n")
}

fn line(from: Point, to: Point, stroke: &str) -> String {
    format!(
        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" {stroke}/>\n",
        fmt_num(from.x),
        fmt_num(from.y),
        fmt_num(to.x),
        fmt_num(to.y),
    )
}

/// Escape special XML characters in text and attribute values.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Two decimals at most, without trailing zeros.
fn fmt_num(n: f32) -> String {
    let s = format!("{n:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}
