use errata_domain_eval::{DiffKind, DiffPart};
use errata_domain_score::{CorrelationRow, CorrelationTable, PageSize, TickLayout};
use errata_ports::midi::NoteEvent;
use errata_ports::storage::{ExtraMarkers, MarkerColors, SettingsDto};
use errata_ports::types::{pitch_name, PageIndex, Pitch, Rect, StaffId, Tick};
use errata_ports::warning::{WarningKind, Warnings};
use roxmltree::Document;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const MARKER_GROUP_ID: &str = "errata-mistakes";
const CROSS_STROKE: f64 = 1.2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("page {page}: page image is not well-formed XML: {message}")]
    Parse { page: PageIndex, message: String },
    #[error("page {page}: page image root is <{root}>, expected <svg>")]
    NotSvg { page: PageIndex, root: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerShape {
    Cross,
    Box,
    Ellipse,
}

/// A mistake placed on a page, in crop-relative page points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MistakeMarker {
    pub page: PageIndex,
    pub rect: Rect,
    pub kind: DiffKind,
    pub color: String,
    pub shape: MarkerShape,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerStyle {
    pub colors: MarkerColors,
    pub opacity: f64,
    pub extras: ExtraMarkers,
}

impl MarkerStyle {
    pub fn from_settings(settings: &SettingsDto) -> Self {
        Self {
            colors: settings.colors.clone(),
            opacity: settings.marker_opacity.clamp(0.0, 1.0),
            extras: settings.extras,
        }
    }
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self::from_settings(&SettingsDto::default())
    }
}

/// Markers for every drawable mistake, in staff-then-tick order, plus the
/// `(part, entry)` pairs that received one.
#[derive(Clone, Debug, Default)]
pub struct Placement {
    pub markers: Vec<MistakeMarker>,
    drawn: HashSet<(usize, usize)>,
}

impl Placement {
    pub fn is_drawn(&self, part: usize, entry: usize) -> bool {
        self.drawn.contains(&(part, entry))
    }

    pub fn on_page(&self, page: PageIndex) -> impl Iterator<Item = &MistakeMarker> {
        self.markers.iter().filter(move |m| m.page == page)
    }
}

struct PartRows<'a> {
    by_note: HashMap<(Tick, Pitch), Vec<&'a CorrelationRow>>,
    layout: TickLayout,
}

impl<'a> PartRows<'a> {
    /// Rows of the part's staff; a merged part, or a staff the table does
    /// not know, searches every staff.
    fn new(table: &'a CorrelationTable, staff: Option<&StaffId>) -> Self {
        let mut rows: Vec<&CorrelationRow> = match staff {
            Some(staff) => table.rows.iter().filter(|r| &r.staff == staff).collect(),
            None => Vec::new(),
        };
        if rows.is_empty() {
            rows = table.rows.iter().collect();
        }

        let mut by_note: HashMap<(Tick, Pitch), Vec<&CorrelationRow>> = HashMap::new();
        for row in rows.iter().copied() {
            by_note.entry((row.tick, row.pitch)).or_default().push(row);
        }
        Self {
            by_note,
            layout: TickLayout::from_rows(rows.iter().copied()),
        }
    }

    fn rows_for(&self, note: &NoteEvent) -> &[&'a CorrelationRow] {
        self.by_note
            .get(&(note.tick, note.pitch))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Region between the neighbouring model notes of a run of extra notes,
    /// spanning the extra pitches' staff positions padded by a note head.
    fn extra_anchor(
        &self,
        before: Option<Tick>,
        after: Option<Tick>,
        pitches: &[Pitch],
    ) -> Option<(PageIndex, Rect)> {
        let before = before.and_then(|t| self.layout.column(t));
        let after = after.and_then(|t| self.layout.column(t));
        let widen = self.layout.head_width();
        let (page, system, columns) = match (before, after) {
            (Some(b), Some(a)) if b.system == a.system => (b.page, b.system, b.rect.union(&a.rect)),
            (Some(b), _) => (
                b.page,
                b.system,
                Rect::new(b.rect.min_x, b.rect.min_y, b.rect.max_x + widen, b.rect.max_y),
            ),
            (None, Some(a)) => (
                a.page,
                a.system,
                Rect::new(a.rect.min_x - widen, a.rect.min_y, a.rect.max_x, a.rect.max_y),
            ),
            (None, None) => return None,
        };

        let span = pitches
            .iter()
            .filter_map(|p| self.layout.pitch_span(system, *p))
            .reduce(|(low, high), (l, h)| (low.min(l), high.max(h)));
        let rect = match span {
            Some((low, high)) => {
                let pad = self.layout.head_height();
                Rect::new(columns.min_x, low - pad, columns.max_x, high + pad)
            }
            None => columns,
        };
        Some((page, rect))
    }
}

pub fn place_markers(
    parts: &[DiffPart],
    table: &CorrelationTable,
    style: &MarkerStyle,
    warnings: &mut Warnings,
) -> Placement {
    let mut placement = Placement::default();

    for (part_idx, part) in parts.iter().enumerate() {
        let rows = PartRows::new(table, part.staff.as_ref());
        let mut previous_model: Option<usize> = None;
        let mut extras: Vec<usize> = Vec::new();

        for (entry_idx, entry) in part.result.entries.iter().enumerate() {
            if entry.kind == DiffKind::Extra {
                extras.push(entry_idx);
                continue;
            }
            let Some(model_idx) = entry.model else {
                continue;
            };
            if !extras.is_empty() {
                place_extras(
                    &mut placement,
                    part_idx,
                    part,
                    &rows,
                    &extras,
                    (previous_model, Some(model_idx)),
                    style,
                    warnings,
                );
                extras.clear();
            }
            previous_model = Some(model_idx);

            if !entry.kind.is_mistake() {
                continue;
            }
            let note = &part.model[model_idx];
            let found = rows.rows_for(note);
            if found.is_empty() {
                warnings.push(
                    WarningKind::UnrenderableMistake,
                    part.staff.as_ref(),
                    format!(
                        "{:?} {} at tick {} has no notated position",
                        entry.kind,
                        pitch_name(note.pitch),
                        note.tick
                    ),
                );
                continue;
            }
            let (shape, color) = match entry.kind {
                DiffKind::Missing => (MarkerShape::Cross, &style.colors.missing),
                _ => (MarkerShape::Box, &style.colors.wrong_pitch),
            };
            for row in found {
                placement.markers.push(MistakeMarker {
                    page: row.page,
                    rect: row.rect,
                    kind: entry.kind,
                    color: color.clone(),
                    shape,
                });
            }
            placement.drawn.insert((part_idx, entry_idx));
        }

        if !extras.is_empty() {
            place_extras(
                &mut placement,
                part_idx,
                part,
                &rows,
                &extras,
                (previous_model, None),
                style,
                warnings,
            );
        }
    }

    placement
}

#[allow(clippy::too_many_arguments)]
fn place_extras(
    placement: &mut Placement,
    part_idx: usize,
    part: &DiffPart,
    rows: &PartRows<'_>,
    extras: &[usize],
    neighbours: (Option<usize>, Option<usize>),
    style: &MarkerStyle,
    warnings: &mut Warnings,
) {
    if style.extras == ExtraMarkers::Omit {
        return;
    }
    let tick_of = |idx: Option<usize>| idx.and_then(|i| part.model.get(i)).map(|n| n.tick);
    let pitches: Vec<Pitch> = extras
        .iter()
        .filter_map(|&e| part.result.entries[e].candidate)
        .filter_map(|c| part.candidate.get(c))
        .map(|n| n.pitch)
        .collect();
    match rows.extra_anchor(tick_of(neighbours.0), tick_of(neighbours.1), &pitches) {
        Some((page, rect)) => {
            placement.markers.push(MistakeMarker {
                page,
                rect,
                kind: DiffKind::Extra,
                color: style.colors.extra.clone(),
                shape: MarkerShape::Ellipse,
            });
            for entry_idx in extras {
                placement.drawn.insert((part_idx, *entry_idx));
            }
        }
        None => warnings.push(
            WarningKind::UnrenderableMistake,
            part.staff.as_ref(),
            format!("{} extra notes have no notated neighbour", extras.len()),
        ),
    }
}

/// Collects marker elements in image coordinates.
struct MarkerLayer {
    elements: Vec<String>,
    page_height: f64,
    opacity: f64,
}

impl MarkerLayer {
    fn new(page_height: f64, opacity: f64) -> Self {
        Self {
            elements: Vec::new(),
            page_height,
            opacity,
        }
    }

    fn flip(&self, y: f64) -> f64 {
        self.page_height - y
    }

    fn push(&mut self, marker: &MistakeMarker) {
        let r = &marker.rect;
        let color = escape_attr(&marker.color);
        let (top, bottom) = (self.flip(r.max_y), self.flip(r.min_y));
        let element = match marker.shape {
            MarkerShape::Cross => format!(
                r#"<path d="M{:.2},{:.2} L{:.2},{:.2} M{:.2},{:.2} L{:.2},{:.2}" fill="none" stroke="{}" stroke-width="{:.2}" stroke-linecap="round"/>"#,
                r.min_x, top, r.max_x, bottom, r.min_x, bottom, r.max_x, top, color, CROSS_STROKE
            ),
            MarkerShape::Box => format!(
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="{:.2}"/>"#,
                r.min_x,
                top,
                r.width(),
                r.height(),
                color,
                self.opacity
            ),
            MarkerShape::Ellipse => format!(
                r#"<ellipse cx="{:.2}" cy="{:.2}" rx="{:.2}" ry="{:.2}" fill="{}" fill-opacity="{:.2}"/>"#,
                (r.min_x + r.max_x) / 2.0,
                (top + bottom) / 2.0,
                r.width() / 2.0,
                r.height() / 2.0,
                color,
                self.opacity
            ),
        };
        self.elements.push(element);
    }

    fn group(&self, transform: Option<&str>) -> String {
        let mut svg = match transform {
            Some(t) => format!(r#"<g id="{MARKER_GROUP_ID}" transform="{t}">"#),
            None => format!(r#"<g id="{MARKER_GROUP_ID}">"#),
        };
        svg.push('\n');
        for el in &self.elements {
            svg.push_str("  ");
            svg.push_str(el);
            svg.push('\n');
        }
        svg.push_str("</g>\n");
        svg
    }

    fn standalone(&self, width: f64, height: f64) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
            width, height, width, height
        );
        svg.push('\n');
        svg.push_str(&self.group(None));
        svg.push_str("</svg>\n");
        svg
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Draws `markers` for one page. With a page image the marker group is
/// spliced in right before the root's closing tag; without one a standalone
/// overlay sized to the crop frame is produced.
pub fn render_page<'m>(
    page: &PageSize,
    markers: impl IntoIterator<Item = &'m MistakeMarker>,
    image: Option<&str>,
    style: &MarkerStyle,
) -> Result<String, RenderError> {
    let mut layer = MarkerLayer::new(page.height, style.opacity);
    for marker in markers {
        layer.push(marker);
    }

    let Some(image) = image else {
        return Ok(layer.standalone(page.width, page.height));
    };

    let doc = Document::parse(image).map_err(|e| RenderError::Parse {
        page: page.index,
        message: e.to_string(),
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(RenderError::NotSvg {
            page: page.index,
            root: root.tag_name().name().to_string(),
        });
    }

    let transform = image_frame(&root).and_then(|frame| frame_transform(frame, page));
    let group = layer.group(transform.as_deref());

    let end = root.range().end;
    let mut out = String::with_capacity(image.len() + group.len() + 16);
    if image[..end].ends_with("/>") {
        // <svg .../> has no closing tag to insert before
        let name_end = image[root.range().start + 1..end]
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .map(|i| root.range().start + 1 + i)
            .unwrap_or(end);
        let qualified = &image[root.range().start + 1..name_end];
        out.push_str(&image[..end - 2]);
        out.push_str(">\n");
        out.push_str(&group);
        out.push_str(&format!("</{qualified}>"));
    } else {
        let close = image[..end].rfind("</").unwrap_or(end);
        out.push_str(&image[..close]);
        out.push_str(&group);
        out.push_str(&image[close..end]);
    }
    out.push_str(&image[end..]);
    Ok(out)
}

/// `(x, y, width, height)` of the image's user coordinate system.
fn image_frame(root: &roxmltree::Node) -> Option<(f64, f64, f64, f64)> {
    if let Some(view_box) = root.attribute("viewBox") {
        let values: Vec<f64> = view_box
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if let [x, y, w, h] = values[..] {
            return Some((x, y, w, h));
        }
    }
    let width = parse_length(root.attribute("width")?)?;
    let height = parse_length(root.attribute("height")?)?;
    Some((0.0, 0.0, width, height))
}

fn parse_length(value: &str) -> Option<f64> {
    value
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}

fn frame_transform((x, y, w, h): (f64, f64, f64, f64), page: &PageSize) -> Option<String> {
    if page.width <= 0.0 || page.height <= 0.0 || w <= 0.0 || h <= 0.0 {
        return None;
    }
    let sx = w / page.width;
    let sy = h / page.height;
    let identity = x == 0.0 && y == 0.0 && (sx - 1.0).abs() < 1e-6 && (sy - 1.0).abs() < 1e-6;
    (!identity).then(|| format!("translate({x} {y}) scale({sx} {sy})"))
}
