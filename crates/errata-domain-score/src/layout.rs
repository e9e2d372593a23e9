use crate::model::CorrelationRow;
use errata_ports::types::{PageIndex, Pitch, Rect, Tick};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickColumn {
    pub page: PageIndex,
    /// Union of every note rect sounding at this tick.
    pub rect: Rect,
    /// Line of music (system) the tick is engraved on, counted across pages.
    pub system: usize,
}

/// Layout of the correlated ticks, used to place markers for notes that
/// have no glyph of their own.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickLayout {
    columns: BTreeMap<Tick, TickColumn>,
    /// Vertical extent `(min_y, max_y)` of each pitch per system.
    pitch_spans: BTreeMap<(usize, Pitch), (f64, f64)>,
    head_width: f64,
    head_height: f64,
}

impl TickLayout {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a CorrelationRow>) -> Self {
        let rows: Vec<&CorrelationRow> = rows.into_iter().collect();
        let mut merged: BTreeMap<Tick, (PageIndex, Rect)> = BTreeMap::new();
        let mut widths = Vec::new();
        let mut heights = Vec::new();

        for row in rows.iter().copied() {
            widths.push(row.rect.width());
            heights.push(row.rect.height());
            merged
                .entry(row.tick)
                .and_modify(|(page, rect)| {
                    if *page == row.page {
                        *rect = rect.union(&row.rect);
                    }
                })
                .or_insert((row.page, row.rect));
        }

        let mut columns = BTreeMap::new();
        let mut system = 0usize;
        let mut previous: Option<(PageIndex, f64)> = None;
        for (tick, (page, rect)) in merged {
            if let Some((prev_page, prev_right)) = previous {
                // a column starting left of its predecessor begins a new line
                if prev_page != page || prev_right > rect.min_x {
                    system += 1;
                }
            }
            previous = Some((page, rect.max_x));
            columns.insert(tick, TickColumn { page, rect, system });
        }

        let mut pitch_spans: BTreeMap<(usize, Pitch), (f64, f64)> = BTreeMap::new();
        for row in rows {
            let Some(column) = columns.get(&row.tick).filter(|c| c.page == row.page) else {
                continue;
            };
            pitch_spans
                .entry((column.system, row.pitch))
                .and_modify(|(low, high)| {
                    *low = low.min(row.rect.min_y);
                    *high = high.max(row.rect.max_y);
                })
                .or_insert((row.rect.min_y, row.rect.max_y));
        }

        Self {
            columns,
            pitch_spans,
            head_width: median(&mut widths),
            head_height: median(&mut heights),
        }
    }

    pub fn column(&self, tick: Tick) -> Option<&TickColumn> {
        self.columns.get(&tick)
    }

    pub fn head_width(&self) -> f64 {
        self.head_width
    }

    pub fn head_height(&self) -> f64 {
        self.head_height
    }

    /// Where `pitch` sits vertically on a system: its own glyphs if the
    /// system has any, otherwise interpolated between the nearest pitches
    /// engraved there.
    pub fn pitch_span(&self, system: usize, pitch: Pitch) -> Option<(f64, f64)> {
        let below = self
            .pitch_spans
            .range((system, 0)..=(system, pitch))
            .next_back();
        let above = self
            .pitch_spans
            .range((system, pitch)..=(system, Pitch::MAX))
            .next();
        match (below, above) {
            (Some((&(_, low), &a)), Some((&(_, high), &b))) if high > low => {
                let t = (pitch - low) as f64 / (high - low) as f64;
                Some((a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t))
            }
            (Some((_, &span)), _) | (None, Some((_, &span))) => Some(span),
            (None, None) => None,
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
