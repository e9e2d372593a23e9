//! Reader for the page link dump: one `CropBox` line per page followed by the
//! `Link` lines of that page.
//!
//! ```text
//! CropBox	0.0	0.0	595.0	842.0
//! Link	70.2	700.1	76.9	704.3	textedit:///score.ly:12:4:5
//! ```

use crate::model::{AnnotationBox, PageSize};
use errata_ports::types::{CrossRefKey, PageIndex, Rect};
use errata_ports::warning::{WarningKind, Warnings};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

const TEXTEDIT_SCHEME: &str = "textedit://";

#[derive(thiserror::Error, Debug)]
pub enum PageLinksError {
    #[error("io error: {0}")]
    Io(String),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("missing crop boundary: {0}")]
    MissingCropBoundary(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageAnnotations {
    pub index: PageIndex,
    /// Crop frame in raw page coordinates.
    pub crop: Rect,
    /// Crop-relative boxes.
    pub boxes: Vec<AnnotationBox>,
}

impl PageAnnotations {
    pub fn size(&self) -> PageSize {
        PageSize {
            index: self.index,
            width: self.crop.width(),
            height: self.crop.height(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageLinks {
    pub pages: Vec<PageAnnotations>,
}

impl PageLinks {
    pub fn boxes(&self) -> impl Iterator<Item = &AnnotationBox> {
        self.pages.iter().flat_map(|p| p.boxes.iter())
    }

    pub fn page_sizes(&self) -> Vec<PageSize> {
        self.pages.iter().map(PageAnnotations::size).collect()
    }
}

pub fn read_page_links_path(path: &Path, warnings: &mut Warnings) -> Result<PageLinks, PageLinksError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PageLinksError::Io(format!("{}: {}", path.display(), e)))?;
    parse_page_links(&text, warnings)
}

pub fn parse_page_links(text: &str, warnings: &mut Warnings) -> Result<PageLinks, PageLinksError> {
    let mut pages: Vec<PageAnnotations> = Vec::new();
    let mut seen: HashSet<CrossRefKey> = HashSet::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let items: Vec<&str> = line.split_whitespace().collect();
        match items.as_slice() {
            ["CropBox", left, bottom, right, top] => {
                let crop = parse_rect(line_no, [left, bottom, right, top])?;
                pages.push(PageAnnotations {
                    index: pages.len(),
                    crop,
                    boxes: Vec::new(),
                });
            }
            ["Link", left, bottom, right, top, uri] => {
                let Some(page) = pages.last_mut() else {
                    return Err(PageLinksError::MissingCropBoundary(format!(
                        "link on line {line_no} precedes any CropBox"
                    )));
                };
                let Some(key) = parse_textedit_key(uri) else {
                    debug!(line = line_no, uri = *uri, "skipping non-textedit link");
                    continue;
                };
                let raw = parse_rect(line_no, [left, bottom, right, top])?;
                if !raw.intersects(&page.crop) {
                    warnings.push(
                        WarningKind::CropExcluded,
                        None,
                        format!("link {key} on page {} lies outside the crop frame", page.index),
                    );
                    continue;
                }
                if !seen.insert(key.clone()) {
                    warnings.push(
                        WarningKind::UnresolvedCrossReference,
                        None,
                        format!("duplicate link {key}; keeping the first box"),
                    );
                    continue;
                }
                let rect = raw.translate(-page.crop.min_x, -page.crop.min_y);
                page.boxes.push(AnnotationBox {
                    page: page.index,
                    rect,
                    key,
                });
            }
            _ => {}
        }
    }

    if pages.is_empty() {
        return Err(PageLinksError::MissingCropBoundary(
            "no CropBox line found".to_string(),
        ));
    }

    Ok(PageLinks { pages })
}

fn parse_rect(line: usize, fields: [&&str; 4]) -> Result<Rect, PageLinksError> {
    let mut values = [0.0f64; 4];
    for (slot, field) in values.iter_mut().zip(fields) {
        *slot = field.parse::<f64>().map_err(|e| PageLinksError::Parse {
            line,
            message: format!("invalid coordinate {field:?}: {e}"),
        })?;
    }
    Ok(Rect::new(values[0], values[1], values[2], values[3]))
}

/// `textedit://<path>:<line>:<column>:<end-column>`; the path may itself
/// contain colons, so fields are taken from the right.
fn parse_textedit_key(uri: &str) -> Option<CrossRefKey> {
    let rest = uri.strip_prefix(TEXTEDIT_SCHEME)?;
    let mut fields = rest.rsplitn(4, ':');
    let _end_column = fields.next()?;
    let column = fields.next()?.parse::<u32>().ok()?;
    let line = fields.next()?.parse::<u32>().ok()?;
    fields.next()?;
    Some(CrossRefKey::from_location(line, column))
}
