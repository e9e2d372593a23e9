use crate::model::{CorrelationRow, CorrelationTable, PageSize};
use errata_ports::types::{Rect, StaffId};
use std::fmt::Write as _;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("io error: {0}")]
    Io(String),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub fn format_table(table: &CorrelationTable) -> String {
    let mut out = String::new();
    out.push_str("#page\tindex\twidth\theight\n");
    for page in &table.pages {
        let _ = writeln!(out, "page\t{}\t{}\t{}", page.index, page.width, page.height);
    }
    out.push_str("#note\tstaff\tpage\ttick\tpitch\tmin_x\tmin_y\tmax_x\tmax_y\n");
    for row in &table.rows {
        let _ = writeln!(
            out,
            "note\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.staff,
            row.page,
            row.tick,
            row.pitch,
            row.rect.min_x,
            row.rect.min_y,
            row.rect.max_x,
            row.rect.max_y
        );
    }
    out
}

pub fn read_table_path(path: &Path) -> Result<CorrelationTable, TableError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| TableError::Io(format!("{}: {}", path.display(), e)))?;
    parse_table(&text)
}

pub fn parse_table(text: &str) -> Result<CorrelationTable, TableError> {
    let mut table = CorrelationTable::default();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let items: Vec<&str> = line.split('\t').collect();
        match items.as_slice() {
            ["page", index, width, height] => table.pages.push(PageSize {
                index: field(line_no, index)?,
                width: field(line_no, width)?,
                height: field(line_no, height)?,
            }),
            ["note", staff, page, tick, pitch, min_x, min_y, max_x, max_y] => {
                table.rows.push(CorrelationRow {
                    staff: StaffId::new(*staff),
                    page: field(line_no, page)?,
                    tick: field(line_no, tick)?,
                    pitch: field(line_no, pitch)?,
                    rect: Rect::new(
                        field(line_no, min_x)?,
                        field(line_no, min_y)?,
                        field(line_no, max_x)?,
                        field(line_no, max_y)?,
                    ),
                })
            }
            _ => {
                return Err(TableError::Parse {
                    line: line_no,
                    message: format!("unrecognized record {:?}", items.first().unwrap_or(&"")),
                })
            }
        }
    }

    Ok(table)
}

fn field<T>(line: usize, raw: &str) -> Result<T, TableError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| TableError::Parse {
        line,
        message: format!("invalid field {raw:?}: {e}"),
    })
}
