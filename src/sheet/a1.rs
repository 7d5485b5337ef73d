//! A1 notation helpers: column letters, cell references and sheet ranges.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

/// Google Sheets caps a spreadsheet at 10 million cells, so no data row lies past this.
pub const MAX_ROWS: u32 = 10_000_000;

/// Convert column letters (`A`, `Z`, `AZ`) into a 1-based column index.
pub fn column_index(letters: &str) -> Option<u32> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut idx: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        idx = idx * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(idx)
}

/// Convert a 1-based column index back into letters.
pub fn column_letters(mut index: u32) -> String {
    let mut out = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    out.iter().rev().collect()
}

/// A single cell such as `Z1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| anyhow!("cell reference {s:?} has no row number"))?;
        let (letters, digits) = s.split_at(split);
        let col = column_index(letters)
            .ok_or_else(|| anyhow!("cell reference {s:?} has invalid column {letters:?}"))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| anyhow!("cell reference {s:?} has invalid row {digits:?}"))?;
        if row == 0 {
            return Err(anyhow!("cell reference {s:?} has row 0"));
        }
        Ok(Self { col, row })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// A rectangular range on one tab, inclusive on both corners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    pub start: CellRef,
    pub end: CellRef,
}

impl SheetRange {
    pub fn new(sheet: impl Into<String>, start: CellRef, end: CellRef) -> Self {
        Self {
            sheet: sheet.into(),
            start,
            end,
        }
    }

    pub fn cell(sheet: impl Into<String>, cell: CellRef) -> Self {
        Self::new(sheet, cell, cell)
    }

    /// Columns `first_col..=last_col` over `row_count` rows starting at `first_row`.
    /// The last row saturates at `u32::MAX`.
    pub fn rows(
        sheet: impl Into<String>,
        first_col: u32,
        last_col: u32,
        first_row: u32,
        row_count: u32,
    ) -> Self {
        let last_row = first_row.saturating_add(row_count.max(1) - 1);
        Self::new(
            sheet,
            CellRef::new(first_col, first_row),
            CellRef::new(last_col, last_row),
        )
    }

    pub fn width(&self) -> usize {
        (self.end.col - self.start.col + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.end.row - self.start.row + 1) as usize
    }
}

/// Quote a tab name for A1 notation when it contains anything but `[A-Za-z0-9_]`.
pub fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sheet = quote_sheet_name(&self.sheet);
        if self.start == self.end {
            write!(f, "{sheet}!{}", self.start)
        } else {
            write!(f, "{sheet}!{}:{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters_roundtrip_edges() {
        assert_eq!(column_index("A"), Some(1));
        assert_eq!(column_index("z"), Some(26));
        assert_eq!(column_index("AA"), Some(27));
        assert_eq!(column_index("AZ"), Some(52));
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(703), "AAA");
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn parses_cell_refs() {
        assert_eq!("Z1".parse::<CellRef>().unwrap(), CellRef::new(26, 1));
        assert_eq!("az12".parse::<CellRef>().unwrap(), CellRef::new(52, 12));
        assert!("Z".parse::<CellRef>().is_err());
        assert!("A0".parse::<CellRef>().is_err());
        assert!("12".parse::<CellRef>().is_err());
    }

    #[test]
    fn renders_ranges() {
        let r = SheetRange::rows("Products", 1, 4, 2, 100);
        assert_eq!(r.to_string(), "Products!A2:D101");
        assert_eq!(r.height(), 100);
        assert_eq!(r.width(), 4);

        let tail = SheetRange::rows("Products", 1, 4, u32::MAX - 1, 100);
        assert_eq!(tail.end.row, u32::MAX);
        assert_eq!(tail.height(), 2);

        let cell = SheetRange::cell("Shopify Export", CellRef::new(8, 1));
        assert_eq!(cell.to_string(), "'Shopify Export'!H1");

        let quoted = SheetRange::cell("Bob's", CellRef::new(1, 1));
        assert_eq!(quoted.to_string(), "'Bob''s'!A1");
    }
}
