//! Data-table location and cell extraction.
//!
//! The positioning page has no stable id on its data table. The table is
//! found structurally: prefer tables with the exchange's `table_f` class,
//! otherwise consider every table, and take the one with the largest
//! serialized markup.

use scraper::{ElementRef, Html, Selector};

/// A single table cell, whitespace-trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    /// `<th>` rather than `<td>`.
    pub header: bool,
}

/// One `<tr>` worth of cells in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    /// Text of every cell, `<th>` included.
    pub fn texts(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.text.as_str()).collect()
    }

    /// Text of `<td>` cells only.
    pub fn data_texts(&self) -> Vec<&str> {
        self.cells
            .iter()
            .filter(|c| !c.header)
            .map(|c| c.text.as_str())
            .collect()
    }

    /// All cell texts joined by single spaces, for substring searches across a row.
    pub fn joined(&self) -> String {
        self.texts().join(" ")
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// The located data table, reduced to text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    /// Build a table of `<td>` cells from plain strings.
    pub fn from_texts<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|cells| Row {
                cells: cells
                    .into_iter()
                    .map(|t| Cell {
                        text: t.into(),
                        header: false,
                    })
                    .collect(),
            })
            .collect();
        Self { rows }
    }

    fn from_element(table: ElementRef<'_>, tr: &Selector, cell: &Selector) -> Self {
        let rows = table
            .select(tr)
            .map(|row| Row {
                cells: row
                    .select(cell)
                    .map(|c| Cell {
                        text: cell_text(c),
                        header: c.value().name() == "th",
                    })
                    .collect(),
            })
            .collect();
        Self { rows }
    }
}

/// Concatenate a cell's text nodes, trimming each one.
fn cell_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

/// Parse a page and return its data table, if it has any table at all.
pub fn locate_data_table(html: &str) -> Option<Table> {
    let doc = Html::parse_document(html);
    let preferred = Selector::parse("table.table_f").ok()?;
    let any_table = Selector::parse("table").ok()?;
    let tr = Selector::parse("tr").ok()?;
    let cell = Selector::parse("td, th").ok()?;

    let mut candidates: Vec<ElementRef<'_>> = doc.select(&preferred).collect();
    if candidates.is_empty() {
        candidates = doc.select(&any_table).collect();
    }

    candidates
        .into_iter()
        .max_by_key(|t| t.html().len())
        .map(|t| Table::from_element(t, &tr, &cell))
}
