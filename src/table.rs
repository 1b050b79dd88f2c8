use std::fmt;

use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

struct Column {
    header: String,
    data: Vec<String>,
    align: Align,
}

// A closed group: columns from some range have been finalized under this name.
struct Group {
    name: Option<String>,
    count: usize,
}

/// A builder for aligned tabular output with optional column grouping.
///
/// Columns are added with `column()` (right-aligned, for numbers) or `text_column()`
/// (left-aligned), optionally organized under named groups using `group()`. The table
/// renders through `Display`, one line per row, with trailing whitespace trimmed.
pub struct Table {
    columns: Vec<Column>,
    groups: Vec<Group>,
    // Tracks the in-progress group: columns from current_group_start onwards
    // belong to current_group_name (which may be None for ungrouped columns).
    current_group_start: usize,
    current_group_name: Option<String>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table {
            columns: Vec::new(),
            groups: Vec::new(),
            current_group_start: 0,
            current_group_name: None,
        }
    }

    fn push(mut self, header: impl Into<String>, data: Vec<String>, align: Align) -> Self {
        self.columns.push(Column {
            header: header.into(),
            data,
            align,
        });
        self
    }

    /// Add a right-aligned column with the given header and data rows.
    pub fn column(self, header: impl Into<String>, data: Vec<String>) -> Self {
        self.push(header, data, Align::Right)
    }

    /// Add a left-aligned column with the given header and data rows.
    pub fn text_column(self, header: impl Into<String>, data: Vec<String>) -> Self {
        self.push(header, data, Align::Left)
    }

    /// Start a new named group. Subsequent columns belong to this group until
    /// another `group()` call.
    pub fn group(mut self, name: impl Into<String>) -> Self {
        let count = self.columns.len() - self.current_group_start;
        if count > 0 {
            self.groups.push(Group {
                name: self.current_group_name.take(),
                count,
            });
        }
        self.current_group_start = self.columns.len();
        self.current_group_name = Some(name.into());
        self
    }

    /// Iterate over all groups, including any trailing unclosed group.
    fn all_groups(&self) -> impl Iterator<Item = (Option<&str>, usize)> {
        let trailing_count = self.columns.len() - self.current_group_start;
        self.groups
            .iter()
            .map(|g| (g.name.as_deref(), g.count))
            .chain(
                (trailing_count > 0)
                    .then_some((self.current_group_name.as_deref(), trailing_count)),
            )
    }

    fn num_rows(&self) -> usize {
        self.columns.iter().map(|c| c.data.len()).max().unwrap_or(0)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return Ok(());
        }

        let groups: Vec<_> = self.all_groups().collect();

        // Base column widths: max of header and data widths (using Unicode width)
        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|col| {
                let max_data = col.data.iter().map(|v| v.width()).max().unwrap_or(0);
                std::cmp::max(col.header.width(), max_data)
            })
            .collect();

        let has_named_groups = groups.iter().any(|(name, _)| name.is_some());

        // When a group name is wider than its columns' natural span, pad after the group
        // rather than expanding column widths.
        let group_info: Vec<((usize, usize), usize)> = {
            let mut col = 0;
            groups
                .iter()
                .map(|&(name, count)| {
                    let start = col;
                    col += count;
                    let natural_span = widths[start..col].iter().sum::<usize>() + count - 1;
                    let name_width = name.map(|n| n.width()).unwrap_or(0);
                    ((start, col), std::cmp::max(natural_span, name_width))
                })
                .collect()
        };

        if has_named_groups {
            let header: Vec<String> = groups
                .iter()
                .zip(&group_info)
                .map(|(&(name, _), &(_, span))| ljust(name.unwrap_or(""), span))
                .collect();
            writeln!(f, "{}", header.join(" ").trim_end())?;
        }

        let header_line: Vec<String> = group_info
            .iter()
            .map(|&((start, end), span)| {
                let cols: Vec<String> = self.columns[start..end]
                    .iter()
                    .zip(&widths[start..end])
                    .map(|(c, &w)| ljust(&c.header, w))
                    .collect();
                ljust(&cols.join(" "), span)
            })
            .collect();
        writeln!(f, "{}", header_line.join(" ").trim_end())?;

        for row_idx in 0..self.num_rows() {
            let row: Vec<String> = group_info
                .iter()
                .map(|&((start, end), span)| {
                    let vals: Vec<String> = self.columns[start..end]
                        .iter()
                        .zip(&widths[start..end])
                        .map(|(col, &w)| {
                            let val = col.data.get(row_idx).map(|s| s.as_str()).unwrap_or("-");
                            match col.align {
                                Align::Left => ljust(val, w),
                                Align::Right => rjust(val, w),
                            }
                        })
                        .collect();
                    ljust(&vals.join(" "), span)
                })
                .collect();
            writeln!(f, "{}", row.join(" ").trim_end())?;
        }
        Ok(())
    }
}

/// Left-justify string to given width (using Unicode display width).
fn ljust(s: &str, width: usize) -> String {
    let current_width = s.width();
    if current_width >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - current_width))
    }
}

/// Right-justify string to given width (using Unicode display width).
fn rjust(s: &str, width: usize) -> String {
    let current_width = s.width();
    if current_width >= width {
        s.to_string()
    } else {
        format!("{}{}", " ".repeat(width - current_width), s)
    }
}
