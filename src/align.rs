//! Elastic tabstops for printer output.
//!
//! Each line is an indentation level plus a list of cells. Every cell but
//! the last is terminated and gets padded to its column width; columns are
//! formed by consecutive lines that have a terminated cell at that index, as
//! in `text/tabwriter`. Columns whose cells are all empty take no space.

const PADDING: usize = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub indent: usize,
    pub cells: Vec<String>,
    /// Continuation of a multi-line token; printed as-is.
    pub verbatim: bool,
    /// Starts a new alignment section.
    pub section: bool,
}

impl Line {
    pub fn new(indent: usize) -> Self {
        Self {
            indent,
            cells: vec![String::new()],
            ..Self::default()
        }
    }

    fn terminated(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }
}

/// Render lines with tab indentation and aligned cells. Each line ends in
/// `\n`; trailing blanks are removed.
pub fn render(lines: &[Line]) -> String {
    let widths = column_widths(lines);
    let mut out = String::new();
    for (line, widths) in lines.iter().zip(&widths) {
        let mut text = String::new();
        if line.verbatim {
            text.push_str(&line.cells.join(" "));
        } else {
            let last = line.cells.len().saturating_sub(1);
            for (i, cell) in line.cells.iter().enumerate() {
                text.push_str(cell);
                if i < last {
                    let width = widths.get(i).copied().unwrap_or(0);
                    let used = cell.chars().count();
                    if width > used {
                        text.extend(std::iter::repeat(' ').take(width - used));
                    }
                }
            }
            if !text.trim().is_empty() {
                out.extend(std::iter::repeat('\t').take(line.indent));
            }
        }
        out.push_str(text.trim_end());
        out.push('\n');
    }
    out
}

/// Column widths for every line.
fn column_widths(lines: &[Line]) -> Vec<Vec<usize>> {
    let mut result = vec![Vec::new(); lines.len()];
    let mut start = 0;
    while start < lines.len() {
        let mut end = start + 1;
        while end < lines.len() && continues(&lines[end - 1], &lines[end]) {
            end += 1;
        }
        let mut widths = Vec::new();
        format(lines, start, end, &mut widths, &mut result);
        start = end;
    }
    result
}

/// Whether `next` can share columns with `prev`.
fn continues(prev: &Line, next: &Line) -> bool {
    !next.section
        && !prev.verbatim
        && !next.verbatim
        && prev.indent == next.indent
}

fn cell_width(line: &Line, column: usize) -> usize {
    line.cells[column].chars().count()
}

fn format(
    lines: &[Line],
    line0: usize,
    line1: usize,
    widths: &mut Vec<usize>,
    result: &mut [Vec<usize>],
) {
    let column = widths.len();
    let mut line0 = line0;
    let mut this = line0;
    while this < line1 {
        if column >= lines[this].terminated() {
            this += 1;
            continue;
        }
        for row in &mut result[line0..this] {
            row.clone_from(widths);
        }
        line0 = this;

        let mut width = 0;
        let mut discardable = true;
        while this < line1 && column < lines[this].terminated() {
            let w = cell_width(&lines[this], column);
            width = width.max(w + PADDING);
            if w > 0 {
                discardable = false;
            }
            this += 1;
        }
        if discardable {
            width = 0;
        }

        widths.push(width);
        format(lines, line0, this, widths, result);
        widths.pop();
        line0 = this;
    }
    for row in &mut result[line0..line1] {
        row.clone_from(widths);
    }
}
