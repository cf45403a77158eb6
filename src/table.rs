use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::{
    columns::{ColumnKey, PATH_SEPARATOR},
    data::{format_number, parse_number},
    flatten::ExpansionState,
    pivot::{PivotDimensionField, PivotTable},
    tree::{NodeId, PivotRowNode},
};

const INDENT: &str = "  ";

/// Renders an aligned plain-text table. Cells that parse as numbers are
/// right-aligned, everything else is left-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, &width)| {
            let sanitized = sanitize_cell(value);
            let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
            if parse_number(&sanitized).is_some() {
                format!("{padding}{sanitized}")
            } else {
                format!("{sanitized}{padding}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI colour sequence, e.g. \x1b[31m
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// One header per rendered cell, in column-key then value-field order.
///
/// A lone value field labels cells by column; a table without column
/// dimensions labels them by value field; otherwise both are combined.
pub fn pivot_headers(table: &PivotTable) -> Vec<String> {
    let only_grand_total = matches!(table.columns.as_slice(), [ColumnKey::GrandTotal]);
    let mut headers = Vec::with_capacity(table.columns.len() * table.value_fields.len());
    for column in &table.columns {
        for value_field in &table.value_fields {
            headers.push(if only_grand_total {
                value_field.label()
            } else if table.value_fields.len() == 1 {
                column.label()
            } else {
                format!("{} | {}", column.label(), value_field.label())
            });
        }
    }
    headers
}

fn expander(node: &PivotRowNode, expansion: &ExpansionState) -> &'static str {
    match (&node.children, expansion.is_expanded(&node.id)) {
        (None, _) => "",
        (Some(_), true) => "- ",
        (Some(_), false) => "+ ",
    }
}

/// Label column text: indentation by level, an expand marker, and the
/// parent's label in front when its dimension repeats labels.
fn display_label(
    node: &PivotRowNode,
    parents: &HashMap<&NodeId, &PivotRowNode>,
    row_dims: &[PivotDimensionField],
    expansion: &ExpansionState,
) -> String {
    let mut label = node.label.clone();
    if !node.is_total {
        let mut current = node;
        while current.level > 0
            && row_dims
                .get(current.level - 1)
                .is_some_and(|dim| dim.repeat_labels)
            && let Some(parent) = current.parent_id.as_ref().and_then(|id| parents.get(id).copied())
        {
            label = format!("{}{PATH_SEPARATOR}{label}", parent.label);
            current = parent;
        }
    }
    format!("{}{}{label}", INDENT.repeat(node.level), expander(node, expansion))
}

/// Renders the rows of a pivot that are visible under `expansion` as a
/// text table.
pub fn render_pivot(
    table: &PivotTable,
    expansion: &ExpansionState,
    row_dims: &[PivotDimensionField],
) -> String {
    let mut parents = HashMap::new();
    for root in &table.rows {
        root.walk(&mut |node| {
            parents.insert(&node.id, node);
        });
    }

    let row_header = if row_dims.is_empty() {
        String::new()
    } else {
        row_dims
            .iter()
            .map(|dim| dim.field.as_str())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    };
    let mut headers = vec![row_header];
    headers.extend(pivot_headers(table));

    let rows = table
        .visible_rows(expansion)
        .into_iter()
        .map(|node| {
            let mut cells = vec![display_label(node, &parents, row_dims, expansion)];
            for column in 0..table.columns.len() {
                cells.extend(node.values.column(column).iter().map(|v| format_number(*v)));
            }
            cells
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}
