mod common;

use common::east_west_rows;
use pivot_workbench::{
    aggregate::Aggregation,
    flatten::ExpansionState,
    pivot::{PivotDimensionField, PivotSpec, PivotValueField, compute_pivot},
    table::{render_pivot, render_table},
    tree::NodeId,
};

#[test]
fn render_table_aligns_columns() {
    let headers = vec!["id".to_string(), "name".to_string()];
    let rows = vec![
        vec!["1".to_string(), "Alice".to_string()],
        vec!["22".to_string(), "Bob".to_string()],
    ];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines, vec!["id   name", "---  -----", "  1  Alice", " 22  Bob"]);
}

#[test]
fn render_table_normalizes_control_characters() {
    let headers = vec!["note".to_string()];
    let rows = vec![vec!["line1\nline2\tvalue".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "line1 line2 value");
}

#[test]
fn render_table_ignores_ansi_sequences_in_widths() {
    let headers = vec!["région".to_string(), "status".to_string()];
    let rows = vec![vec!["café".to_string(), "\u{1b}[31mERR\u{1b}[0m".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "région  status");
    assert_eq!(lines[2], "café    \u{1b}[31mERR\u{1b}[0m");
}

#[test]
fn render_pivot_marks_expandable_rows() {
    let rows = east_west_rows();
    let spec = PivotSpec {
        rows: vec![
            PivotDimensionField::new("Region"),
            PivotDimensionField::new("Product"),
        ],
        columns: vec![PivotDimensionField::new("Product")],
        values: vec![PivotValueField::new("Sales", Aggregation::Sum)],
        ..PivotSpec::default()
    };
    let table = compute_pivot(&rows, &spec, &ExpansionState::new());
    let mut expansion = ExpansionState::new();
    expansion.expand(NodeId::from("root:West:0"));

    let rendered = render_pivot(&table, &expansion, &spec.rows);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Region › Product  A    B    Grand Total",
            "----------------  ---  ---  -----------",
            "+ East             10    5           15",
            "- West              7    0            7",
            "  A                 7    0            7",
        ]
    );
}
