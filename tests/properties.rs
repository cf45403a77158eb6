use proptest::prelude::*;

use pivot_workbench::{
    aggregate::Aggregation,
    columns::ColumnKey,
    data::{Row, Value, row},
    filter::PivotFilter,
    flatten::{ExpansionState, flatten},
    pivot::{PivotDimensionField, PivotSpec, PivotTable, PivotValueField, compute_pivot},
    tree::NodeId,
};

fn arb_row() -> impl Strategy<Value = Row> {
    (
        prop::option::of(prop::sample::select(vec!["East", "West", "North", ""])),
        prop::sample::select(vec!["A", "B", "C"]),
        prop::sample::select(vec!["Q1", "Q2"]),
        -50i32..=50,
    )
        .prop_map(|(region, product, quarter, sales)| {
            let mut cells = vec![
                ("Product", Value::from(product)),
                ("Quarter", Value::from(quarter)),
                ("Sales", Value::from(f64::from(sales))),
            ];
            if let Some(region) = region {
                cells.push(("Region", Value::from(region)));
            }
            row(cells)
        })
}

fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(arb_row(), 0..40)
}

fn spec(show_totals: bool) -> PivotSpec {
    PivotSpec {
        rows: vec![
            PivotDimensionField {
                show_totals,
                ..PivotDimensionField::new("Region")
            },
            PivotDimensionField::new("Product"),
        ],
        columns: vec![
            PivotDimensionField {
                show_totals,
                ..PivotDimensionField::new("Quarter")
            },
            PivotDimensionField::new("Product"),
        ],
        values: vec![
            PivotValueField::new("Sales", Aggregation::Sum),
            PivotValueField::new("Sales", Aggregation::Count),
        ],
        filters: Vec::new(),
    }
}

fn grand_sum(table: &PivotTable, node_index: usize) -> f64 {
    let column = table.column_position(&ColumnKey::GrandTotal).unwrap();
    table.rows[node_index].values.get(column, 0).unwrap()
}

proptest! {
    #[test]
    fn root_groups_partition_the_grand_total(rows in arb_rows()) {
        let table = compute_pivot(&rows, &spec(false), &ExpansionState::new());
        let expected: f64 = rows
            .iter()
            .filter_map(|r| r.get("Sales").and_then(Value::as_number))
            .sum();
        let grouped: f64 = (0..table.rows.len()).map(|idx| grand_sum(&table, idx)).sum();
        prop_assert_eq!(grouped, expected);
    }

    #[test]
    fn leaf_columns_add_up_to_grand_total_column(rows in arb_rows()) {
        let table = compute_pivot(&rows, &spec(true), &ExpansionState::new());
        let grand = table.column_position(&ColumnKey::GrandTotal).unwrap();
        for root in &table.rows {
            let leaves: f64 = table
                .columns
                .iter()
                .enumerate()
                .filter(|(_, key)| !key.is_total())
                .map(|(idx, _)| root.values.get(idx, 0).unwrap())
                .sum();
            prop_assert_eq!(leaves, root.values.get(grand, 0).unwrap());
        }
    }

    #[test]
    fn flatten_is_pure(rows in arb_rows(), expand_east in any::<bool>()) {
        let table = compute_pivot(&rows, &spec(true), &ExpansionState::new());
        let mut expansion = ExpansionState::new();
        if expand_east {
            expansion.expand(NodeId::from("root:East:0"));
        }
        let first = flatten(&table.rows, &expansion)
            .iter()
            .map(|n| n.id.clone())
            .collect::<Vec<_>>();
        let second = flatten(&table.rows, &expansion)
            .iter()
            .map(|n| n.id.clone())
            .collect::<Vec<_>>();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn filtering_only_shrinks_counts(rows in arb_rows(), keep in prop::sample::subsequence(vec!["A", "B", "C"], 1..=3)) {
        let broad = compute_pivot(&rows, &spec(false), &ExpansionState::new());
        let mut narrow_spec = spec(false);
        narrow_spec.filters.push(PivotFilter::new("Product", keep));
        let narrow = compute_pivot(&rows, &narrow_spec, &ExpansionState::new());

        prop_assert!(narrow.rows.len() <= broad.rows.len());
        let grand = narrow.column_position(&ColumnKey::GrandTotal).unwrap();
        let broad_grand = broad.column_position(&ColumnKey::GrandTotal).unwrap();
        for node in &narrow.rows {
            let wider = broad.rows.iter().find(|b| b.id == node.id);
            prop_assert!(wider.is_some());
            let wider = wider.unwrap();
            prop_assert!(node.values.get(grand, 1) <= wider.values.get(broad_grand, 1));
        }
    }
}
