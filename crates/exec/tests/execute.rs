//! End-to-end plan execution tests.

use proptest::prelude::*;

use strata_core::{DataTable, Value};
use strata_exec::ast::Expr;
use strata_exec::executor::{execute, MemorySource};
use strata_exec::plan::{JoinKind, JoinSpec, Plan, PlanBuilder, Step};
use strata_exec::ExecError;

fn column_ints(table: &DataTable, name: &str) -> Vec<i64> {
    table
        .column(name)
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect()
}

fn users_source() -> MemorySource {
    let mut source = MemorySource::new();
    source.add_table(
        "users",
        vec!["id".into(), "name".into(), "age".into()],
        vec![
            vec![Value::Int(1), Value::from("ada"), Value::Int(36)],
            vec![Value::Int(2), Value::from("bob"), Value::Int(17)],
            vec![Value::Int(3), Value::from("cyd"), Value::Int(54)],
            vec![Value::Int(4), Value::from("dee"), Value::Int(17)],
        ],
    );
    source
}

fn scan_all(name: &str) -> Step {
    Step::Scan {
        source: name.into(),
        filter: None,
        projections: vec![],
        limit: None,
    }
}

#[test]
fn scan_with_filter_and_projection() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step(
            "users",
            Step::Scan {
                source: "users".into(),
                filter: Some(Expr::column("users", "age").ge(Expr::literal(18i64))),
                projections: vec![
                    Expr::column("users", "id"),
                    Expr::column("users", "name"),
                ],
                limit: None,
            },
            &[],
        )
        .build("users")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(result.column_names(), &["id".to_string(), "name".to_string()]);
    assert_eq!(column_ints(&result, "id"), vec![1, 3]);
}

#[test]
fn scan_limit_applies_after_filter() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step(
            "users",
            Step::Scan {
                source: "users".into(),
                filter: Some(Expr::column("users", "age").eq(Expr::literal(17i64))),
                projections: vec![Expr::column("users", "id")],
                limit: Some(1),
            },
            &[],
        )
        .build("users")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(column_ints(&result, "id"), vec![2]);
}

#[test]
fn scan_without_projections_keeps_all_columns() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step("users", scan_all("users"), &[])
        .build("users")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(result.width(), 3);
    assert_eq!(result.len(), 4);
}

/// Users plus an orders table referencing them.
fn join_source() -> MemorySource {
    let mut source = users_source();
    source.add_table(
        "orders",
        vec!["order_id".into(), "user_id".into(), "total".into()],
        vec![
            vec![Value::Int(100), Value::Int(1), Value::Int(5)],
            vec![Value::Int(101), Value::Int(3), Value::Int(9)],
            vec![Value::Int(102), Value::Int(1), Value::Int(2)],
            vec![Value::Int(103), Value::Int(9), Value::Int(4)],
        ],
    );
    source
}

fn inner_join_plan(projections: Vec<Expr>) -> Plan {
    PlanBuilder::new()
        .step("users", scan_all("users"), &[])
        .step("orders", scan_all("orders"), &[])
        .step(
            "joined",
            Step::Join {
                source: "users".into(),
                joins: vec![JoinSpec {
                    table: "orders".into(),
                    kind: JoinKind::Inner,
                    condition: Some(
                        Expr::column("users", "id").eq(Expr::column("orders", "user_id")),
                    ),
                }],
                projections,
            },
            &["users", "orders"],
        )
        .build("joined")
        .unwrap()
}

#[test]
fn inner_join_matches_keys() {
    let source = join_source();
    let plan = inner_join_plan(vec![
        Expr::column("users", "name"),
        Expr::column("orders", "order_id"),
    ]);
    let result = execute(&plan, &source).unwrap();

    // User 2 and 4 have no orders, order 103 has no user.
    assert_eq!(result.len(), 3);
    let mut pairs: Vec<(String, i64)> = result
        .iter()
        .map(|r| {
            (
                r.get("name").unwrap().as_str().unwrap().to_string(),
                r.get("order_id").unwrap().as_int().unwrap(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("ada".to_string(), 100),
            ("ada".to_string(), 102),
            ("cyd".to_string(), 101),
        ]
    );
}

#[test]
fn join_without_projections_exposes_both_sides() {
    let mut source = users_source();
    source.add_table(
        "orders",
        vec!["order_id".into(), "user_id".into(), "total".into()],
        vec![vec![Value::Int(100), Value::Int(1), Value::Int(5)]],
    );

    let plan = inner_join_plan(vec![]);
    let result = execute(&plan, &source).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.width(), 6);
    let row = result.row(0).unwrap();
    assert_eq!(row.get("name"), Some(&Value::from("ada")));
    assert_eq!(row.get("order_id"), Some(&Value::Int(100)));
}

#[test]
fn inner_join_emits_full_group_cross_product() {
    let mut source = MemorySource::new();
    source.add_table(
        "l",
        vec!["lk".into(), "lv".into()],
        vec![
            vec![Value::Int(1), Value::Int(10)],
            vec![Value::Int(1), Value::Int(11)],
            vec![Value::Int(2), Value::Int(12)],
        ],
    );
    source.add_table(
        "r",
        vec!["rk".into(), "rv".into()],
        vec![
            vec![Value::Int(1), Value::Int(20)],
            vec![Value::Int(1), Value::Int(21)],
            vec![Value::Int(1), Value::Int(22)],
        ],
    );

    let plan = PlanBuilder::new()
        .step("l", scan_all("l"), &[])
        .step("r", scan_all("r"), &[])
        .step(
            "joined",
            Step::Join {
                source: "l".into(),
                joins: vec![JoinSpec {
                    table: "r".into(),
                    kind: JoinKind::Inner,
                    condition: Some(Expr::column("l", "lk").eq(Expr::column("r", "rk"))),
                }],
                projections: vec![],
            },
            &["l", "r"],
        )
        .build("joined")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    // Key 1 matches 2 x 3 ways, key 2 matches nothing; every row carries
    // all four columns.
    assert_eq!(result.len(), 6);
    assert_eq!(result.width(), 4);
    for row in result.iter() {
        assert_eq!(row.get("lk"), row.get("rk"));
        assert!(row.get("lv").unwrap().as_int().is_some());
        assert!(row.get("rv").unwrap().as_int().is_some());
    }
}

#[test]
fn cross_join_cardinality() {
    let mut source = MemorySource::new();
    source.add_table(
        "a",
        vec!["x".into()],
        (0..3).map(|i| vec![Value::Int(i)]).collect(),
    );
    source.add_table(
        "b",
        vec!["y".into()],
        (0..4).map(|i| vec![Value::Int(i)]).collect(),
    );

    let plan = PlanBuilder::new()
        .step("a", scan_all("a"), &[])
        .step("b", scan_all("b"), &[])
        .step(
            "product",
            Step::Join {
                source: "a".into(),
                joins: vec![JoinSpec {
                    table: "b".into(),
                    kind: JoinKind::Cross,
                    condition: None,
                }],
                projections: vec![],
            },
            &["a", "b"],
        )
        .build("product")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(result.len(), 12);
    assert_eq!(result.width(), 2);
}

#[test]
fn aggregate_sum_by_group() {
    let mut source = MemorySource::new();
    source.add_table(
        "t",
        vec!["g".into(), "v".into()],
        vec![
            vec![Value::Int(2), Value::Int(5)],
            vec![Value::Int(1), Value::Int(10)],
            vec![Value::Int(1), Value::Int(20)],
        ],
    );

    let plan = PlanBuilder::new()
        .step("t", scan_all("t"), &[])
        .step(
            "totals",
            Step::Aggregate {
                group: vec![Expr::column("t", "g")],
                aggregations: vec![Expr::sum(Expr::column("t", "v")).alias("total")],
                operands: vec![],
            },
            &["t"],
        )
        .build("totals")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(result.column_names(), &["g".to_string(), "total".to_string()]);
    assert_eq!(column_ints(&result, "g"), vec![1, 2]);
    assert_eq!(column_ints(&result, "total"), vec![30, 5]);
}

#[test]
fn aggregate_with_operand_expression() {
    let mut source = MemorySource::new();
    source.add_table(
        "t",
        vec!["g".into(), "a".into(), "b".into()],
        vec![
            vec![Value::Int(1), Value::Int(1), Value::Int(2)],
            vec![Value::Int(1), Value::Int(3), Value::Int(4)],
            vec![Value::Int(2), Value::Int(5), Value::Int(5)],
        ],
    );

    // SUM(a + b): the sum's argument is hoisted into an operand column.
    let plan = PlanBuilder::new()
        .step("t", scan_all("t"), &[])
        .step(
            "totals",
            Step::Aggregate {
                group: vec![Expr::column("t", "g")],
                aggregations: vec![Expr::sum(Expr::column("t", "_sum_arg")).alias("total")],
                operands: vec![Expr::column("t", "a")
                    .add(Expr::column("t", "b"))
                    .alias("_sum_arg")],
            },
            &["t"],
        )
        .build("totals")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(column_ints(&result, "total"), vec![10, 10]);
}

#[test]
fn aggregate_count_by_group() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step("users", scan_all("users"), &[])
        .step(
            "counts",
            Step::Aggregate {
                group: vec![Expr::column("users", "age")],
                aggregations: vec![Expr::count(Expr::column("users", "id")).alias("n")],
                operands: vec![],
            },
            &["users"],
        )
        .build("counts")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(column_ints(&result, "age"), vec![17, 36, 54]);
    assert_eq!(column_ints(&result, "n"), vec![2, 1, 1]);
}

#[test]
fn aggregate_empty_input_yields_no_groups() {
    let mut source = MemorySource::new();
    source.add_table("t", vec!["g".into(), "v".into()], vec![]);

    let plan = PlanBuilder::new()
        .step("t", scan_all("t"), &[])
        .step(
            "totals",
            Step::Aggregate {
                group: vec![Expr::column("t", "g")],
                aggregations: vec![Expr::sum(Expr::column("t", "v")).alias("total")],
                operands: vec![],
            },
            &["t"],
        )
        .build("totals")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert!(result.is_empty());
}

#[test]
fn sort_descending_with_limit() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step("users", scan_all("users"), &[])
        .step(
            "oldest",
            Step::Sort {
                key: vec![Expr::column("users", "age").desc()],
                projections: vec![
                    Expr::column("users", "name"),
                    Expr::column("users", "age"),
                ],
                limit: Some(2),
            },
            &["users"],
        )
        .build("oldest")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(column_ints(&result, "age"), vec![54, 36]);
}

#[test]
fn sort_is_stable_on_equal_keys() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step("users", scan_all("users"), &[])
        .step(
            "by_age",
            Step::Sort {
                key: vec![Expr::column("users", "age")],
                projections: vec![Expr::column("users", "id")],
                limit: None,
            },
            &["users"],
        )
        .build("by_age")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    // Both 17-year-olds keep their input order.
    assert_eq!(column_ints(&result, "id"), vec![2, 4, 1, 3]);
}

#[test]
fn pipeline_scan_aggregate_sort() {
    let mut source = MemorySource::new();
    source.add_table(
        "sales",
        vec!["region".into(), "amount".into()],
        vec![
            vec![Value::from("east"), Value::Int(10)],
            vec![Value::from("west"), Value::Int(30)],
            vec![Value::from("east"), Value::Int(15)],
            vec![Value::from("north"), Value::Int(5)],
        ],
    );

    let plan = PlanBuilder::new()
        .step("sales", scan_all("sales"), &[])
        .step(
            "totals",
            Step::Aggregate {
                group: vec![Expr::column("sales", "region")],
                aggregations: vec![Expr::sum(Expr::column("sales", "amount")).alias("total")],
                operands: vec![],
            },
            &["sales"],
        )
        .step(
            "ranked",
            Step::Sort {
                key: vec![Expr::column("totals", "total").desc()],
                projections: vec![
                    Expr::column("totals", "region"),
                    Expr::column("totals", "total"),
                ],
                limit: None,
            },
            &["totals"],
        )
        .build("ranked")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    assert_eq!(column_ints(&result, "total"), vec![30, 25, 5]);
    assert_eq!(
        result.column("region").unwrap()[0],
        Value::from("west")
    );
}

#[test]
fn errors_name_the_failing_step() {
    let source = users_source();
    let plan = PlanBuilder::new()
        .step(
            "users",
            Step::Scan {
                source: "users".into(),
                filter: None,
                projections: vec![Expr::column("users", "missing")],
                limit: None,
            },
            &[],
        )
        .build("users")
        .unwrap();

    let err = execute(&plan, &source).unwrap_err();
    match err {
        ExecError::AtNode { node, .. } => assert_eq!(node, "users"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_source_table_fails() {
    let source = MemorySource::new();
    let plan = PlanBuilder::new()
        .step("ghost", scan_all("ghost"), &[])
        .build("ghost")
        .unwrap();
    assert!(execute(&plan, &source).is_err());
}

fn merge_join_pairs(left: &[i64], right: &[i64]) -> Vec<(i64, i64)> {
    let mut source = MemorySource::new();
    source.add_table(
        "l",
        vec!["lk".into()],
        left.iter().map(|&v| vec![Value::Int(v)]).collect(),
    );
    source.add_table(
        "r",
        vec!["rk".into()],
        right.iter().map(|&v| vec![Value::Int(v)]).collect(),
    );

    let plan = PlanBuilder::new()
        .step("l", scan_all("l"), &[])
        .step("r", scan_all("r"), &[])
        .step(
            "joined",
            Step::Join {
                source: "l".into(),
                joins: vec![JoinSpec {
                    table: "r".into(),
                    kind: JoinKind::Inner,
                    condition: Some(Expr::column("l", "lk").eq(Expr::column("r", "rk"))),
                }],
                projections: vec![Expr::column("l", "lk"), Expr::column("r", "rk")],
            },
            &["l", "r"],
        )
        .build("joined")
        .unwrap();

    let result = execute(&plan, &source).unwrap();
    let mut pairs: Vec<(i64, i64)> = result
        .iter()
        .map(|row| {
            (
                row.get("lk").unwrap().as_int().unwrap(),
                row.get("rk").unwrap().as_int().unwrap(),
            )
        })
        .collect();
    pairs.sort();
    pairs
}

#[test]
fn execute_is_idempotent() {
    let source = join_source();
    // A join sorts both inputs internally; running the plan twice must
    // still see the sources in their original state.
    let plan = inner_join_plan(vec![
        Expr::column("users", "name"),
        Expr::column("orders", "order_id"),
    ]);

    let first = execute(&plan, &source).unwrap();
    let second = execute(&plan, &source).unwrap();
    assert_eq!(first, second);
}

proptest! {
    #[test]
    fn cross_join_has_product_cardinality(
        a in 0usize..8,
        b in 0usize..8,
    ) {
        let mut source = MemorySource::new();
        source.add_table(
            "a",
            vec!["x".into()],
            (0..a as i64).map(|i| vec![Value::Int(i)]).collect(),
        );
        source.add_table(
            "b",
            vec!["y".into()],
            (0..b as i64).map(|i| vec![Value::Int(i)]).collect(),
        );

        let plan = PlanBuilder::new()
            .step("a", scan_all("a"), &[])
            .step("b", scan_all("b"), &[])
            .step(
                "product",
                Step::Join {
                    source: "a".into(),
                    joins: vec![JoinSpec {
                        table: "b".into(),
                        kind: JoinKind::Cross,
                        condition: None,
                    }],
                    projections: vec![],
                },
                &["a", "b"],
            )
            .build("product")
            .unwrap();

        let result = execute(&plan, &source).unwrap();
        prop_assert_eq!(result.len(), a * b);
    }

    #[test]
    fn merge_join_agrees_with_nested_loop(
        left in prop::collection::vec(-5i64..5, 0..12),
        right in prop::collection::vec(-5i64..5, 0..12),
    ) {
        let mut expected: Vec<(i64, i64)> = left
            .iter()
            .flat_map(|&l| right.iter().filter(move |&&r| r == l).map(move |&r| (l, r)))
            .collect();
        expected.sort();
        prop_assert_eq!(merge_join_pairs(&left, &right), expected);
    }

    #[test]
    fn sort_limit_is_a_prefix_of_full_sort(
        values in prop::collection::vec(-100i64..100, 0..30),
        limit in 0usize..10,
    ) {
        let mut source = MemorySource::new();
        source.add_table(
            "t",
            vec!["v".into()],
            values.iter().map(|&v| vec![Value::Int(v)]).collect(),
        );

        let build = |limit: Option<usize>| {
            PlanBuilder::new()
                .step("t", scan_all("t"), &[])
                .step(
                    "sorted",
                    Step::Sort {
                        key: vec![Expr::column("t", "v")],
                        projections: vec![Expr::column("t", "v")],
                        limit,
                    },
                    &["t"],
                )
                .build("sorted")
                .unwrap()
        };

        let full = execute(&build(None), &source).unwrap();
        let limited = execute(&build(Some(limit)), &source).unwrap();

        let full: Vec<i64> = column_ints(&full, "v");
        let limited: Vec<i64> = column_ints(&limited, "v");

        let mut sorted = values.clone();
        sorted.sort();
        prop_assert_eq!(&full, &sorted);
        prop_assert_eq!(&limited[..], &full[..limit.min(full.len())]);
    }

    #[test]
    fn aggregate_sum_matches_reference(
        rows in prop::collection::vec((0i64..4, -50i64..50), 0..25),
    ) {
        let mut source = MemorySource::new();
        source.add_table(
            "t",
            vec!["g".into(), "v".into()],
            rows.iter().map(|&(g, v)| vec![Value::Int(g), Value::Int(v)]).collect(),
        );

        let plan = PlanBuilder::new()
            .step("t", scan_all("t"), &[])
            .step(
                "totals",
                Step::Aggregate {
                    group: vec![Expr::column("t", "g")],
                    aggregations: vec![Expr::sum(Expr::column("t", "v")).alias("total")],
                    operands: vec![],
                },
                &["t"],
            )
            .build("totals")
            .unwrap();

        let result = execute(&plan, &source).unwrap();

        let mut expected: std::collections::BTreeMap<i64, i64> = Default::default();
        for &(g, v) in &rows {
            *expected.entry(g).or_insert(0) += v;
        }

        let actual: Vec<(i64, i64)> = result
            .iter()
            .map(|row| {
                (
                    row.get("g").unwrap().as_int().unwrap(),
                    row.get("total").unwrap().as_int().unwrap(),
                )
            })
            .collect();
        prop_assert_eq!(actual, expected.into_iter().collect::<Vec<_>>());
    }
}
