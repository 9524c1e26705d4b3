use std::sync::Arc;
use vibeopt::analysis::{IrTypeAnalyzer, TypeAnalyzer, TypeProvider};
use vibeopt::config::OptimizerConfig;
use vibeopt::error::ExpressionError;
use vibeopt::function::{
    BuiltinFunctions, FunctionResolver, OperatorType, DATE_TRUNC_FUNCTION, FAIL_FUNCTION,
};
use vibeopt::interpreter::{ExpressionInterpreter, Folded, MapSymbolResolver, NoOpSymbolResolver};
use vibeopt::ir::{ArithmeticOperator, ComparisonOperator, Expression, Symbol, WhenClause};
use vibeopt::optimizer::IterativeOptimizer;
use vibeopt::plan::{Assignments, PlanNode};
use vibeopt::rule::simplify_filter_predicate::simplify_conjunct;
use vibeopt::rule::{
    PruneFilterColumns, PruneOffsetColumns, PruneValuesColumns, RemoveRedundantDateTrunc,
    RuleContext, Session, SimplifyExpressions, SimplifyFilterPredicate,
};
use vibeopt::types::DataType;
use vibeopt::value::Value;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn functions() -> Arc<dyn FunctionResolver> {
    Arc::new(BuiltinFunctions::new())
}

fn symbol_types() -> TypeProvider {
    TypeProvider::new()
        .with("a", DataType::BigInt)
        .with("b", DataType::BigInt)
        .with("c", DataType::Varchar)
        .with("d", DataType::Date)
        .with("x", DataType::BigInt)
        .with("p", DataType::Boolean)
        .with("q", DataType::Boolean)
}

fn interpreter(expression: &Expression) -> anyhow::Result<ExpressionInterpreter> {
    let types = IrTypeAnalyzer::new(functions()).get_types(&symbol_types(), expression)?;
    Ok(ExpressionInterpreter::new(
        expression.clone(),
        functions(),
        types,
    )?)
}

fn context() -> RuleContext {
    RuleContext::new(Session::new("integration"), symbol_types(), functions())
}

fn add(left: Expression, right: Expression) -> anyhow::Result<Expression> {
    let function = functions().resolve_operator(OperatorType::Add, &[DataType::BigInt, DataType::BigInt])?;
    Ok(Expression::arithmetic(ArithmeticOperator::Add, function, left, right))
}

fn gt(left: Expression, right: Expression) -> Expression {
    Expression::comparison(ComparisonOperator::GreaterThan, left, right)
}

fn fail() -> anyhow::Result<Expression> {
    let function = functions().resolve_function(FAIL_FUNCTION, &[DataType::Varchar])?;
    Ok(Expression::call(function, vec![Expression::varchar("unreachable")]))
}

fn boolean_bindings() -> Vec<Value> {
    vec![Value::Boolean(true), Value::Boolean(false), Value::Null]
}

#[test]
fn test_coalesce_folds_to_first_non_null() -> anyhow::Result<()> {
    init_logger();
    let expression = Expression::coalesce(vec![
        Expression::null(DataType::BigInt),
        Expression::bigint(5),
        Expression::symbol("x"),
    ]);
    let folded = interpreter(&expression)?.optimize(&NoOpSymbolResolver)?;
    assert_eq!(folded, Folded::Value(Value::BigInt(5)));
    Ok(())
}

#[test]
fn test_case_with_true_first_branch_folds() -> anyhow::Result<()> {
    init_logger();
    let expression = Expression::searched_case(
        vec![
            WhenClause::new(Expression::boolean(true), Expression::bigint(1)),
            WhenClause::new(
                gt(Expression::symbol("x"), Expression::bigint(0)),
                Expression::bigint(2),
            ),
        ],
        Some(Expression::bigint(3)),
    );
    let folded = interpreter(&expression)?.optimize(&NoOpSymbolResolver)?;
    assert_eq!(folded, Folded::Value(Value::BigInt(1)));
    Ok(())
}

#[test]
fn test_date_trunc_day_removed_from_projection() -> anyhow::Result<()> {
    init_logger();
    let context = context();
    let ids = context.id_allocator();
    let date_trunc = functions()
        .resolve_function(DATE_TRUNC_FUNCTION, &[DataType::Varchar, DataType::Date])?;
    let values = PlanNode::values(ids.next_id(), vec![Symbol::new("d")], vec![]);
    let project = PlanNode::project(
        ids.next_id(),
        values,
        Assignments::new().with(
            Symbol::new("t"),
            Expression::call(
                date_trunc,
                vec![Expression::varchar("day"), Expression::symbol("d")],
            ),
        ),
    );

    let optimizer = IterativeOptimizer::new(RemoveRedundantDateTrunc::rules());
    let result = optimizer.optimize(project, &context)?;
    assert_eq!(result.rules_applied, 1);
    match &result.plan {
        PlanNode::Project { assignments, .. } => {
            assert_eq!(
                assignments.get(&Symbol::new("t")),
                Some(&Expression::symbol("d"))
            );
        }
        other => panic!("unexpected plan {:?}", other),
    }
    Ok(())
}

#[test]
fn test_in_predicate_null_semantics() -> anyhow::Result<()> {
    init_logger();
    let one_two_three = || vec![Expression::bigint(1), Expression::bigint(2), Expression::bigint(3)];

    let null_probe = Expression::in_list(Expression::null(DataType::BigInt), one_two_three());
    assert_eq!(interpreter(&null_probe)?.evaluate()?, Value::Null);

    let found = Expression::in_list(Expression::bigint(3), one_two_three());
    assert_eq!(interpreter(&found)?.evaluate()?, Value::Boolean(true));

    let with_null = Expression::in_list(
        Expression::bigint(4),
        vec![
            Expression::bigint(1),
            Expression::bigint(2),
            Expression::null(DataType::BigInt),
        ],
    );
    assert_eq!(interpreter(&with_null)?.evaluate()?, Value::Null);
    Ok(())
}

#[test]
fn test_filter_case_simplified_to_condition() -> anyhow::Result<()> {
    init_logger();
    let context = context();
    let ids = context.id_allocator();
    let values = PlanNode::values(ids.next_id(), vec![Symbol::new("p")], vec![]);
    let predicate = Expression::searched_case(
        vec![WhenClause::new(Expression::symbol("p"), Expression::boolean(true))],
        Some(Expression::boolean(false)),
    );
    let filter = PlanNode::filter(ids.next_id(), values, predicate);

    let mut optimizer = IterativeOptimizer::default();
    optimizer.add_rule(SimplifyFilterPredicate);
    let result = optimizer.optimize(filter, &context)?;
    assert_eq!(result.rules_applied, 1);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.plan.explain(), "Filter p\n  Values [p] rows=\n");
    Ok(())
}

#[test]
fn test_offset_input_pruned_to_referenced_columns() -> anyhow::Result<()> {
    init_logger();
    let context = context();
    let ids = context.id_allocator();
    let values = PlanNode::values(
        ids.next_id(),
        vec![Symbol::new("a"), Symbol::new("b")],
        vec![Expression::row(vec![Expression::bigint(1), Expression::bigint(2)])],
    );
    let offset = PlanNode::offset(ids.next_id(), values, 1);
    let project = PlanNode::project(
        ids.next_id(),
        offset,
        Assignments::identity(&[Symbol::new("b")]),
    );

    let mut optimizer = IterativeOptimizer::default();
    optimizer.add_rule(PruneOffsetColumns);
    let result = optimizer.optimize(project, &context)?;
    assert_eq!(result.rules_applied, 1);
    assert_eq!(
        result.plan.explain(),
        "Project [b := b]\n  Offset 1\n    Project [b := b]\n      Values [a, b] rows=ROW(1, 2)\n"
    );
    Ok(())
}

#[test]
fn test_short_circuit_skips_failing_operand() -> anyhow::Result<()> {
    init_logger();
    let and = Expression::and(vec![Expression::boolean(false), fail()?]);
    assert_eq!(interpreter(&and)?.evaluate()?, Value::Boolean(false));

    let or = Expression::or(vec![Expression::boolean(true), fail()?]);
    assert_eq!(interpreter(&or)?.evaluate()?, Value::Boolean(true));

    let reached = Expression::and(vec![Expression::boolean(true), fail()?]);
    assert_eq!(
        interpreter(&reached)?.evaluate(),
        Err(ExpressionError::UserFailure("unreachable".to_string()))
    );
    Ok(())
}

#[test]
fn test_optimize_defers_failure_and_evaluate_raises_it() -> anyhow::Result<()> {
    init_logger();
    let expression = Expression::searched_case(
        vec![WhenClause::new(Expression::symbol("p"), fail()?)],
        Some(Expression::boolean(true)),
    );
    let interpreter = interpreter(&expression)?;
    let folded = interpreter.optimize(&NoOpSymbolResolver)?;
    assert!(folded.is_residual());

    let taken = MapSymbolResolver::new().with("p", Value::Boolean(true));
    assert!(matches!(
        interpreter.evaluate_with(&taken),
        Err(ExpressionError::UserFailure(_))
    ));
    let skipped = MapSymbolResolver::new().with("p", Value::Boolean(false));
    assert_eq!(interpreter.evaluate_with(&skipped)?, Value::Boolean(true));
    Ok(())
}

#[test]
fn test_in_list_cache_does_not_change_results() -> anyhow::Result<()> {
    init_logger();
    let expression = Expression::in_list(
        Expression::symbol("a"),
        vec![
            Expression::bigint(1),
            Expression::bigint(2),
            Expression::null(DataType::BigInt),
            Expression::bigint(3),
        ],
    );
    let cached = interpreter(&expression)?;
    let uncached = interpreter(&expression)?.with_in_list_cache(false);

    for probe in [Value::BigInt(1), Value::BigInt(3), Value::BigInt(7), Value::Null] {
        let resolver = MapSymbolResolver::new().with("a", probe.clone());
        let cold = cached.evaluate_with(&resolver)?;
        let warm = cached.evaluate_with(&resolver)?;
        let plain = uncached.evaluate_with(&resolver)?;
        assert_eq!(cold, warm, "probe {}", probe);
        assert_eq!(cold, plain, "probe {}", probe);
    }
    assert_eq!(uncached.cached_in_lists(), 0);
    Ok(())
}

#[test]
fn test_optimized_expression_agrees_with_original() -> anyhow::Result<()> {
    init_logger();
    let expressions = vec![
        Expression::searched_case(
            vec![WhenClause::new(
                gt(Expression::symbol("a"), add(Expression::bigint(1), Expression::bigint(1))?),
                Expression::symbol("b"),
            )],
            Some(Expression::coalesce(vec![
                Expression::null(DataType::BigInt),
                Expression::symbol("a"),
            ])),
        ),
        Expression::in_list(
            Expression::symbol("a"),
            vec![Expression::bigint(1), Expression::symbol("b"), Expression::bigint(1)],
        ),
        Expression::not(Expression::and(vec![
            Expression::equal(Expression::symbol("a"), add(Expression::bigint(0), Expression::bigint(2))?),
            Expression::is_null(Expression::symbol("b")),
        ])),
        Expression::between(
            Expression::symbol("a"),
            Expression::bigint(0),
            add(Expression::symbol("b"), Expression::bigint(1))?,
        ),
    ];
    let bindings = [
        (Value::BigInt(1), Value::BigInt(1)),
        (Value::BigInt(2), Value::Null),
        (Value::BigInt(3), Value::BigInt(-5)),
        (Value::Null, Value::BigInt(2)),
    ];

    for expression in &expressions {
        let original = interpreter(expression)?;
        let root_type = original.result_type()?.clone();
        let optimized = original
            .optimize(&NoOpSymbolResolver)?
            .into_expression(root_type);
        let optimized_interpreter = interpreter(&optimized)?;

        for (a, b) in &bindings {
            let resolver = MapSymbolResolver::new()
                .with("a", a.clone())
                .with("b", b.clone());
            assert_eq!(
                optimized_interpreter.evaluate_with(&resolver)?,
                original.evaluate_with(&resolver)?,
                "{} vs {} with a={}, b={}",
                optimized,
                expression,
                a,
                b
            );
        }
    }
    Ok(())
}

#[test]
fn test_evaluation_is_deterministic() -> anyhow::Result<()> {
    init_logger();
    let expression = Expression::row(vec![
        add(Expression::bigint(40), Expression::bigint(2))?,
        Expression::in_list(Expression::bigint(2), vec![Expression::bigint(1), Expression::bigint(2)]),
        Expression::coalesce(vec![Expression::null(DataType::Varchar), Expression::varchar("v")]),
    ]);
    let first = interpreter(&expression)?.evaluate()?;
    let second = interpreter(&expression)?.evaluate()?;
    assert_eq!(first, second);
    assert_eq!(
        first,
        Value::Row(vec![Value::BigInt(42), Value::Boolean(true), Value::varchar("v")])
    );
    Ok(())
}

#[test]
fn test_filter_simplification_keeps_passing_rows() -> anyhow::Result<()> {
    init_logger();
    let p = || Expression::symbol("p");
    let q = || Expression::symbol("q");
    let conjuncts = vec![
        Expression::null_if(p(), q()),
        Expression::searched_case(
            vec![WhenClause::new(p(), Expression::boolean(false))],
            Some(Expression::boolean(true)),
        ),
        Expression::searched_case(
            vec![
                WhenClause::new(p(), Expression::boolean(false)),
                WhenClause::new(q(), Expression::boolean(true)),
            ],
            None,
        ),
        Expression::searched_case(
            vec![WhenClause::new(p(), q())],
            Some(q()),
        ),
    ];

    for conjunct in &conjuncts {
        let simplified = simplify_conjunct(conjunct)
            .ok_or_else(|| anyhow::anyhow!("{} was not simplified", conjunct))?;
        let original = interpreter(conjunct)?;
        let rewritten = interpreter(&simplified)?;
        for p in boolean_bindings() {
            for q in boolean_bindings() {
                let resolver = MapSymbolResolver::new().with("p", p.clone()).with("q", q.clone());
                let passes = |value: Value| value == Value::Boolean(true);
                assert_eq!(
                    passes(original.evaluate_with(&resolver)?),
                    passes(rewritten.evaluate_with(&resolver)?),
                    "{} vs {} with p={}, q={}",
                    conjunct,
                    simplified,
                    p,
                    q
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_all_rules_reach_a_fixpoint() -> anyhow::Result<()> {
    init_logger();
    let context = RuleContext::new(
        Session::new("fixpoint").with_config(OptimizerConfig::default().with_trace(true)),
        symbol_types(),
        functions(),
    );
    let ids = context.id_allocator();
    let date_trunc = functions()
        .resolve_function(DATE_TRUNC_FUNCTION, &[DataType::Varchar, DataType::Date])?;

    let values = PlanNode::values(
        ids.next_id(),
        ["a", "b", "c", "d"].iter().map(|n| Symbol::new(*n)).collect(),
        vec![
            Expression::row(vec![
                Expression::bigint(1),
                Expression::bigint(10),
                Expression::varchar("x"),
                Expression::date(0),
            ]),
            Expression::row(vec![
                Expression::bigint(-1),
                Expression::bigint(20),
                Expression::varchar("y"),
                Expression::date(1),
            ]),
        ],
    );
    let filter = PlanNode::filter(
        ids.next_id(),
        values,
        Expression::searched_case(
            vec![WhenClause::new(
                gt(Expression::symbol("a"), Expression::bigint(0)),
                Expression::boolean(true),
            )],
            Some(Expression::boolean(false)),
        ),
    );
    let project = PlanNode::project(
        ids.next_id(),
        filter,
        Assignments::new()
            .with(Symbol::new("b"), Expression::symbol("b"))
            .with(
                Symbol::new("t"),
                Expression::call(
                    date_trunc,
                    vec![Expression::varchar("day"), Expression::symbol("d")],
                ),
            ),
    );

    let mut optimizer = IterativeOptimizer::new(SimplifyExpressions::rules());
    optimizer.add_rules(RemoveRedundantDateTrunc::rules());
    optimizer.add_rule(SimplifyFilterPredicate);
    optimizer.add_rule(PruneFilterColumns);
    optimizer.add_rule(PruneValuesColumns);
    optimizer.add_rule(PruneOffsetColumns);

    let result = optimizer.optimize(project, &context)?;
    assert!(result.iterations < context.session().config().max_iterations);
    assert_eq!(result.trace.len(), result.rules_applied);

    match &result.plan {
        PlanNode::Project {
            assignments,
            source,
            ..
        } => {
            assert_eq!(
                assignments.get(&Symbol::new("t")),
                Some(&Expression::symbol("d"))
            );
            match source.as_ref() {
                PlanNode::Filter { predicate, source, .. } => {
                    assert_eq!(predicate.to_string(), "(a > 0)");
                    assert_eq!(
                        source.output_symbols(),
                        vec![Symbol::new("a"), Symbol::new("b"), Symbol::new("d")]
                    );
                }
                other => panic!("unexpected node {:?}", other),
            }
        }
        other => panic!("unexpected plan {:?}", other),
    }

    let again = optimizer.optimize(result.plan.clone(), &context)?;
    assert_eq!(again.rules_applied, 0);
    assert_eq!(again.plan, result.plan);
    Ok(())
}
