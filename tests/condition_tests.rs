//! Condition evaluation across contexts, caching and error reporting.

use verdict::condition::{
    Condition, ConditionContext, ConditionEvaluator, ExprError, Namespace, Value,
};
use verdict::config::RunOptions;

fn module(name: &str, skip: bool) -> ConditionContext {
    ConditionContext::new(name).bind("skip", skip)
}

#[test]
fn same_text_in_two_contexts_a_then_b() {
    let evaluator = ConditionEvaluator::new();
    let a = module("test_module_1", true);
    let b = module("test_module_2", false);

    assert!(evaluator.evaluate(&Condition::from("skip"), &a).unwrap());
    assert!(!evaluator.evaluate(&Condition::from("skip"), &b).unwrap());
}

#[test]
fn same_text_in_two_contexts_b_then_a() {
    let evaluator = ConditionEvaluator::new();
    let a = module("test_module_1", true);
    let b = module("test_module_2", false);

    assert!(!evaluator.evaluate(&Condition::from("skip"), &b).unwrap());
    assert!(evaluator.evaluate(&Condition::from("skip"), &a).unwrap());
}

#[test]
fn identical_bindings_still_have_distinct_identities() {
    let a = module("m", true);
    let b = module("m", true);
    assert_ne!(a.id(), b.id());
}

#[test]
fn repeated_evaluation_hits_the_cache() {
    let evaluator = ConditionEvaluator::new();
    let ctx = module("test_mod", true);

    for _ in 0..3 {
        assert!(evaluator.evaluate_expr("skip", &ctx).unwrap());
    }
    let stats = evaluator.stats();
    assert_eq!(stats.evaluations, 1);
    assert_eq!(stats.hits, 2);
}

#[test]
fn surrounding_whitespace_shares_a_cache_entry() {
    let evaluator = ConditionEvaluator::new();
    let ctx = module("test_mod", false);

    assert!(!evaluator.evaluate_expr("skip", &ctx).unwrap());
    assert!(!evaluator.evaluate_expr("  skip\n", &ctx).unwrap());
    assert_eq!(evaluator.stats().evaluations, 1);
}

#[test]
fn clearing_the_cache_forces_reevaluation() {
    let evaluator = ConditionEvaluator::new();
    let ctx = module("test_mod", true);
    evaluator.evaluate_expr("skip", &ctx).unwrap();
    evaluator.clear_cache();
    evaluator.evaluate_expr("skip", &ctx).unwrap();
    assert_eq!(evaluator.stats().evaluations, 2);
}

#[test]
fn booleans_bypass_evaluation() {
    let evaluator = ConditionEvaluator::new();
    let ctx = ConditionContext::new("m");
    assert!(evaluator.evaluate(&Condition::Bool(true), &ctx).unwrap());
    assert!(!evaluator.evaluate(&Condition::Bool(false), &ctx).unwrap());
    assert_eq!(evaluator.stats().evaluations, 0);
}

#[test]
fn error_names_condition_and_context() {
    let evaluator = ConditionEvaluator::new();
    let ctx = ConditionContext::new("test_broken");

    let err = evaluator.evaluate_expr("missing_flag", &ctx).unwrap_err();
    assert_eq!(err.condition(), "missing_flag");
    assert_eq!(err.context_id(), ctx.id());
    assert!(matches!(err.error(), ExprError::Name { name, .. } if name == "missing_flag"));

    let message = err.to_string();
    assert!(message.contains("'missing_flag'"), "{}", message);
    assert!(message.contains(&ctx.id().to_string()), "{}", message);
    assert!(
        message.contains("NameError: name 'missing_flag' is not defined"),
        "{}",
        message
    );
}

#[test]
fn failures_are_not_cached() {
    let evaluator = ConditionEvaluator::new();
    let ctx = ConditionContext::new("m");
    assert!(evaluator.evaluate_expr("undefined", &ctx).is_err());
    assert!(evaluator.evaluate_expr("undefined", &ctx).is_err());
    assert_eq!(evaluator.stats(), Default::default());
}

#[test]
fn syntax_errors_point_at_the_problem() {
    let evaluator = ConditionEvaluator::new();
    let ctx = ConditionContext::new("m");
    let err = evaluator.evaluate_expr("skip and", &ctx).unwrap_err();
    assert!(matches!(err.error(), ExprError::Syntax { .. }));
    let report = err.report_text();
    assert!(report.starts_with("Error evaluating 'condition' condition\n    skip and\n"));
    assert!(report.contains("SyntaxError"), "{}", report);
}

#[test]
fn builtins_are_visible_under_module_bindings() {
    let evaluator = ConditionEvaluator::new();
    let ctx = ConditionContext::new("m");
    let expected_posix = cfg!(unix);
    assert_eq!(
        evaluator.evaluate_expr("os.name == 'posix'", &ctx).unwrap(),
        expected_posix
    );
    assert!(evaluator
        .evaluate_expr("sys.platform != 'nonexistent'", &ctx)
        .unwrap());

    let shadowing = ConditionContext::new("m").bind("os", "shadowed");
    assert!(evaluator.evaluate_expr("os == 'shadowed'", &shadowing).unwrap());
}

#[test]
fn config_namespace_reflects_run_options() {
    let options = RunOptions {
        xfail_strict: true,
        ..RunOptions::default()
    };
    let evaluator = ConditionEvaluator::with_options(&options);
    let ctx = ConditionContext::new("m");
    assert!(evaluator
        .evaluate_expr("config.option.xfail_strict", &ctx)
        .unwrap());
    assert!(!evaluator.evaluate_expr("config.option.run_xfail", &ctx).unwrap());
}

#[test]
fn expressions_cover_comparisons_and_containers() {
    let evaluator = ConditionEvaluator::new();
    let mut version = Namespace::new();
    version.insert("major".to_string(), Value::Int(3));
    version.insert("minor".to_string(), Value::Int(8));
    let ctx = ConditionContext::new("m")
        .bind("version", Value::Map(version))
        .bind("features", Value::Seq(vec!["net".into(), "fs".into()]))
        .bind("ratio", 0.5);

    for (text, expected) in [
        ("version.major >= 3 and version.minor < 10", true),
        ("(version.major, version.minor) < (3, 9)", true),
        ("'net' in features", true),
        ("'gpu' not in features", true),
        ("0 < ratio < 1", true),
        ("not features", false),
        ("-version.major == -3", true),
        ("None or ratio", true),
    ] {
        assert_eq!(evaluator.evaluate_expr(text, &ctx).unwrap(), expected, "{}", text);
    }
}

#[test]
fn type_errors_surface_as_condition_errors() {
    let evaluator = ConditionEvaluator::new();
    let ctx = ConditionContext::new("m").bind("n", 1_i64);
    let err = evaluator.evaluate_expr("n < 'a'", &ctx).unwrap_err();
    assert_eq!(err.error().kind(), "TypeError");
}
