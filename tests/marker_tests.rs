//! Marker decisions: precedence, run modes, reasons and once-only evaluation.

use std::sync::Arc;

use verdict::condition::{Condition, ConditionContext, ConditionEvaluator, ExprError};
use verdict::config::{RunMode, RunOptions};
use verdict::location::{InvocationRoot, LocationResolver, RawFrame};
use verdict::marker::{Marker, MarkerDecision, MarkerDecisionEngine, TestItem};

fn engine(options: &RunOptions) -> MarkerDecisionEngine {
    let root = InvocationRoot::new(std::env::temp_dir().join("verdict-marker-tests")).unwrap();
    MarkerDecisionEngine::new(
        ConditionEvaluator::with_options(options),
        LocationResolver::new(root),
        options,
    )
}

fn item(markers: Vec<Marker>) -> TestItem {
    item_in(Arc::new(ConditionContext::new("test_mod")), markers)
}

fn item_in(context: Arc<ConditionContext>, markers: Vec<Marker>) -> TestItem {
    TestItem::new(
        "tests/test_mod.py::test_it",
        RawFrame::new("tests/test_mod.py", 17, "test_it"),
        context,
        markers,
    )
}

fn xfail_if(condition: impl Into<Condition>, reason: Option<&str>) -> Marker {
    Marker::Xfail {
        conditions: vec![condition.into()],
        reason: reason.map(str::to_string),
        strict: None,
        run: true,
        raises: None,
    }
}

#[test]
fn unconditional_skip_reports_item_location_in_both_modes() {
    let engine = engine(&RunOptions::default());
    let expected = engine.resolver().resolve(&RawFrame::new("tests/test_mod.py", 17, "test_it"));

    for mode in [RunMode::Normal, RunMode::RunXfail] {
        let item = item(vec![Marker::Skip { reason: None }]);
        let decision = engine.decide(&item, mode).unwrap();
        let MarkerDecision::Skip(skip) = decision else {
            panic!("expected skip under {:?}, got {:?}", mode, decision);
        };
        assert_eq!(skip.reason, "unconditional skip");
        assert_eq!(skip.location, expected);
        assert_eq!(skip.location.to_string(), "tests/test_mod.py:17");
    }
}

#[test]
fn skip_decisions_do_not_depend_on_run_mode() {
    let engine = engine(&RunOptions::default());
    let cases = vec![
        vec![Marker::skip("not today")],
        vec![Marker::skipif("True", None)],
        vec![Marker::skipif("False", None)],
        vec![Marker::skip("s"), Marker::xfail("x")],
        vec![Marker::xfail("x")],
        vec![],
    ];
    for markers in cases {
        let normal = item(markers.clone());
        let runxfail = item(markers.clone());
        let a = engine.decide(&normal, RunMode::Normal).unwrap();
        let b = engine.decide(&runxfail, RunMode::RunXfail).unwrap();
        let skip_a = matches!(a, MarkerDecision::Skip(_)).then(|| a.clone());
        let skip_b = matches!(b, MarkerDecision::Skip(_)).then(|| b.clone());
        assert_eq!(skip_a, skip_b, "markers: {:?}", markers);
    }
}

#[test]
fn skip_wins_over_xfail() {
    let engine = engine(&RunOptions::default());
    let item = item(vec![Marker::xfail("flaky"), Marker::skip("broken env")]);
    let decision = engine.decide(&item, RunMode::Normal).unwrap();
    assert!(matches!(decision, MarkerDecision::Skip(skip) if skip.reason == "broken env"));
}

#[test]
fn conditional_skip_is_checked_before_unconditional() {
    let engine = engine(&RunOptions::default());
    let item = item(vec![
        Marker::skip("plain"),
        Marker::skipif("1 == 1", Some("conditional")),
    ]);
    let decision = engine.decide(&item, RunMode::Normal).unwrap();
    assert!(matches!(decision, MarkerDecision::Skip(skip) if skip.reason == "conditional"));
}

#[test]
fn runxfail_runs_xfail_items() {
    let engine = engine(&RunOptions::default());
    let item = item(vec![Marker::xfail("known bug")]);
    assert_eq!(engine.decide(&item, RunMode::RunXfail).unwrap(), &MarkerDecision::Run);
}

#[test]
fn xfail_picks_up_default_strictness() {
    let options = RunOptions {
        xfail_strict: true,
        ..RunOptions::default()
    };
    let engine = engine(&options);
    let item = item(vec![Marker::xfail("known bug")]);
    let MarkerDecision::ExpectedFailure(xfail) = engine.decide(&item, RunMode::Normal).unwrap()
    else {
        panic!("expected xfail");
    };
    assert!(xfail.strict);
    assert!(xfail.run);
    assert_eq!(xfail.reason, "known bug");
}

#[test]
fn explicit_strictness_overrides_default() {
    let options = RunOptions {
        xfail_strict: true,
        ..RunOptions::default()
    };
    let engine = engine(&options);
    let item = item(vec![Marker::Xfail {
        conditions: Vec::new(),
        reason: None,
        strict: Some(false),
        run: false,
        raises: Some(vec!["KeyError".to_string()]),
    }]);
    let MarkerDecision::ExpectedFailure(xfail) = engine.decide(&item, RunMode::Normal).unwrap()
    else {
        panic!("expected xfail");
    };
    assert!(!xfail.strict);
    assert!(!xfail.run);
    assert_eq!(xfail.raises, Some(vec!["KeyError".to_string()]));
}

#[test]
fn string_condition_default_reason() {
    let engine = engine(&RunOptions::default());
    let ctx = Arc::new(ConditionContext::new("m").bind("slow", true));
    let item = item_in(ctx, vec![Marker::skipif("slow", None)]);
    let decision = engine.decide(&item, RunMode::Normal).unwrap();
    assert!(matches!(decision, MarkerDecision::Skip(skip) if skip.reason == "condition: slow"));
}

#[test]
fn false_xfail_condition_runs() {
    let engine = engine(&RunOptions::default());
    let item = item(vec![xfail_if("False", None)]);
    assert_eq!(engine.decide(&item, RunMode::Normal).unwrap(), &MarkerDecision::Run);
}

#[test]
fn boolean_condition_without_reason_is_an_error() {
    let engine = engine(&RunOptions::default());
    let item = item(vec![Marker::skipif(true, None)]);
    let err = engine.decide(&item, RunMode::Normal).unwrap_err();
    assert!(matches!(err.error(), ExprError::MissingReason { .. }));
    assert_eq!(err.marker(), "skipif");
    assert!(err.to_string().contains("reason=STRING"));
}

#[test]
fn boolean_condition_with_reason_is_fine() {
    let engine = engine(&RunOptions::default());
    let item = item(vec![xfail_if(true, Some("platform bug"))]);
    let decision = engine.decide(&item, RunMode::Normal).unwrap();
    assert!(
        matches!(decision, MarkerDecision::ExpectedFailure(x) if x.reason == "platform bug")
    );
}

#[test]
fn decision_is_computed_once() {
    let engine = engine(&RunOptions::default());
    let ctx = Arc::new(ConditionContext::new("m").bind("flag", true));
    let item = item_in(ctx, vec![Marker::skipif("flag", None)]);

    assert!(item.decision().is_none());
    let first = engine.decide(&item, RunMode::Normal).unwrap().clone();
    let second = engine.decide(&item, RunMode::RunXfail).unwrap().clone();
    assert_eq!(first, second);
    assert!(item.decision().is_some());

    let stats = engine.evaluator().stats();
    assert_eq!(stats.evaluations + stats.hits, 1);
}

#[test]
fn condition_errors_are_attached_to_the_item() {
    let engine = engine(&RunOptions::default());
    let ctx = Arc::new(ConditionContext::new("test_broken"));
    let ctx_id = ctx.id();
    let item = item_in(ctx, vec![xfail_if("undefined_name", None)]);

    let err = engine.decide(&item, RunMode::Normal).unwrap_err();
    assert_eq!(err.marker(), "xfail");
    assert_eq!(err.context_id(), ctx_id);
    assert!(err.to_string().contains("undefined_name"));
    assert!(matches!(item.decision(), Some(Err(_))));
}

#[test]
fn contexts_are_respected_per_item() {
    let engine = engine(&RunOptions::default());
    let a = item_in(
        Arc::new(ConditionContext::new("test_module_1").bind("skip", true)),
        vec![Marker::skipif("skip", None)],
    );
    let b = item_in(
        Arc::new(ConditionContext::new("test_module_2").bind("skip", false)),
        vec![Marker::skipif("skip", None)],
    );
    assert!(matches!(engine.decide(&a, RunMode::Normal).unwrap(), MarkerDecision::Skip(_)));
    assert_eq!(engine.decide(&b, RunMode::Normal).unwrap(), &MarkerDecision::Run);
}
