//! End-to-end determinism tests for the compile pipeline.
//!
//! Every scenario goes draft → validate → transform → canonicalize → hash
//! through the public API only.

use algoforge_core::canonical::canonicalize;
use algoforge_core::document::StrategyDocument;
use algoforge_core::draft::{
    ConditionDraft, IndicatorDraft, Operand, Operator, Params, StopLossDraft,
};
use algoforge_core::{
    compile, compile_many, document_hash, hash_canonical, json_hash, transform, validate_draft,
    IndicatorRegistry, StrategyDraft, StrategyHash,
};

// ─── Fixtures ────────────────────────────────────────────────────────

fn ema(id: &str, period: i32) -> IndicatorDraft {
    IndicatorDraft::new(
        id,
        "ema",
        Params::new().with("source", "close").with("period", period),
    )
}

fn ema_cross() -> StrategyDraft {
    let mut draft = StrategyDraft::empty();
    draft.name = "EMA Cross".into();
    draft.indicators = vec![ema("ema_fast", 12), ema("ema_slow", 26)];
    draft.entry.long.conditions = vec![ConditionDraft::new(
        Operand::indicator("ema_fast"),
        Operator::CrossAbove,
        Operand::indicator("ema_slow"),
    )];
    draft.stop_loss = StopLossDraft::FixedPercent { percent: 2.0 };
    draft
}

fn pipeline_hash(draft: &StrategyDraft) -> StrategyHash {
    let document = transform(draft).expect("draft should be valid");
    hash_canonical(&canonicalize(&document).expect("document should canonicalize"))
}

fn pipeline_canonical(draft: &StrategyDraft) -> String {
    canonicalize(&transform(draft).unwrap()).unwrap()
}

// ── Concrete scenario ──

#[test]
fn ema_cross_compiles_to_stable_identity() {
    let draft = ema_cross();
    assert!(validate_draft(&draft).is_valid);

    let canonical = pipeline_canonical(&draft);
    assert!(!canonical.contains("EMA Cross"));

    let first = pipeline_hash(&draft);
    assert_eq!(first.as_str().len(), 64);
    assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    for _ in 0..1000 {
        assert_eq!(pipeline_hash(&draft), first);
    }
}

#[test]
fn ema_cross_canonical_form() {
    let canonical = pipeline_canonical(&ema_cross());
    assert_eq!(
        canonical,
        concat!(
            r#"{"entry":{"long":{"and":[{"left":{"ref":"ema_fast"},"op":"cross_above","right":{"ref":"ema_slow"}}]},"short":{"and":[]}},"#,
            r#""hook":{"enabled":false},"#,
            r#""indicators":[{"id":"ema_fast","params":{"period":12,"source":"close"},"type":"ema"},"#,
            r#"{"id":"ema_slow","params":{"period":26,"source":"close"},"type":"ema"}],"#,
            r#""reverse":{"enabled":true,"mode":"use_entry_opposite"},"#,
            r#""schema_version":"1.0","#,
            r#""stop_loss":{"percent":2,"type":"fixed_percent"}}"#,
        )
    );
}

// ── Idempotence ──

#[test]
fn repeated_compilation_is_idempotent() {
    let draft = ema_cross();
    let first = compile(&draft).unwrap();
    for _ in 0..100 {
        let again = compile(&draft).unwrap();
        assert_eq!(again.identity, first.identity);
        assert_eq!(again.canonical, first.canonical);
    }
}

#[test]
fn concurrent_compilation_agrees() {
    let draft = ema_cross();
    let expected = pipeline_hash(&draft);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| (0..100).map(|_| pipeline_hash(&draft)).collect::<Vec<_>>()))
            .collect();
        for handle in handles {
            for hash in handle.join().unwrap() {
                assert_eq!(hash, expected);
            }
        }
    });

    let batch: Vec<_> = std::iter::repeat(draft).take(256).collect();
    for result in compile_many(&batch) {
        assert_eq!(result.unwrap().identity, expected);
    }
}

// ── Metadata invariance ──

#[test]
fn name_and_description_do_not_affect_identity() {
    let a = ema_cross();
    let mut b = ema_cross();
    b.name = "Completely different".into();
    b.description = "with a description".into();

    assert_eq!(pipeline_canonical(&a), pipeline_canonical(&b));
    assert_eq!(pipeline_hash(&a), pipeline_hash(&b));

    let doc_b = transform(&b).unwrap();
    assert_eq!(doc_b.meta.name, "Completely different");
}

#[test]
fn condition_temp_ids_do_not_affect_identity() {
    let a = ema_cross();
    let b = ema_cross();
    assert_ne!(
        a.entry.long.conditions[0].temp_id,
        b.entry.long.conditions[0].temp_id
    );
    assert_eq!(pipeline_hash(&a), pipeline_hash(&b));
}

// ── Key-order invariance ──

#[test]
fn param_insertion_order_does_not_affect_identity() {
    let a = ema_cross();
    let mut b = ema_cross();
    b.indicators[0].params = Params::new().with("period", 12).with("source", "close");
    b.indicators[1].params = Params::new().with("period", 26).with("source", "close");

    assert_ne!(a.indicators[0].params, b.indicators[0].params);
    assert_eq!(pipeline_canonical(&a), pipeline_canonical(&b));
}

#[test]
fn json_key_order_does_not_affect_identity() {
    let forward = r#"{
        "name": "EMA Cross",
        "indicators": [
            {"id": "ema_fast", "type": "ema", "params": {"source": "close", "period": 12}},
            {"id": "ema_slow", "type": "ema", "params": {"source": "close", "period": 26}}
        ],
        "entry": {"long": {"conditions": [{
            "left": {"type": "indicator", "value": "ema_fast"},
            "operator": "cross_above",
            "right": {"type": "indicator", "value": "ema_slow"}
        }]}, "short": {"conditions": []}},
        "stopLoss": {"type": "fixed_percent", "percent": 2}
    }"#;
    let shuffled = r#"{
        "stopLoss": {"percent": 2, "type": "fixed_percent"},
        "entry": {"short": {"conditions": []}, "long": {"conditions": [{
            "right": {"value": "ema_slow", "type": "indicator"},
            "operator": "cross_above",
            "left": {"value": "ema_fast", "type": "indicator"}
        }]}},
        "indicators": [
            {"params": {"period": 12, "source": "close"}, "type": "ema", "id": "ema_fast"},
            {"type": "ema", "params": {"period": 26, "source": "close"}, "id": "ema_slow"}
        ],
        "name": "EMA Cross"
    }"#;
    let a: StrategyDraft = serde_json::from_str(forward).unwrap();
    let b: StrategyDraft = serde_json::from_str(shuffled).unwrap();
    assert_eq!(pipeline_hash(&a), pipeline_hash(&b));
    assert_eq!(pipeline_hash(&a), pipeline_hash(&ema_cross()));
}

#[test]
fn incremental_and_deserialized_drafts_agree() {
    let registry = IndicatorRegistry::builtin();
    let mut incremental = StrategyDraft::empty();
    incremental.name = "EMA Cross".into();
    let fast = incremental.add_indicator_of_type(&registry, "ema").unwrap();
    let slow = incremental.add_indicator_of_type(&registry, "ema").unwrap();
    incremental.set_param(&fast, "period", 12).unwrap();
    incremental.set_param(&slow, "period", 26).unwrap();
    incremental.rename_indicator(&fast, "ema_fast").unwrap();
    incremental.rename_indicator(&slow, "ema_slow").unwrap();
    incremental.entry.long.conditions.push(ConditionDraft::new(
        Operand::indicator("ema_fast"),
        Operator::CrossAbove,
        Operand::indicator("ema_slow"),
    ));

    let text = serde_json::to_string(&incremental).unwrap();
    let rebuilt: StrategyDraft = serde_json::from_str(&text).unwrap();

    assert_eq!(pipeline_canonical(&incremental), pipeline_canonical(&rebuilt));
    assert_eq!(pipeline_hash(&incremental), pipeline_hash(&ema_cross()));
}

// ── Array-order sensitivity ──

#[test]
fn reversing_indicators_changes_identity() {
    let a = ema_cross();
    let mut b = ema_cross();
    b.indicators.reverse();
    assert!(validate_draft(&b).is_valid);
    assert_ne!(pipeline_canonical(&a), pipeline_canonical(&b));
    assert_ne!(pipeline_hash(&a), pipeline_hash(&b));
}

#[test]
fn reversing_conditions_changes_identity() {
    let mut a = ema_cross();
    a.entry.long.conditions.push(ConditionDraft::new(
        Operand::indicator("ema_fast"),
        Operator::Gt,
        Operand::Number(100.0),
    ));
    let mut b = a.clone();
    b.entry.long.conditions.reverse();
    assert_ne!(pipeline_hash(&a), pipeline_hash(&b));
}

// ── Numeric precision ──

#[test]
fn stop_loss_precision_is_preserved() {
    let with_percent = |percent: f64| {
        let mut draft = ema_cross();
        draft.stop_loss = StopLossDraft::FixedPercent { percent };
        draft
    };
    let a = pipeline_hash(&with_percent(2.5));
    let b = pipeline_hash(&with_percent(2.50001));
    let c = pipeline_hash(&with_percent("2.5".parse().unwrap()));
    assert_ne!(a, b);
    assert_eq!(a, c);
    assert!(pipeline_canonical(&with_percent(2.50001)).contains(r#""percent":2.50001"#));
}

#[test]
fn integral_params_hash_like_their_float_form() {
    let a = ema_cross();
    let mut b = ema_cross();
    b.indicators[0].params.set("period", 12.0);
    assert_eq!(pipeline_hash(&a), pipeline_hash(&b));
}

// ── Round trip ──

#[test]
fn document_round_trip_preserves_identity() {
    let document = transform(&ema_cross()).unwrap();
    let before = document_hash(&document).unwrap();

    for pretty in [false, true] {
        let text = document.to_json_string(pretty).unwrap();
        let parsed = StrategyDocument::from_json_str(&text).unwrap();
        assert_eq!(parsed, document);
        assert_eq!(document_hash(&parsed).unwrap(), before);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json_hash(&value).unwrap(), before);
    }
}

#[test]
fn compiled_identity_matches_stored_document() {
    let compiled = compile(&ema_cross()).unwrap();
    let stored = serde_json::to_value(&compiled.document).unwrap();
    assert_eq!(json_hash(&stored).unwrap(), compiled.identity);
}

// ── Validator completeness ──

#[test]
fn empty_draft_reports_name_and_entry() {
    let result = validate_draft(&StrategyDraft::empty());
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.field == "name"));
    assert!(result.errors.iter().any(|e| e.field == "entry"));
}

#[test]
fn validation_result_uses_editor_shape() {
    let result = validate_draft(&StrategyDraft::empty());
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["isValid"], serde_json::json!(false));
    assert!(json["errors"][0]["field"].is_string());
    assert!(json["errors"][0]["message"].is_string());
}
