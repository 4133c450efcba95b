//! Contract tests for single and batch evaluation against a scripted service.

use std::sync::Arc;

use evalmy_core::fakes::{scored_body, statement, ScriptedTransport};
use evalmy_core::{
    Auth, EvalError, EvalOptions, EvaluationInput, Evaluator, EvaluatorConfig, ScoringDescriptor,
    ScoringOverride, Symbol, TransportResponse,
};
use serde_json::json;

fn evaluator(transport: &Arc<ScriptedTransport>) -> Evaluator {
    Evaluator::with_transport(
        Auth::azure("az-key", "https://example.openai.azure.com", "2024-02-01", "gpt-4o"),
        "token",
        EvaluatorConfig::default(),
        transport.clone(),
    )
}

fn nehori() -> serde_json::Value {
    json!({"expected": "Nehoří!", "actual": "Hoří!"})
}

#[tokio::test]
async fn contradiction_is_reported_with_projected_keys() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(TransportResponse::new(
        200,
        json!({
            "call_outputs": ["raw"],
            "reasoning": json!({"statements": [{
                "severity": "critical",
                "summary": "fire vs no fire",
                "reasoning": "The actual claims there is a fire.",
                "extra": 1
            }]})
            .to_string(),
            "scores": {"score": 0.0}
        })
        .to_string(),
    ));
    let ev = evaluator(&transport);

    let res = ev.evaluate(&nehori(), &EvalOptions::default()).await.unwrap();

    assert_eq!(res.score(Symbol::Contradictions), Some(0.0));
    let entry = res.get(Symbol::Contradictions).unwrap().as_object().unwrap();
    let keys: Vec<&str> = entry.keys().map(String::as_str).collect();
    assert_eq!(keys, ["scores", "reasoning"]);

    let stmt = &res.reasoning(Symbol::Contradictions).unwrap()["statements"][0];
    let stmt_keys: Vec<&str> = stmt
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(stmt_keys, ["severity", "summary", "reasoning"]);
}

#[tokio::test]
async fn results_follow_request_order() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_score(1.0, json!([]))
        .push_score(0.5, json!([statement("large", "gap", "missing a fact")]));
    let ev = evaluator(&transport);

    let res = ev
        .evaluate(
            &nehori(),
            &EvalOptions::default().with_symbols(&[Symbol::MissingFacts, Symbol::Contradictions]),
        )
        .await
        .unwrap();

    let names: Vec<&str> = res.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(names, ["missing_facts", "contradictions"]);
    assert_eq!(res.score(Symbol::MissingFacts), Some(1.0));
    assert_eq!(res.score(Symbol::Contradictions), Some(0.5));

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert!(urls[0].ends_with("/api/symbol/evaluate/missing_facts/v1"));
    assert!(urls[1].ends_with("/api/symbol/evaluate/contradictions/v1"));
}

#[tokio::test]
async fn missing_expected_is_rejected_without_a_request() {
    let transport = Arc::new(ScriptedTransport::new());
    let ev = evaluator(&transport);

    let err = ev
        .evaluate(&json!({"actual": "Hoří!"}), &EvalOptions::default())
        .await
        .unwrap_err();

    match err {
        EvalError::InvalidArgument(msg) => {
            assert!(msg.starts_with("wrong input data format"), "{msg}");
            assert!(msg.contains("expected"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn set_scoring_rejects_missing_label_and_keeps_table() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_score(0.7, json!([]));
    let mut ev = evaluator(&transport);

    let err = ev
        .set_scoring(
            "contradictions",
            &json!({"name": "linear", "params": {"weights": {
                "critical": 1.0, "large": 0.5, "small": 0.1
            }}}),
        )
        .unwrap_err();
    match err {
        EvalError::InvalidArgument(msg) => {
            assert!(msg.starts_with("wrong scoring format"), "{msg}");
            assert!(msg.contains("negligible"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        ev.scoring().get(Symbol::Contradictions),
        &ScoringDescriptor::linear_default()
    );

    ev.set_scoring(
        "contradictions",
        &json!({"name": "linear", "params": {"weights": {
            "critical": 1.0, "large": 0.8, "small": 0.2, "negligible": 0.05
        }}}),
    )
    .unwrap();
    ev.evaluate(&nehori(), &EvalOptions::default()).await.unwrap();

    let body = &transport.requests()[0].body;
    assert_eq!(body["scoring"]["params"]["weights"]["large"], json!(0.8));
    assert_eq!(body["scoring"]["params"]["weights"]["negligible"], json!(0.05));
}

#[tokio::test]
async fn set_scoring_forwards_descriptor_unchanged() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_score(0.6, json!([]));
    let mut ev = evaluator(&transport);
    let descriptor = json!({
        "name": "linear",
        "params": {
            "weights": {"negligible": 0.0, "small": 0.2, "large": 0.6, "critical": 1.0},
            "threshold": 0.3
        },
        "label": "strict"
    });

    ev.set_scoring("contradictions", &descriptor).unwrap();
    ev.evaluate(&nehori(), &EvalOptions::default()).await.unwrap();

    let body = &transport.requests()[0].body;
    assert_eq!(body["scoring"], descriptor);
    let labels: Vec<&str> = body["scoring"]["params"]["weights"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(labels, ["negligible", "small", "large", "critical"]);
}

#[tokio::test]
async fn custom_auth_bundle_is_sent_whole() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_score(1.0, json!([]));
    let bundle = json!({"api_key": "sk-test", "model": "gpt-4o", "organization": "org-7"});
    let ev = Evaluator::with_transport(
        serde_json::from_value(bundle.clone()).unwrap(),
        "token",
        EvaluatorConfig::default(),
        transport.clone(),
    );

    ev.evaluate(&nehori(), &EvalOptions::default()).await.unwrap();

    assert_eq!(transport.requests()[0].body["auth"], bundle);
}

#[test]
fn set_scoring_rejects_unknown_symbol() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut ev = evaluator(&transport);

    let err = ev
        .set_scoring("toxicity", &serde_json::to_value(ScoringDescriptor::linear_default()).unwrap())
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidArgument(msg) if msg.contains("toxicity")));
}

#[tokio::test]
async fn per_call_override_does_not_touch_stored_scoring() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_score(0.9, json!([])).push_score(0.9, json!([]));
    let ev = evaluator(&transport);
    let custom = ScoringDescriptor::linear([2.0, 1.0, 0.5, 0.0]);

    let options = EvalOptions::default()
        .with_scoring(ScoringOverride::new().with(Symbol::Contradictions, Some(custom.clone())));
    ev.evaluate(&nehori(), &options).await.unwrap();
    ev.evaluate(&nehori(), &EvalOptions::default()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].body["scoring"], serde_json::to_value(&custom).unwrap());
    assert_eq!(
        requests[1].body["scoring"],
        serde_json::to_value(ScoringDescriptor::linear_default()).unwrap()
    );
}

#[tokio::test]
async fn server_error_then_success_is_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_status(500, "Internal Server Error")
        .push_score(0.4, json!([]));
    let ev = evaluator(&transport);

    let res = ev
        .evaluate(&nehori(), &EvalOptions::default().with_retry(2))
        .await
        .unwrap();

    assert_eq!(res.score(Symbol::Contradictions), Some(0.4));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn missing_score_then_success_is_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push(TransportResponse::new(
            200,
            json!({"reasoning": "LLM quota exceeded"}).to_string(),
        ))
        .push_score(0.3, json!([]));
    let ev = evaluator(&transport);

    let res = ev
        .evaluate(&nehori(), &EvalOptions::default().with_retry(2))
        .await
        .unwrap();

    assert_eq!(res.score(Symbol::Contradictions), Some(0.3));
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn exhausted_retries_surface_the_http_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_status(503, "busy")
        .push_status(401, "Unauthorized");
    let ev = evaluator(&transport);

    let err = ev
        .evaluate(&nehori(), &EvalOptions::default().with_retry(2))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EvalError::Http {
            status: 401,
            body: "Unauthorized".to_string()
        }
    );
    assert_eq!(err.status(), Some(401));
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn missing_score_on_last_attempt_is_a_service_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_error(EvalError::Connection("reset by peer".to_string()))
        .push(TransportResponse::new(
            200,
            json!({"reasoning": "LLM quota exceeded"}).to_string(),
        ));
    let ev = evaluator(&transport);

    let err = ev
        .evaluate(&nehori(), &EvalOptions::default().with_retry(2))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EvalError::Service {
            reasoning: "LLM quota exceeded".to_string()
        }
    );
}

#[tokio::test]
async fn single_attempt_does_not_retry() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_status(500, "boom").push_score(1.0, json!([]));
    let ev = evaluator(&transport);

    let err = ev
        .evaluate(&nehori(), &EvalOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test]
async fn output_missing_score_field_is_a_format_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(TransportResponse::new(
        200,
        json!({
            "scores": {"score": 1.0},
            "reasoning": json!({"statements": [{"summary": "s", "severity": "small"}]}).to_string()
        })
        .to_string(),
    ));
    let ev = evaluator(&transport);

    let err = ev
        .evaluate(&nehori(), &EvalOptions::default())
        .await
        .unwrap_err();

    match err {
        EvalError::InvalidArgument(msg) => {
            assert!(msg.starts_with("wrong output data format"), "{msg}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn batch_isolates_the_malformed_entry() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_score(0.1, json!([])).push_score(0.3, json!([]));
    let ev = evaluator(&transport);

    let data = vec![
        EvaluationInput::new("a", "b").to_value(),
        json!({"expected": "a", "actual": 42}),
        EvaluationInput::new("c", "d").with_context("ctx").to_value(),
    ];
    let batch = ev.evaluate_batch(&data, &EvalOptions::default()).await;

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.failed(), 1);
    for i in 0..3 {
        assert!(batch.results[i].is_some() != batch.errors[i].is_some());
    }
    assert!(batch.results[1].is_none());
    assert!(matches!(batch.errors[1], Some(EvalError::InvalidArgument(_))));
    assert_eq!(
        batch.results[2].as_ref().unwrap().score(Symbol::Contradictions),
        Some(0.3)
    );
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.requests()[1].body["input_data"]["context"], "ctx");
}

#[tokio::test]
async fn empty_batch_makes_no_requests() {
    let transport = Arc::new(ScriptedTransport::new());
    let ev = evaluator(&transport);

    let batch = ev.evaluate_batch(&[], &EvalOptions::default()).await;

    assert!(batch.is_empty());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn scored_body_helper_matches_nested_layout() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(TransportResponse::new(
        200,
        scored_body(0.25, json!([statement("small", "s", "r")])).to_string(),
    ));
    let ev = evaluator(&transport);

    let res = ev.evaluate(&nehori(), &EvalOptions::default()).await.unwrap();
    assert_eq!(
        res.reasoning(Symbol::Contradictions).unwrap()["statements"][0]["severity"],
        "small"
    );
}

/// Live call against the public service; needs EVALMYAI_TOKEN and OpenAI
/// credentials in the environment.
#[tokio::test]
#[ignore]
async fn live_nehori_scores_near_zero() {
    let token = std::env::var("EVALMYAI_TOKEN").expect("EVALMYAI_TOKEN not set");
    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
    let ev = Evaluator::with_config(
        Auth::open_ai(&api_key, &model),
        &token,
        EvaluatorConfig::from_env(),
    )
    .unwrap();

    let res = ev
        .evaluate(&nehori(), &EvalOptions::default().with_retry(3))
        .await
        .unwrap();
    let score = res.score(Symbol::Contradictions).expect("contradictions score");
    assert!(score < 0.1, "score {score}");
}
