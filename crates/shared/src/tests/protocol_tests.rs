use serde_json::json;

use crate::{
    domain::{AnswerId, AnswerOption, ChoiceQuestion, Page, PageId, Question, QuestionKind},
    error::{ApiError, ErrorCode},
    protocol::{PendingAnswer, SubmissionPayload},
};

fn radio_page() -> Page {
    Page {
        id: PageId(4),
        title: "Which option?".to_string(),
        hint: None,
        questions: vec![Question::Radio(ChoiceQuestion {
            prompt: "Pick one".to_string(),
            options: vec![
                AnswerOption {
                    id: AnswerId(1),
                    label: "First".to_string(),
                },
                AnswerOption {
                    id: AnswerId(2),
                    label: "Second".to_string(),
                },
            ],
        })],
        session_id: None,
        friendly_code: None,
    }
}

#[test]
fn questions_are_tagged_by_type() {
    let raw = json!({
        "id": 1,
        "title": "Tell us more",
        "questions": [
            { "type": "freetext", "prompt": "Anything else?" },
            { "type": "binary", "prompt": "Happy?" }
        ]
    });

    let page: Page = serde_json::from_value(raw).expect("page");
    let kinds: Vec<QuestionKind> = page.questions.iter().map(Question::kind).collect();
    assert_eq!(kinds, vec![QuestionKind::FreeText, QuestionKind::Binary]);
    assert!(page.questions.iter().all(Question::is_self_submitting));
    match &page.questions[1] {
        Question::Binary(binary) => {
            assert_eq!(binary.yes_label, "Yes");
            assert_eq!(binary.no_label, "No");
        }
        other => panic!("unexpected question: {other:?}"),
    }
}

#[test]
fn empty_pending_answer_serializes_as_nulls() {
    let payload = SubmissionPayload::Captured(PendingAnswer::default());
    assert_eq!(
        serde_json::to_value(&payload).expect("json"),
        json!({ "answer_id": null, "question_id": null })
    );
}

#[test]
fn explicit_payload_is_forwarded_unchanged() {
    let payload = SubmissionPayload::Explicit(json!({ "custom": "yes" }));
    assert_eq!(
        serde_json::to_value(&payload).expect("json"),
        json!({ "custom": "yes" })
    );
}

#[test]
fn page_knows_which_options_it_offers() {
    let page = radio_page();
    assert!(page.offers_option(AnswerId(2)));
    assert!(!page.offers_option(AnswerId(9)));
}

#[test]
fn api_error_round_trips_code() {
    let err = ApiError::not_found("unknown friendly code");
    let body = serde_json::to_value(&err).expect("json");
    assert_eq!(body["code"], "not_found");
    let decoded: ApiError = serde_json::from_value(body).expect("decode");
    assert_eq!(decoded.code, ErrorCode::NotFound);
}

#[test]
fn widget_objects_do_not_decode_as_captured_answers() {
    let payload: SubmissionPayload =
        serde_json::from_value(json!({ "custom": "yes" })).expect("decode");
    assert_eq!(payload, SubmissionPayload::Explicit(json!({ "custom": "yes" })));

    let payload: SubmissionPayload =
        serde_json::from_value(json!({ "answer_id": 2, "question_id": 4 })).expect("decode");
    assert_eq!(
        payload,
        SubmissionPayload::Captured(PendingAnswer {
            answer_id: Some(AnswerId(2)),
            question_id: Some(PageId(4)),
        })
    );
}

#[test]
fn partial_or_empty_objects_stay_explicit() {
    for body in [json!({}), json!({ "answer_id": 5 }), json!({ "question_id": 1 })] {
        let payload: SubmissionPayload = serde_json::from_value(body.clone()).expect("decode");
        assert_eq!(payload, SubmissionPayload::Explicit(body.clone()));
        assert_eq!(serde_json::to_value(&payload).expect("json"), body);
    }

    let payload: SubmissionPayload =
        serde_json::from_value(json!({ "answer_id": null, "question_id": null })).expect("decode");
    assert_eq!(payload, SubmissionPayload::Captured(PendingAnswer::default()));
}
