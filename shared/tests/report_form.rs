mod common;

use std::sync::Arc;
use std::time::Duration;

use ajali_core::capabilities::{HttpMethod, MemoryTokenStore};
use ajali_core::{
    DraftField, ErrorKind, FormMode, FormPhase, ReportFormController, ReportId, Role,
};
use common::{
    harness, harness_with, sign_in, wrapped_report, DeniedLocation, FixedLocation, Harness,
    SilentLocation,
};
use serde_json::json;

fn fill_valid(form: &ReportFormController) {
    form.set_field(DraftField::Title, "  Overturned lorry  ");
    form.set_field(
        DraftField::Description,
        "A lorry overturned on Mombasa Road, two lanes are blocked",
    );
    form.set_field(DraftField::IncidentType, "accident");
    form.set_field(DraftField::Latitude, "-1.3197");
    form.set_field(DraftField::Longitude, "36.8441");
    form.set_field(DraftField::Address, "Mombasa Road");
}

async fn signed_in_harness() -> Harness {
    let h = harness();
    sign_in(&h, "5", Role::User, "tok").await;
    h
}

#[tokio::test]
async fn test_create_submits_trimmed_draft() {
    let h = signed_in_harness().await;
    h.transport
        .respond(HttpMethod::Post, "/api/reports", 201, wrapped_report(11, "Overturned lorry"));
    let form = h.app.new_report_form();
    fill_valid(&form);

    let report = form.submit().await.unwrap();

    assert_eq!(report.id, ReportId::new("11"));
    let body = h.transport.last_request().json();
    assert_eq!(body["title"], "Overturned lorry");
    assert_eq!(body["incident_type"], "accident");
    assert_eq!(body["latitude"], -1.3197);
    assert_eq!(body["longitude"], 36.8441);
    assert_eq!(body["address"], "Mombasa Road");

    let state = form.state();
    assert!(matches!(state.phase, FormPhase::Submitted(ref r) if r.id == report.id));
    assert!(!state.submitting);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_network() {
    let h = signed_in_harness().await;
    let form = h.app.new_report_form();
    form.set_field(DraftField::Title, "Fire");
    form.set_field(DraftField::Description, "Smoke everywhere");
    form.set_field(DraftField::IncidentType, "fire");
    form.set_field(DraftField::Latitude, "91");
    form.set_field(DraftField::Longitude, "36.8");

    let err = form.submit().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    let fields: Vec<_> = err.fields.keys().map(String::as_str).collect();
    assert_eq!(fields, ["description", "latitude", "title"]);
    assert_eq!(h.transport.request_count(), 0);

    let state = form.state();
    assert_eq!(state.phase, FormPhase::Editing);
    assert_eq!(state.draft.title, "Fire");
    assert!(!state.field_errors(DraftField::Latitude).is_empty());
}

#[tokio::test]
async fn test_title_is_capped_while_typing() {
    let h = harness();
    let form = h.app.new_report_form();

    form.set_field(DraftField::Title, &"x".repeat(250));

    assert_eq!(form.state().draft.title.chars().count(), 200);
}

#[tokio::test]
async fn test_server_failure_preserves_draft() {
    let h = signed_in_harness().await;
    h.transport.respond(
        HttpMethod::Post,
        "/api/reports",
        500,
        json!({ "error": "Internal server error" }),
    );
    let form = h.app.new_report_form();
    fill_valid(&form);
    let before = form.state().draft;

    let err = form.submit().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    let state = form.state();
    assert_eq!(state.draft, before);
    assert_eq!(state.phase, FormPhase::Editing);
    assert!(state.can_submit());
    assert_eq!(state.error.as_ref().map(|e| e.kind), Some(ErrorKind::Unknown));
}

#[tokio::test]
async fn test_second_submit_while_pending_is_rejected() {
    let h = signed_in_harness().await;
    h.transport.respond_after(
        HttpMethod::Post,
        "/api/reports",
        201,
        wrapped_report(12, "Overturned lorry"),
        Duration::from_millis(150),
    );
    let form = h.app.new_report_form();
    fill_valid(&form);

    let (first, second) = tokio::join!(form.submit(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        form.submit().await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err().kind, ErrorKind::InvalidState);
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn test_current_location_fills_coordinates() {
    let h = harness_with(Arc::new(FixedLocation(-0.0917, 34.768)), MemoryTokenStore::new());
    let form = h.app.new_report_form();
    form.set_field(DraftField::Title, "Kisumu flooding");

    let coordinate = form.use_current_location().await.unwrap();

    assert_eq!(coordinate.as_tuple(), (-0.0917, 34.768));
    let state = form.state();
    assert_eq!(state.draft.latitude, "-0.0917");
    assert_eq!(state.draft.longitude, "34.768");
    assert_eq!(state.draft.title, "Kisumu flooding");
    assert_eq!(state.located, Some(coordinate));
    assert!(!state.locating);
}

#[tokio::test]
async fn test_denied_location_leaves_draft_untouched() {
    let h = harness_with(Arc::new(DeniedLocation), MemoryTokenStore::new());
    let form = h.app.new_report_form();
    form.set_field(DraftField::Latitude, "-1.5");
    form.set_field(DraftField::Longitude, "36.9");

    let err = form.use_current_location().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Location);
    assert!(err.is_retryable());
    let state = form.state();
    assert_eq!(state.draft.latitude, "-1.5");
    assert_eq!(state.draft.longitude, "36.9");
    assert!(!state.locating);
    assert_eq!(state.error.map(|e| e.kind), Some(ErrorKind::Location));
}

#[tokio::test]
async fn test_silent_geolocation_times_out() {
    let h = harness();
    let form = ReportFormController::new_report(
        h.app.api().clone(),
        Arc::new(SilentLocation),
        Duration::from_millis(50),
    );

    let err = form.use_current_location().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Location);
    assert!(!form.state().locating);
    assert!(form.state().draft.latitude.is_empty());
}

#[tokio::test]
async fn test_abandoned_location_request_clears_flag() {
    let h = harness();
    let form = ReportFormController::new_report(
        h.app.api().clone(),
        Arc::new(SilentLocation),
        Duration::from_secs(30),
    );

    let abandoned =
        tokio::time::timeout(Duration::from_millis(30), form.use_current_location()).await;

    assert!(abandoned.is_err());
    assert!(!form.state().locating);
    // A fresh attempt is allowed once the old one is gone.
    let retry = tokio::time::timeout(Duration::from_millis(30), form.use_current_location()).await;
    assert!(retry.is_err());
}

#[tokio::test]
async fn test_edit_loads_existing_report() {
    let h = signed_in_harness().await;
    h.transport
        .respond(HttpMethod::Get, "/api/reports/3", 200, wrapped_report(3, "Market fire"));
    h.transport
        .respond(HttpMethod::Put, "/api/reports/3", 200, wrapped_report(3, "Market fire, contained"));
    let form = h.app.edit_report_form(ReportId::new("3"));
    assert_eq!(form.state().phase, FormPhase::Loading);

    form.load().await.unwrap();

    let state = form.state();
    assert_eq!(state.mode, FormMode::Edit(ReportId::new("3")));
    assert_eq!(state.phase, FormPhase::Editing);
    assert_eq!(state.draft.title, "Market fire");
    assert_eq!(state.draft.latitude, "-1.2921");
    assert_eq!(state.draft.address, "Kenyatta Avenue, Nairobi");

    form.set_field(DraftField::Title, "Market fire, contained");
    let report = form.submit().await.unwrap();

    assert_eq!(report.title, "Market fire, contained");
    let put = h.transport.last_request();
    assert_eq!(put.method, HttpMethod::Put);
    assert_eq!(put.json()["title"], "Market fire, contained");
}

#[tokio::test]
async fn test_failed_edit_load_blocks_submit() {
    let h = signed_in_harness().await;
    h.transport.respond(
        HttpMethod::Get,
        "/api/reports/3",
        404,
        json!({ "error": "Report not found" }),
    );
    let form = h.app.edit_report_form(ReportId::new("3"));

    let err = form.load().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let state = form.state();
    assert!(matches!(state.phase, FormPhase::LoadFailed(ref e) if e.kind == ErrorKind::NotFound));
    assert!(!state.can_submit());

    let submit = form.submit().await.unwrap_err();
    assert_eq!(submit.kind, ErrorKind::InvalidState);
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn test_failed_reload_keeps_edited_draft() {
    let h = signed_in_harness().await;
    h.transport
        .respond(HttpMethod::Get, "/api/reports/3", 200, wrapped_report(3, "Market fire"));
    h.transport.respond(
        HttpMethod::Get,
        "/api/reports/3",
        500,
        json!({ "error": "Internal server error" }),
    );
    let form = h.app.edit_report_form(ReportId::new("3"));
    form.load().await.unwrap();
    form.set_field(DraftField::Title, "Market fire, user edit");

    let err = form.load().await.unwrap_err();

    assert_eq!(err.http_status, Some(500));
    let state = form.state();
    assert_eq!(state.phase, FormPhase::Editing);
    assert_eq!(state.draft.title, "Market fire, user edit");
    assert_eq!(state.draft.latitude, "-1.2921");
    assert_eq!(state.error.map(|e| e.http_status), Some(Some(500)));
    assert!(form.state().can_submit());
}

#[tokio::test]
async fn test_deactivated_form_ignores_late_result() {
    let h = signed_in_harness().await;
    h.transport.respond_after(
        HttpMethod::Post,
        "/api/reports",
        201,
        wrapped_report(13, "Overturned lorry"),
        Duration::from_millis(80),
    );
    let form = h.app.new_report_form();
    fill_valid(&form);

    let (result, ()) = tokio::join!(form.submit(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        form.deactivate();
    });

    assert!(result.is_ok());
    let state = form.state();
    assert_eq!(state.phase, FormPhase::Editing);
    assert!(!state.submitting);
    assert!(!form.is_active());
}

#[tokio::test]
async fn test_unknown_field_name_is_rejected() {
    let h = harness();
    let form = h.app.new_report_form();

    assert!(form.set_field_by_name("description", "hello").is_ok());
    assert_eq!(
        form.set_field_by_name("severity", "high").unwrap_err().kind,
        ErrorKind::Validation
    );
}
