use airtable_engine::{
    read_endpoint_reply, ExtractionError, LocatedPayload, PageInfo, PayloadLocator, SharedViewLocator,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const ENDPOINT_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Tasks</title></head>
<body>
<script>
  window.initData = {"sharedViewId": "shr2", "sharedViewTableId": "tblT", requestId: "reqABC"};
  var headers = {"x-airtable-application-id":"app1","x-user-locale":"en-GB","x-early-prefetch":true,"X-Requested-With":"XMLHttpRequest"};
  window.prefetch = {
    urlWithParams: "/v0.3/view/viwV/readSharedViewData?stringifiedObjectParams=%7B%7D&requestId=reqABC",
  };
</script>
</body></html>"#;

#[test]
fn endpoint_shape_yields_path_and_announced_headers() {
    let located = SharedViewLocator.locate(ENDPOINT_PAGE).unwrap();
    let LocatedPayload::Endpoint {
        path_and_query,
        headers,
    } = located
    else {
        panic!("expected endpoint, got {located:?}");
    };
    assert_eq!(
        path_and_query,
        "/v0.3/view/viwV/readSharedViewData?stringifiedObjectParams=%7B%7D&requestId=reqABC"
    );
    assert_eq!(
        headers,
        vec![
            ("x-airtable-application-id".to_string(), "app1".to_string()),
            ("x-user-locale".to_string(), "en-GB".to_string()),
            ("x-early-prefetch".to_string(), "true".to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ]
    );
}

#[test]
fn page_info_is_scanned_from_the_page() {
    let info = PageInfo::scan(ENDPOINT_PAGE);
    assert_eq!(info.request_id.as_deref(), Some("reqABC"));
    assert_eq!(info.shared_view_id.as_deref(), Some("shr2"));
    assert_eq!(info.table_id.as_deref(), Some("tblT"));
    assert_eq!(info.view_id.as_deref(), Some("viwV"));
    assert_eq!(info.application_id.as_deref(), Some("app1"));
    assert_eq!(info.user_locale.as_deref(), Some("en-GB"));
    assert!(info
        .url_with_params
        .as_deref()
        .is_some_and(|u| u.starts_with("/v0.3/view/viwV/")));
}

#[test]
fn inline_script_table_is_found() {
    let page = r#"<html><body>
<script>var unrelated = {"table": "not an object"};</script>
<script>window.bootstrap = {"data": {"table": {"id": "tblT", "columns": [{"id": "fld1", "name": "Name", "type": "text"}], "rows": []}}, "other": 1};</script>
</body></html>"#;
    let located = SharedViewLocator.locate(page).unwrap();
    let LocatedPayload::Inline(table) = located else {
        panic!("expected inline table");
    };
    assert_eq!(table["id"], json!("tblT"));
    assert_eq!(table["columns"][0]["name"], json!("Name"));
}

#[test]
fn json_body_envelope_is_accepted() {
    let body = json!({"msg": "SUCCESS", "data": {"table": {"columns": [], "rows": []}}}).to_string();
    assert_eq!(
        SharedViewLocator.locate(&body).unwrap(),
        LocatedPayload::Inline(json!({"columns": [], "rows": []}))
    );
}

#[test]
fn page_without_structure_is_an_extraction_error() {
    let page = "<html><body><p>Nothing to see</p></body></html>";
    assert_eq!(SharedViewLocator.locate(page), Err(ExtractionError::NotFound));
}

#[test]
fn endpoint_reply_refusal_is_not_an_error() {
    let reply = json!({"msg": "FAILED", "error": {"type": "NOT_FOUND"}}).to_string();
    assert_eq!(
        read_endpoint_reply(&reply).unwrap(),
        LocatedPayload::Refused("FAILED".to_string())
    );
}

#[test]
fn endpoint_reply_must_be_json() {
    let err = read_endpoint_reply("<html>oops</html>").unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidJson { .. }));
}
