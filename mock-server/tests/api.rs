use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_key, Entity, ErrorBody, Record, DATABASE_ID, DEFAULT_API_KEY, TABLE_ID, TEAM_ID};
use tower::ServiceExt;

const BEARER: &str = "Bearer test-key";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn records_uri() -> String {
    format!("/v1/teams/{TEAM_ID}/databases/{DATABASE_ID}/tables/{TABLE_ID}/records")
}

fn request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, BEARER)
        .body(String::new())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, BEARER)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_key_returns_401() {
    let resp = app()
        .oneshot(Request::builder().uri("/v1/teams").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.message, "invalid api key");
}

#[tokio::test]
async fn custom_key_is_enforced() {
    assert_eq!(DEFAULT_API_KEY, "test-key");
    let resp = app_with_key("other-key")
        .oneshot(request("GET", "/v1/teams"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- hierarchy ---

#[tokio::test]
async fn list_teams_returns_seed() {
    let resp = app().oneshot(request("GET", "/v1/teams")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let teams: Vec<Entity> = body_json(resp).await;
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].id, TEAM_ID);
}

#[tokio::test]
async fn list_databases_unknown_team_returns_404() {
    let resp = app()
        .oneshot(request("GET", "/v1/teams/nope/databases"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.message, "team not found");
}

#[tokio::test]
async fn list_tables_returns_seed() {
    let uri = format!("/v1/teams/{TEAM_ID}/databases/{DATABASE_ID}/tables");
    let resp = app().oneshot(request("GET", &uri)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let tables: Vec<Entity> = body_json(resp).await;
    assert_eq!(tables[0].id, TABLE_ID);
    assert_eq!(tables[0].name, "Customers");
}

// --- records ---

#[tokio::test]
async fn upsert_non_array_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", &records_uri(), r#"{"fields":{}}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn query_with_malformed_filters_returns_400() {
    let uri = format!("{}?filters=not-json", records_uri());
    let resp = app().oneshot(request("GET", &uri)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_record_bad_id_returns_400() {
    let uri = format!("{}/abc", records_uri());
    let resp = app().oneshot(request("GET", &uri)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_record_not_found() {
    let uri = format!("{}/99", records_uri());
    let resp = app().oneshot(request("DELETE", &uri)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full record lifecycle ---

#[tokio::test]
async fn record_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // upsert two new records
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            &records_uri(),
            r#"[{"fields":{"Name":"Ada","Status":"open"}},{"fields":{"Name":"Grace","Status":"closed"}}]"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Vec<Record> = body_json(resp).await;
    assert_eq!(created.len(), 2);
    let id = created[0].id;

    // query with filters
    let filtered = format!("{}?filters=%7B%22Status%22%3A%22open%22%7D", records_uri());
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", &filtered))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let records: Vec<Record> = body_json(resp).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields["Name"], "Ada");

    // paging
    let paged = format!("{}?page=1&perPage=1", records_uri());
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", &paged))
        .await
        .unwrap();
    let records: Vec<Record> = body_json(resp).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fields["Name"], "Grace");

    // update by id merges fields
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            &records_uri(),
            &format!(r#"[{{"id":{id},"fields":{{"Status":"closed"}}}}]"#),
        ))
        .await
        .unwrap();
    let updated: Vec<Record> = body_json(resp).await;
    assert_eq!(updated[0].fields["Name"], "Ada");
    assert_eq!(updated[0].fields["Status"], "closed");

    // files of an existing record
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", &format!("{}/{id}/files", records_uri())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let files: Vec<serde_json::Value> = body_json(resp).await;
    assert!(files.is_empty());

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", &format!("{}/{id}", records_uri())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete: 404
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", &format!("{}/{id}", records_uri())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
