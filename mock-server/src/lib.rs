use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const DEFAULT_API_KEY: &str = "test-key";
pub const TEAM_ID: &str = "team-1";
pub const DATABASE_ID: &str = "db-1";
pub const TABLE_ID: &str = "A";

const DEFAULT_PER_PAGE: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: u64,
    pub sequence: u64,
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct Upsert {
    pub id: Option<u64>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Default)]
pub struct Table {
    name: String,
    records: BTreeMap<u64, Record>,
    sequence: u64,
}

#[derive(Default)]
pub struct Database {
    name: String,
    tables: BTreeMap<String, Table>,
}

#[derive(Default)]
pub struct Team {
    name: String,
    databases: BTreeMap<String, Database>,
}

#[derive(Default)]
pub struct Store {
    teams: BTreeMap<String, Team>,
}

impl Store {
    /// One team with one database holding one empty table.
    pub fn seeded() -> Self {
        let table = Table {
            name: "Customers".to_string(),
            ..Table::default()
        };
        let database = Database {
            name: "CRM".to_string(),
            tables: BTreeMap::from([(TABLE_ID.to_string(), table)]),
        };
        let team = Team {
            name: "Demo Team".to_string(),
            databases: BTreeMap::from([(DATABASE_ID.to_string(), database)]),
        };
        Store {
            teams: BTreeMap::from([(TEAM_ID.to_string(), team)]),
        }
    }

    fn team(&self, team: &str) -> Result<&Team, ApiError> {
        self.teams.get(team).ok_or_else(|| ApiError::not_found("team"))
    }

    fn database(&self, team: &str, database: &str) -> Result<&Database, ApiError> {
        self.team(team)?
            .databases
            .get(database)
            .ok_or_else(|| ApiError::not_found("database"))
    }

    fn table(&self, team: &str, database: &str, table: &str) -> Result<&Table, ApiError> {
        self.database(team, database)?
            .tables
            .get(table)
            .ok_or_else(|| ApiError::not_found("table"))
    }

    fn table_mut(&mut self, team: &str, database: &str, table: &str) -> Result<&mut Table, ApiError> {
        self.teams
            .get_mut(team)
            .ok_or_else(|| ApiError::not_found("team"))?
            .databases
            .get_mut(database)
            .ok_or_else(|| ApiError::not_found("database"))?
            .tables
            .get_mut(table)
            .ok_or_else(|| ApiError::not_found("table"))
    }
}

impl Table {
    fn upsert(&mut self, upsert: Upsert) -> Record {
        self.sequence += 1;
        let id = upsert
            .id
            .unwrap_or_else(|| self.records.keys().next_back().map_or(1, |last| last + 1));
        let record = self.records.entry(id).or_insert_with(|| Record {
            id,
            sequence: 0,
            fields: Map::new(),
        });
        record.sequence = self.sequence;
        record.fields.extend(upsert.fields);
        record.clone()
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    api_key: Arc<str>,
    db: Db,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(what: &str) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("{what} not found"),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { message: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn app() -> Router {
    app_with_key(DEFAULT_API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let state = AppState {
        api_key: Arc::from(api_key),
        db: Arc::new(RwLock::new(Store::seeded())),
    };
    let database = "/teams/{team}/databases/{db}";
    let records = format!("{database}/tables/{{table}}/records");

    let api = Router::new()
        .route("/teams", get(list_teams))
        .route("/teams/{team}/databases", get(list_databases))
        .route(&format!("{database}/tables"), get(list_tables))
        .route(&records, get(query_records).post(upsert_records))
        .route(&format!("{records}/{{id}}"), get(get_record).delete(delete_record))
        .route(&format!("{records}/{{id}}/files"), get(list_record_files))
        .layer(middleware::from_fn_with_state(state.clone(), require_key))
        .with_state(state);

    Router::new().nest("/v1", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_key(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_key(api_key)).await
}

async fn require_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let expected = format!("Bearer {}", state.api_key);
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected.as_str()) {
        return ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "invalid api key".to_string(),
        }
        .into_response();
    }
    next.run(request).await
}

async fn list_teams(State(state): State<AppState>) -> Json<Vec<Entity>> {
    let store = state.db.read().await;
    Json(
        store
            .teams
            .iter()
            .map(|(id, team)| entity(id, &team.name))
            .collect(),
    )
}

async fn list_databases(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> ApiResult<Vec<Entity>> {
    let store = state.db.read().await;
    let team = store.team(&team)?;
    Ok(Json(
        team.databases
            .iter()
            .map(|(id, db)| entity(id, &db.name))
            .collect(),
    ))
}

async fn list_tables(
    State(state): State<AppState>,
    Path((team, db)): Path<(String, String)>,
) -> ApiResult<Vec<Entity>> {
    let store = state.db.read().await;
    let database = store.database(&team, &db)?;
    Ok(Json(
        database
            .tables
            .iter()
            .map(|(id, table)| entity(id, &table.name))
            .collect(),
    ))
}

async fn query_records(
    State(state): State<AppState>,
    Path((team, db, table)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<Record>> {
    let filters = match params.get("filters") {
        Some(raw) => serde_json::from_str::<Map<String, Value>>(raw)
            .map_err(|e| ApiError::bad_request(format!("filters: {e}")))?,
        None => Map::new(),
    };
    let page = parse_number(&params, "page", 0)?;
    let per_page = parse_number(&params, "perPage", DEFAULT_PER_PAGE)?;

    let store = state.db.read().await;
    let table = store.table(&team, &db, &table)?;
    let records = table
        .records
        .values()
        .filter(|record| {
            filters
                .iter()
                .all(|(field, expected)| record.fields.get(field) == Some(expected))
        })
        .skip(page * per_page)
        .take(per_page)
        .cloned()
        .collect();
    Ok(Json(records))
}

async fn upsert_records(
    State(state): State<AppState>,
    Path((team, db, table)): Path<(String, String, String)>,
    Json(upserts): Json<Vec<Upsert>>,
) -> ApiResult<Vec<Record>> {
    let mut store = state.db.write().await;
    let table = store.table_mut(&team, &db, &table)?;
    Ok(Json(upserts.into_iter().map(|u| table.upsert(u)).collect()))
}

async fn get_record(
    State(state): State<AppState>,
    Path((team, db, table, id)): Path<(String, String, String, u64)>,
) -> ApiResult<Record> {
    let store = state.db.read().await;
    let table = store.table(&team, &db, &table)?;
    table
        .records
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("record"))
}

async fn list_record_files(
    State(state): State<AppState>,
    Path((team, db, table, id)): Path<(String, String, String, u64)>,
) -> ApiResult<Vec<Value>> {
    let store = state.db.read().await;
    let table = store.table(&team, &db, &table)?;
    if !table.records.contains_key(&id) {
        return Err(ApiError::not_found("record"));
    }
    Ok(Json(Vec::new()))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((team, db, table, id)): Path<(String, String, String, u64)>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.db.write().await;
    let table = store.table_mut(&team, &db, &table)?;
    table
        .records
        .remove(&id)
        .map(|_| StatusCode::OK)
        .ok_or_else(|| ApiError::not_found("record"))
}

fn entity(id: &str, name: &str) -> Entity {
    Entity {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn parse_number(
    params: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ApiError> {
    match params.get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{key} must be a number"))),
        None => Ok(default),
    }
}
