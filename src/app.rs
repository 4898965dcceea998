use axum::{
    Json, Router,
    extract::{Host, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::{Config, Registry, Team};
use crate::entry::{TimeEntry, column_values, format_date, normalize};
use crate::ranking::{DEFAULT_TOP_N, DEFAULT_WINDOW_DAYS, DateWindow, rankings, task_breakdown};
use crate::saving::{
    DURATION_LABELS, SAVED_MESSAGE, SubmitEntryRequest, SubmitEntryResponse, save_entry,
};
use crate::spreadsheet::SheetSource;
use crate::views::{
    ErrorPage, IndexPage, LeaderboardPage, Page, TasksPage, Views, page_title,
};

/// Cookie remembering how many rows each leaderboard shows.
pub const ROWS_COOKIE: &str = "leaderboard_rows";

pub struct AppState {
    pub registry: Registry,
    pub views: Views,
    pub static_dir: PathBuf,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    leaderboard_rows: Option<String>,
}

#[derive(Deserialize)]
struct TasksQuery {
    #[serde(rename = "date-range")]
    date_range: Option<String>,
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let teams = config.validate()?;
    let sheet: Arc<dyn SheetSource> = Arc::new(config.sheet_client()?);
    let registry = Registry::new(teams, sheet, config.default_team.clone());

    // make sure every team's ranges can be read before accepting requests
    registry.verify().await?;

    let app_state = Arc::new(AppState {
        registry,
        views: Views::new()?,
        static_dir: config.static_dir.clone(),
    });

    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("ultitracker started - http://localhost:{}", config.port);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(app_state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&app_state.static_dir);

    Router::new()
        .route("/", get(serve_index))
        .route("/leaderboard", get(serve_leaderboard))
        .route("/tasks", get(serve_tasks))
        .route("/submit-entry", post(submit_entry))
        .route("/favicon.ico", get(serve_favicon))
        .nest_service("/static", static_files)
        .fallback(not_found)
        .with_state(app_state)
}

/// Team key for a request host: the first label, port removed.
///
/// `demo.example.com:8080` → `demo`
pub fn team_key(host: &str) -> &str {
    let host = host.split(':').next().unwrap_or(host);
    host.split('.').next().unwrap_or(host)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_rows(value: &str) -> Option<usize> {
    value.trim().parse().ok().filter(|rows| *rows > 0)
}

impl AppState {
    fn team(&self, host: &str) -> Option<&Team> {
        self.registry.team(team_key(host))
    }

    fn render<T: Serialize>(&self, page: Page, data: &T) -> Response {
        match self.views.render(page, data) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                error!("Error executing template: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }

    fn error_page(&self, team: &str, status: StatusCode, desc: &str) -> Response {
        let page = ErrorPage {
            title: status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
            team: team.to_string(),
            error_code: status.as_u16(),
            error_desc: desc.to_string(),
        };

        match self.views.render(Page::Error, &page) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(_) => (status, page.error_desc).into_response(),
        }
    }

    fn unknown_team(&self, host: &str) -> Response {
        let key = team_key(host);
        warn!("request for unknown team '{}'", key);
        self.error_page(
            key,
            StatusCode::NOT_FOUND,
            &format!("There is no team called {}.", key),
        )
    }
}

/// Fetches a range, logging and treating a failure as an empty sheet.
async fn fetch_or_empty(team: &Team, range: &str, what: &str) -> Vec<Vec<String>> {
    match team.fetch(range).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(
                "Unable to retrieve {} list from sheet for '{}'. {}",
                what, team.config.key, e
            );
            Vec::new()
        }
    }
}

async fn fetch_entries(team: &Team) -> Vec<TimeEntry> {
    let rows = fetch_or_empty(team, &team.config.stats_range, "stats").await;
    normalize(&rows).collect()
}

// index page (entry form)
async fn serve_index(State(state): State<Arc<AppState>>, Host(host): Host) -> Response {
    let Some(team) = state.team(&host) else {
        return state.unknown_team(&host);
    };
    let config = &team.config;

    let players = fetch_or_empty(team, &config.player_range, "player").await;
    let tasks = fetch_or_empty(team, &config.task_range, "task").await;

    let page = IndexPage {
        title: page_title("Add Session", &config.name),
        team: config.key.clone(),
        team_name: config.name.clone(),
        date: format_date(today()),
        players: column_values(&players),
        tasks: column_values(&tasks),
        durations: DURATION_LABELS.iter().map(|(label, _)| *label).collect(),
    };

    state.render(Page::Index, &page)
}

async fn serve_leaderboard(
    State(state): State<Arc<AppState>>,
    Host(host): Host,
    jar: CookieJar,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let Some(team) = state.team(&host) else {
        return state.unknown_team(&host);
    };

    let requested = query.leaderboard_rows.as_deref().and_then(parse_rows);
    let rows = requested
        .or_else(|| jar.get(ROWS_COOKIE).and_then(|c| parse_rows(c.value())))
        .unwrap_or(DEFAULT_TOP_N);

    let entries = fetch_entries(team).await;

    let page = LeaderboardPage {
        title: page_title("Leaderboards", &team.config.name),
        team: team.config.key.clone(),
        leaderboard_rows: rows,
        leaderboards: rankings(&entries, rows),
    };
    let response = state.render(Page::Leaderboard, &page);

    match requested {
        Some(rows) => {
            let mut cookie = Cookie::new(ROWS_COOKIE, rows.to_string());
            cookie.set_path("/");
            (jar.add(cookie), response).into_response()
        }
        None => response,
    }
}

async fn serve_tasks(
    State(state): State<Arc<AppState>>,
    Host(host): Host,
    Query(query): Query<TasksQuery>,
) -> Response {
    let Some(team) = state.team(&host) else {
        return state.unknown_team(&host);
    };

    let (window, start_date, end_date) = match query.date_range.as_deref() {
        Some(range) => {
            let mut parts = range.split(" - ");
            let (start, end) = match (parts.next(), parts.next()) {
                (Some(start), Some(end)) => (start.to_string(), end.to_string()),
                _ => (String::new(), String::new()),
            };
            (DateWindow::from_range_param(range), start, end)
        }
        None => {
            let today = today();
            let window = DateWindow::last_days(today, DEFAULT_WINDOW_DAYS);
            let start = window.start.map(format_date).unwrap_or_default();
            (window, start, format_date(today))
        }
    };

    let entries = fetch_entries(team).await;

    let page = TasksPage {
        title: page_title("Tasks", &team.config.name),
        team: team.config.key.clone(),
        tasks: task_breakdown(&entries, &window),
        start_date,
        end_date,
    };

    state.render(Page::Tasks, &page)
}

async fn submit_entry(
    State(state): State<Arc<AppState>>,
    Host(host): Host,
    Json(request): Json<SubmitEntryRequest>,
) -> Response {
    let Some(team) = state.team(&host) else {
        return state.unknown_team(&host);
    };

    match save_entry(team, &request).await {
        Ok(()) => {
            info!(
                "saved {} of '{}' for {} on team '{}'",
                request.duration, request.task, request.name, team.config.key
            );
            Json(SubmitEntryResponse {
                message: SAVED_MESSAGE.to_string(),
            })
            .into_response()
        }
        Err(e) => {
            error!("Failed to save the data to the spreadsheet. {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// per team favicon, eg: /favicon.ico from /static/team/<team>/img/favicon.png
async fn serve_favicon(State(state): State<Arc<AppState>>, Host(host): Host) -> Response {
    let Some(team) = state.team(&host) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let path = state
        .static_dir
        .join("team")
        .join(&team.config.key)
        .join("img")
        .join("favicon.png");

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Resource not found.").into_response(),
    }
}

async fn not_found(State(state): State<Arc<AppState>>, Host(host): Host) -> Response {
    state.error_page(
        team_key(&host),
        StatusCode::NOT_FOUND,
        "The page you are looking for does not exist.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamConfig;
    use crate::spreadsheet::testing::MemorySheet;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    const HOST: &str = "demo.example.com";

    fn demo_team() -> TeamConfig {
        TeamConfig {
            key: "demo".into(),
            name: "Demo Ultimate".into(),
            spreadsheet_id: "sheet-demo".into(),
            player_range: "Settings!A:A".into(),
            task_range: "Settings!B:B".into(),
            stats_range: "Stats!A:E".into(),
        }
    }

    fn demo_sheet() -> MemorySheet {
        let today = format_date(today());
        MemorySheet::default()
            .with_range("Settings!A:A", vec![vec!["Players"], vec!["Alice"], vec![" Bob "]])
            .with_range("Settings!B:B", vec![vec!["Tasks"], vec!["Defense"], vec!["Offense"]])
            .with_range(
                "Stats!A:E",
                vec![
                    vec!["Name", "Task", "Time", "Date", "Notes"],
                    vec!["Alice", "Defense", "2", "01/01/2024", ""],
                    vec!["Bob", "Defense", "1", "01/01/2024", ""],
                    vec!["Alice", "Offense", "3", "02/01/2024", ""],
                    vec!["Mallory", "Defense", "abc", "01/01/2024", ""],
                    vec!["Carol", "Conditioning", "0.5", today.as_str(), "sprints"],
                ],
            )
    }

    fn state_with(sheet: Arc<MemorySheet>, static_dir: PathBuf) -> Arc<AppState> {
        Arc::new(AppState {
            registry: Registry::new(vec![demo_team()], sheet, None),
            views: Views::new().unwrap(),
            static_dir,
        })
    }

    fn app() -> Router {
        router(state_with(Arc::new(demo_sheet()), PathBuf::from("static")))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, HOST)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_team_key() {
        assert_eq!(team_key("demo.example.com"), "demo");
        assert_eq!(team_key("demo.example.com:8080"), "demo");
        assert_eq!(team_key("localhost:8080"), "localhost");
        assert_eq!(team_key("localhost"), "localhost");
    }

    #[test]
    fn test_parse_rows() {
        assert_eq!(parse_rows("3"), Some(3));
        assert_eq!(parse_rows(" 10 "), Some(10));
        assert_eq!(parse_rows("0"), None);
        assert_eq!(parse_rows("-2"), None);
        assert_eq!(parse_rows("many"), None);
    }

    #[tokio::test]
    async fn test_index_lists_players_and_tasks() {
        let response = app().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Add Session | Demo Ultimate UltiTracker"));
        assert!(html.contains(r#"<option value="Bob">Bob</option>"#));
        assert!(html.contains(r#"<option value="Offense">Offense</option>"#));
        assert!(html.contains(r#"<option value="1h 30min">1h 30min</option>"#));
        assert!(html.contains(&format_date(today())));
        assert!(!html.contains(r#"<option value="Players">"#));
    }

    #[tokio::test]
    async fn test_leaderboard_defaults_to_five_rows() {
        let response = app().oneshot(get_request("/leaderboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let html = body_text(response).await;
        assert!(html.contains("Leaderboards | Demo Ultimate UltiTracker"));
        assert!(html.contains("Overall Leaders <small>6.50h</small>"));
        assert!(html.contains(r#"Alice <span class="score">5.00</span>"#));
        assert!(html.contains(r#"name="leaderboard_rows" value="5""#));
        assert!(!html.contains("Mallory"));
    }

    #[tokio::test]
    async fn test_leaderboard_rows_param_is_remembered() {
        let response = app()
            .oneshot(get_request("/leaderboard?leaderboard_rows=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.starts_with("leaderboard_rows=1"));

        let html = body_text(response).await;
        assert!(html.contains("Overall Leaders <small>5.00h</small>"));
        assert!(!html.contains("Bob"));
    }

    #[tokio::test]
    async fn test_leaderboard_uses_cookie_preference() {
        let request = Request::builder()
            .uri("/leaderboard")
            .header(header::HOST, HOST)
            .header(header::COOKIE, "leaderboard_rows=1")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let html = body_text(response).await;
        assert!(html.contains(r#"name="leaderboard_rows" value="1""#));
        assert!(!html.contains("Bob"));
    }

    #[tokio::test]
    async fn test_tasks_date_range() {
        let response = app()
            .oneshot(get_request(
                "/tasks?date-range=01%2F01%2F2024%20-%2001%2F01%2F2024",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Defense <small>3.00h</small>"));
        assert!(!html.contains("Offense"));
        assert!(!html.contains("Conditioning"));
        assert!(html.contains(r#"value="01/01/2024 - 01/01/2024""#));
    }

    #[tokio::test]
    async fn test_tasks_default_to_last_week() {
        let response = app().oneshot(get_request("/tasks")).await.unwrap();
        let html = body_text(response).await;

        let today = today();
        let start = format_date(today - chrono::Duration::days(6));
        assert!(html.contains(&format!(r#"value="{} - {}""#, start, format_date(today))));
        assert!(html.contains("Conditioning <small>0.50h</small>"));
        assert!(!html.contains("Defense"));
    }

    #[tokio::test]
    async fn test_unusable_date_range_shows_everything() {
        let response = app()
            .oneshot(get_request("/tasks?date-range=whenever"))
            .await
            .unwrap();
        let html = body_text(response).await;

        assert!(html.contains("Defense"));
        assert!(html.contains("Offense"));
        assert!(html.contains("Conditioning"));
    }

    #[tokio::test]
    async fn test_submit_entry_appends_row() {
        let sheet = Arc::new(demo_sheet());
        let app = router(state_with(Arc::clone(&sheet), PathBuf::from("static")));

        let body = json!({
            "name": "Bob",
            "task": "Offense",
            "duration": "1h 15min",
            "date": "03/01/2024",
            "notes": "hucks"
        });
        let request = Request::builder()
            .method("POST")
            .uri("/submit-entry")
            .header(header::HOST, HOST)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let reply: SubmitEntryResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(reply.message, SAVED_MESSAGE);

        let rows = sheet.rows("Stats!A:E");
        assert_eq!(
            rows.last().unwrap(),
            &vec!["Bob", "Offense", "1.25", "03/01/2024", "hucks"]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_renders_empty_page() {
        let app = router(state_with(
            Arc::new(MemorySheet::failing()),
            PathBuf::from("static"),
        ));

        let response = app.oneshot(get_request("/leaderboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("No sessions have been logged yet."));
    }

    #[tokio::test]
    async fn test_append_failure_is_500() {
        let app = router(state_with(
            Arc::new(MemorySheet::failing()),
            PathBuf::from("static"),
        ));

        let request = Request::builder()
            .method("POST")
            .uri("/submit-entry")
            .header(header::HOST, HOST)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"name": "Bob", "task": "Offense", "duration": "1h", "date": "03/01/2024"}"#,
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_team_is_404() {
        let request = Request::builder()
            .uri("/leaderboard")
            .header(header::HOST, "nobody.example.com")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("There is no team called nobody."));
    }

    #[tokio::test]
    async fn test_unknown_page_is_404() {
        let response = app().oneshot(get_request("/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let html = body_text(response).await;
        assert!(html.contains("<h1>404 Not Found</h1>"));
        assert!(html.contains("The page you are looking for does not exist."));
    }

    #[tokio::test]
    async fn test_team_favicon() {
        let dir = tempfile::tempdir().unwrap();
        let img_dir = dir.path().join("team").join("demo").join("img");
        std::fs::create_dir_all(&img_dir).unwrap();
        std::fs::write(img_dir.join("favicon.png"), b"png-bytes").unwrap();

        let app = router(state_with(Arc::new(demo_sheet()), dir.path().to_path_buf()));
        let response = app.oneshot(get_request("/favicon.ico")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(body_text(response).await, "png-bytes");

        let empty = tempfile::tempdir().unwrap();
        let app = router(state_with(Arc::new(demo_sheet()), empty.path().to_path_buf()));
        let response = app.oneshot(get_request("/favicon.ico")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
