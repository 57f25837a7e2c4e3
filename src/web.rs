use crate::{Candidate, Services, SolveNotice, WordEntry};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;
pub const DEFAULT_MATCH_LIMIT: usize = 200;
const MAX_MATCH_LIMIT: usize = 1000;

pub struct AppState {
    pub services: Services,
    pub theme: WebTheme,
    pub match_limit: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for WebTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tailwind" => Ok(WebTheme::Tailwind),
            "bootstrap" => Ok(WebTheme::Bootstrap),
            other => Err(format!("unknown theme {other:?} (expected tailwind or bootstrap)")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    form_class: &'static str,
    input_class: &'static str,
    button_class: &'static str,
    notice_class: &'static str,
    row_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                form_class: "flex flex-wrap gap-3",
                input_class: "rounded-md border border-slate-300 px-3 py-2 text-lg",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                notice_class: "rounded-md bg-amber-100 px-4 py-2 text-amber-900",
                row_class: "border-b border-slate-200 py-2",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                form_class: "d-flex flex-wrap gap-3 mb-3",
                input_class: "form-control form-control-lg w-auto",
                button_class: "btn btn-primary btn-lg px-4 py-2",
                notice_class: "alert alert-warning",
                row_class: "list-group-item",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub match_limit: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], crate::config::DEFAULT_PORT)),
            theme: WebTheme::default(),
            match_limit: DEFAULT_MATCH_LIMIT,
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, services: Services) -> Result<(), WebError> {
    let state = Arc::new(AppState {
        services,
        theme: config.theme,
        match_limit: config.match_limit.clamp(1, MAX_MATCH_LIMIT),
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        match_limit = config.match_limit,
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/solve", post(legacy_solve))
        .route("/api/match", get(api_match))
        .route("/api/clue", post(api_clue))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "crossword-solver",
        "words": state.services.matcher.word_count(),
        "model_available": state.services.solver.model_available(),
    }))
}

async fn home(
    State(state): State<SharedState>,
    Query(params): Query<HomeParams>,
) -> impl IntoResponse {
    let pattern_query = params.pattern.unwrap_or_default();
    let matches = if pattern_query.trim().is_empty() {
        None
    } else {
        Some(
            state
                .services
                .matcher
                .match_pattern(&pattern_query, Some(state.match_limit))
                .await,
        )
    };

    let clue_query = params.clue.unwrap_or_default();
    let clue_pattern = params.clue_pattern.unwrap_or_default();
    let solution = if clue_query.trim().is_empty() {
        None
    } else {
        Some(
            state
                .services
                .solver
                .solve(&clue_query, Some(clue_pattern.as_str()))
                .await,
        )
    };
    let notice = match &solution {
        Some(solved) => solved.notice.map(|notice| notice.message()),
        None if !state.services.solver.model_available() => {
            Some(SolveNotice::ModelUnavailable.message())
        }
        None => None,
    };

    let template = HomeTemplate {
        chrome: Chrome::new(state.theme),
        version: env!("CARGO_PKG_VERSION"),
        pattern_query: &pattern_query,
        matches,
        clue_query: &clue_query,
        clue_pattern: &clue_pattern,
        solution,
        notice,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(err.to_string())),
    )
}

/// Form-compatible endpoint: `{"pattern": "c_t"}` in, `[{word, definition}]` out.
async fn legacy_solve(
    State(state): State<SharedState>,
    Json(request): Json<LegacySolveRequest>,
) -> Json<Vec<WordEntry>> {
    let report = state
        .services
        .matcher
        .match_pattern(&request.pattern, Some(state.match_limit))
        .await;
    Json(report.entries)
}

async fn api_match(
    State(state): State<SharedState>,
    Query(params): Query<MatchParams>,
) -> Json<MatchResponsePayload> {
    let limit = params
        .limit
        .unwrap_or(state.match_limit)
        .clamp(1, MAX_MATCH_LIMIT);
    let report = state
        .services
        .matcher
        .match_pattern(params.pattern.as_deref().unwrap_or_default(), Some(limit))
        .await;
    Json(MatchResponsePayload {
        pattern: report.pattern,
        total: report.total,
        limit,
        results: report.entries,
    })
}

async fn api_clue(
    State(state): State<SharedState>,
    Json(request): Json<ClueRequest>,
) -> Json<ClueResponsePayload> {
    let pattern = request
        .pattern
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::to_string);
    let solution = state
        .services
        .solver
        .solve(&request.clue, pattern.as_deref())
        .await;
    Json(ClueResponsePayload {
        clue: request.clue.trim().to_string(),
        pattern,
        cached: solution.cached,
        notice: solution.notice.map(|code| NoticePayload {
            code,
            message: code.message(),
        }),
        candidates: solution.candidates,
    })
}

fn render_error_page(message: String) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\" /><title>Crossword Solver • Error</title></head>\
         <body><main><h1>Something went wrong</h1><p>{}</p><p><a href=\"/\">Back</a></p></main></body></html>",
        html_escape(&message)
    )
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Default, Deserialize)]
struct HomeParams {
    pattern: Option<String>,
    clue: Option<String>,
    clue_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatchParams {
    pattern: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LegacySolveRequest {
    #[serde(default)]
    pattern: String,
}

#[derive(Debug, Deserialize)]
struct ClueRequest {
    #[serde(default)]
    clue: String,
    pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct MatchResponsePayload {
    pattern: String,
    total: usize,
    limit: usize,
    results: Vec<WordEntry>,
}

#[derive(Debug, Clone, Serialize)]
struct NoticePayload {
    code: SolveNotice,
    message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ClueResponsePayload {
    clue: String,
    pattern: Option<String>,
    cached: bool,
    notice: Option<NoticePayload>,
    candidates: Vec<Candidate>,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Crossword Solver</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <div>
          <p class="{{ chrome.eyebrow_class }}">Crossword Solver v{{ version }}</p>
          <h1 class="{{ chrome.headline_class }}">Crossword Solver</h1>
          <p class="{{ chrome.lede_class }}">Enter a pattern (use _ or ? for unknown letters), or ask for answers to a clue.</p>
        </div>

        <section id="pattern-search">
          <form method="get" action="/" class="{{ chrome.form_class }}">
            <input name="pattern" value="{{ pattern_query }}" placeholder="e.g. C_T" class="{{ chrome.input_class }}">
            <button type="submit" class="{{ chrome.button_class }}">Find words</button>
          </form>
          {% match matches %}
          {% when Some with (report) %}
          <p>{{ report.total }} words match “{{ report.pattern }}”{% if report.total > report.entries.len() %} (first {{ report.entries.len() }} shown){% endif %}.</p>
          <ul id="results">
            {% for entry in report.entries %}
            <li class="{{ chrome.row_class }}"><strong>{{ entry.word }}</strong>{% match entry.definition %}{% when Some with (definition) %}: {{ definition }}{% when None %}{% endmatch %}</li>
            {% endfor %}
          </ul>
          {% when None %}
          {% endmatch %}
        </section>

        <section id="clue-solver">
          <form method="get" action="/" class="{{ chrome.form_class }}">
            <input name="clue" value="{{ clue_query }}" placeholder="e.g. Feline pet (3)" class="{{ chrome.input_class }}">
            <input name="clue_pattern" value="{{ clue_pattern }}" placeholder="optional pattern" class="{{ chrome.input_class }}">
            <button type="submit" class="{{ chrome.button_class }}">Suggest answers</button>
          </form>
          {% match notice %}
          {% when Some with (message) %}
          <p class="{{ chrome.notice_class }}">{{ message }}</p>
          {% when None %}
          {% endmatch %}
          {% match solution %}
          {% when Some with (solved) %}
          {% if solved.cached %}
          <p class="text-sm text-slate-500">Served from cache.</p>
          {% endif %}
          <ul id="candidates">
            {% for candidate in solved.candidates %}
            <li class="{{ chrome.row_class }}"><strong>{{ candidate.answer }}</strong>{% match candidate.note %}{% when Some with (note) %} <em>{{ note }}</em>{% when None %}{% endmatch %}{% match candidate.definition %}{% when Some with (definition) %}: {{ definition }}{% when None %}{% endmatch %}</li>
            {% endfor %}
          </ul>
          {% when None %}
          {% endmatch %}
        </section>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct HomeTemplate<'a> {
    chrome: Chrome,
    version: &'static str,
    pattern_query: &'a str,
    matches: Option<crate::MatchReport>,
    clue_query: &'a str,
    clue_pattern: &'a str,
    solution: Option<crate::Solution>,
    notice: Option<&'static str>,
}
