//! Browser front end: one page, one session, form posts that redirect back.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::State,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use log::info;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::session::{Assistant, Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Success,
    Info,
    Error,
}

impl Level {
    fn class(&self) -> &'static str {
        match self {
            Level::Success => "notice success",
            Level::Info => "notice info",
            Level::Error => "notice error",
        }
    }
}

/// One-shot status message shown on the next page render.
#[derive(Debug, Clone)]
struct Notice {
    level: Level,
    text: String,
}

impl Notice {
    fn new(level: Level, text: impl Into<String>) -> Self {
        Notice {
            level,
            text: text.into(),
        }
    }
}

#[derive(Default)]
struct UiState {
    session: Session,
    notice: Option<Notice>,
}

/// Shared application state.
pub struct AppState {
    assistant: Assistant,
    // Held for the whole request, so interactions run one at a time
    ui: Mutex<UiState>,
}

impl AppState {
    pub fn new(assistant: Assistant) -> Self {
        AppState {
            assistant,
            ui: Mutex::new(UiState::default()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/ask", post(ask))
        .route("/clear", post(clear))
        .route("/health", get(health))
        .with_state(state)
}

/// Run the web UI until the process is stopped.
pub async fn serve(addr: &str, assistant: Assistant) -> eyre::Result<()> {
    let app = router(Arc::new(AppState::new(assistant)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web UI listening on http://{addr}");
    eprintln!("TubeMind running at http://{addr} (Ctrl+C to stop)");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct ProcessForm {
    url: String,
}

#[derive(Deserialize)]
struct AskForm {
    question: String,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let mut ui = state.ui.lock().await;
    let notice = ui.notice.take();
    Html(render_page(&ui.session, notice.as_ref()))
}

async fn process(State(state): State<Arc<AppState>>, Form(form): Form<ProcessForm>) -> Redirect {
    let mut ui = state.ui.lock().await;
    let UiState { session, notice } = &mut *ui;

    let url = form.url.trim();
    *notice = Some(if url.is_empty() {
        Notice::new(Level::Info, "Paste a YouTube URL first.")
    } else {
        match state.assistant.process(session, url).await {
            Ok(p) => match p.summary_error {
                Some(e) => Notice::new(
                    Level::Error,
                    format!("Transcript loaded, but the summary failed.\n\n{}", e.user_message()),
                ),
                None if p.from_cache => Notice::new(Level::Success, format!("Loaded {} from cache.", p.video_id)),
                None => Notice::new(
                    Level::Success,
                    "Video ready! Read the summary below and start asking questions.",
                ),
            },
            Err(e) => Notice::new(Level::Error, e.user_message()),
        }
    });
    Redirect::to("/")
}

async fn ask(State(state): State<Arc<AppState>>, Form(form): Form<AskForm>) -> Redirect {
    let mut ui = state.ui.lock().await;
    let UiState { session, notice } = &mut *ui;

    let question = form.question.trim();
    if !question.is_empty() {
        if let Err(e) = state.assistant.ask(session, question).await {
            *notice = Some(Notice::new(Level::Error, format!("Error generating response: {}", e.user_message())));
        }
    }
    Redirect::to("/")
}

async fn clear(State(state): State<Arc<AppState>>) -> Redirect {
    let mut ui = state.ui.lock().await;
    ui.session.reset();
    ui.notice = Some(Notice::new(Level::Info, "Session cleared."));
    Redirect::to("/")
}

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; background: #18181b; color: #e4e4e7; display: flex; }
aside { width: 260px; min-height: 100vh; background: #0f0f12; padding: 1.5rem; box-sizing: border-box; }
main { flex: 1; max-width: 900px; margin: 0 auto; padding: 1.5rem 2rem; }
h1 { font-size: 3rem; text-align: center; margin: 0.5rem 0 0; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); -webkit-background-clip: text; -webkit-text-fill-color: transparent; }
.subtitle { text-align: center; color: #a1a1aa; margin-bottom: 2rem; }
form.inline { display: flex; gap: 0.5rem; }
input[type=text] { flex: 1; padding: 0.6rem; border-radius: 8px; border: 1px solid #3f3f46; background: #27272a; color: inherit; }
button { padding: 0.6rem 1.2rem; border-radius: 8px; border: 0; background: #667eea; color: white; cursor: pointer; }
.notice { margin: 1rem 0; padding: 0.8rem 1rem; border-radius: 8px; white-space: pre-wrap; }
.success { background: #14532d; } .info { background: #1e3a8a; } .error { background: #7f1d1d; }
.player { display: flex; justify-content: center; margin: 1rem 0; }
.summary { background: #f1f5f9; color: #1e293b; padding: 1.5rem; border-radius: 12px; border-left: 4px solid #667eea; white-space: pre-wrap; }
.msg { margin: 0.8rem 0; padding: 0.8rem 1rem; border-radius: 10px; white-space: pre-wrap; }
.msg.user { background: #27272a; } .msg.assistant { background: #1f2937; }
.role { font-size: 0.75rem; text-transform: uppercase; color: #a1a1aa; display: block; margin-bottom: 0.3rem; }
.stats { display: flex; gap: 1rem; } .stat b { display: block; font-size: 1.5rem; }
"#;

fn render_page(session: &Session, notice: Option<&Notice>) -> String {
    let mut page = String::with_capacity(8 * 1024);
    page.push_str("<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>TubeMind - AI YouTube Assistant</title><style>");
    page.push_str(STYLE);
    page.push_str("</style></head><body>");

    page.push_str(&render_sidebar(session));

    page.push_str("<main><h1>TubeMind</h1><div class=\"subtitle\">AI-Powered Video Intelligence</div>");
    page.push_str(if session.video_id().is_some() {
        "<h3>Process Another Video</h3>"
    } else {
        "<h3>Get Started</h3><p>Enter a YouTube URL to generate an AI summary and chat with your video.</p>"
    });
    page.push_str(
        "<form class=\"inline\" method=\"post\" action=\"/process\">\
         <input type=\"text\" name=\"url\" placeholder=\"https://www.youtube.com/watch?v=...\">\
         <button type=\"submit\">Process Video</button></form>",
    );

    if let Some(n) = notice {
        page.push_str(&format!("<div class=\"{}\">{}</div>", n.level.class(), encode_text(&n.text)));
    }

    if let Some(id) = session.video_id() {
        page.push_str(&format!(
            "<h3>Video Preview</h3><div class=\"player\"><iframe width=\"560\" height=\"315\" src=\"{}\" \
             frameborder=\"0\" allowfullscreen></iframe></div>",
            encode_double_quoted_attribute(&id.embed_url())
        ));
    }

    if session.transcript().is_some() {
        page.push_str("<h3>Chat</h3>");
        if let Some(summary) = session.summary() {
            page.push_str(&format!(
                "<div class=\"summary\"><strong>Summary</strong>\n\n{}</div>",
                encode_text(summary)
            ));
        }
        for msg in session.history() {
            let class = match msg.role {
                Role::User => "msg user",
                Role::Assistant => "msg assistant",
            };
            page.push_str(&format!(
                "<div class=\"{class}\"><span class=\"role\">{}</span>{}</div>",
                msg.role,
                encode_text(&msg.content)
            ));
        }
        page.push_str(
            "<form class=\"inline\" method=\"post\" action=\"/ask\">\
             <input type=\"text\" name=\"question\" placeholder=\"Ask anything about this video...\" autofocus>\
             <button type=\"submit\">Ask</button></form>",
        );
    }

    page.push_str("</main></body></html>");
    page
}

fn render_sidebar(session: &Session) -> String {
    let mut out = String::from(
        "<aside><h3>About TubeMind</h3><p>Turn YouTube videos into interactive summaries and Q&amp;A.</p>\
         <hr><strong>How to Use</strong><ol><li>Paste a YouTube URL</li><li>Click Process Video</li>\
         <li>Read the AI summary</li><li>Ask questions!</li></ol>",
    );
    if session.transcript().is_some() {
        out.push_str(&format!(
            "<hr><strong>Session Stats</strong><div class=\"stats\"><div class=\"stat\"><b>{}</b>Videos</div>\
             <div class=\"stat\"><b>{}</b>Messages</div></div>",
            session.cached_count(),
            session.history().len()
        ));
    }
    out.push_str(
        "<hr><form method=\"post\" action=\"/clear\"><button type=\"submit\">Clear Session</button></form></aside>",
    );
    out
}
