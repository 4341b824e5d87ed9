use std::{io::Write as _, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    render_plan, HttpTransport, QueryResult, RenderPlan, TransitionController, TransitionError,
};
use shared::domain::{FriendlyCode, SessionId};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::TryRecvError},
};
use tracing::{debug, warn};
use uuid::Uuid;

mod controller;
mod ui;

use controller::{
    events::{parse_input, parse_waiting_input, UiAction},
    reducer::SurveyView,
};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    /// Resume a session by its passphrase.
    #[arg(long, conflicts_with = "session")]
    code: Option<String>,
    /// Resume a session by its id.
    #[arg(long)]
    session: Option<Uuid>,
}

/// The query that produces the first page, kept so it can be retried.
#[derive(Debug, Clone)]
enum Opening {
    Start,
    Restore(SessionId),
    Lookup(FriendlyCode),
}

impl Opening {
    fn from_args(code: Option<String>, session: Option<Uuid>) -> Self {
        match (code, session) {
            (Some(code), _) => Opening::Lookup(FriendlyCode::new(code)),
            (None, Some(session)) => Opening::Restore(SessionId(session)),
            (None, None) => Opening::Start,
        }
    }

    async fn run(&self, controller: &TransitionController) -> Result<QueryResult, TransitionError> {
        match self {
            Opening::Start => controller.start().await,
            Opening::Restore(session_id) => controller.restore(*session_id).await,
            Opening::Lookup(code) => controller.lookup_passphrase(code).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let transport = HttpTransport::new(&args.server_url)
        .with_context(|| format!("invalid server url '{}'", args.server_url))?;
    let controller = TransitionController::new(Arc::new(transport));
    let mut events = controller.subscribe();
    let mut view = SurveyView::default();

    let opening = Opening::from_args(args.code, args.session);
    opening.run(&controller).await?;
    drain_events(&mut events, &mut view, &controller).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let phase = controller.phase().await;
        print!("{}", ui::render(&view, phase));
        if view.is_done() {
            break;
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let action = match render_plan(view.ready, phase, || view.page.as_ref()) {
            RenderPlan::Page(layout) => parse_input(&line, &layout),
            RenderPlan::Loading => match parse_waiting_input(&line, view.can_retry()) {
                Some(action) => Ok(action),
                None => continue,
            },
        };

        match action {
            Ok(UiAction::Quit) => break,
            Ok(UiAction::Capture(answer_id)) => {
                if let Err(err) = controller.capture_on_current_page(answer_id).await {
                    view.note(err.to_string());
                } else {
                    view.note(format!("selected option {answer_id}"));
                }
            }
            Ok(UiAction::Submit(submission)) => {
                if let Err(err) = controller.submit(submission).await {
                    report_refusal(&mut view, err);
                }
                drain_events(&mut events, &mut view, &controller).await;
            }
            Ok(UiAction::Retry) => {
                debug!(?opening, "retrying opening query");
                if let Err(err) = opening.run(&controller).await {
                    report_refusal(&mut view, err);
                }
                drain_events(&mut events, &mut view, &controller).await;
            }
            Err(err) => view.note(err.to_string()),
        }
    }
    Ok(())
}

/// Feeds every dispatched result into the view and hands fresh pages to the
/// controller.
async fn drain_events(
    events: &mut broadcast::Receiver<QueryResult>,
    view: &mut SurveyView,
    controller: &TransitionController,
) {
    loop {
        match events.try_recv() {
            Ok(result) => {
                debug!(?result, "query result dispatched");
                if let Some(page) = view.apply(result) {
                    controller.load_page(page).await;
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "dropped query results");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn report_refusal(view: &mut SurveyView, err: TransitionError) {
    warn!(%err, "submission refused");
    view.note(err.to_string());
}
