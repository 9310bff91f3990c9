//! Status dashboard with JSON API endpoints

use std::net::SocketAddr;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::render::escape_html;
use crate::status::StatusBoard;

/// Build the dashboard axum router
pub fn build_router(board: StatusBoard) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(board)
}

/// Serve the dashboard on all interfaces until the token is cancelled
pub async fn serve(board: StatusBoard, port: u16, cancel: CancellationToken) -> crate::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| crate::DevmonError::Dashboard(format!("Failed to bind port {}: {}", port, e)))?;
    tracing::info!("Dashboard listening on http://{}", addr);

    axum::serve(listener, build_router(board))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| crate::DevmonError::Dashboard(e.to_string()))?;

    tracing::debug!("Dashboard stopped");
    Ok(())
}

async fn index_handler(State(board): State<StatusBoard>) -> impl IntoResponse {
    let device_rows: String = board
        .snapshot()
        .iter()
        .map(|s| {
            let last_poll = match s.last_poll_epoch_ms {
                Some(ms) => format!(
                    r#"<script>document.write(new Date({}).toLocaleTimeString())</script>"#,
                    ms
                ),
                None => "Never".to_string(),
            };
            let last_change = match s.last_change_epoch_ms {
                Some(ms) => format!(
                    r#"<script>document.write(new Date({}).toLocaleTimeString())</script>"#,
                    ms
                ),
                None => "Never".to_string(),
            };
            let errors_style = if s.consecutive_fetch_errors > 0 {
                "color: #721c24; background-color: #f8d7da;"
            } else {
                ""
            };
            format!(
                r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem; {}">{}</td>
                    <td style="padding: 0.5rem;">{} / {}</td>
                    <td style="padding: 0.5rem;">{}</td>
                    <td style="padding: 0.5rem;">{}</td>
                </tr>"#,
                escape_html(&s.device),
                escape_html(&s.endpoint),
                s.polls_total,
                s.polls_changed,
                s.polls_unchanged,
                errors_style,
                s.fetch_errors,
                s.notifications_sent,
                s.notifications_failed,
                last_poll,
                last_change
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta http-equiv="refresh" content="10">
    <title>Devmon Dashboard</title>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 1100px; margin: 0 auto; padding: 1rem;">
    <h1>Devmon Dashboard</h1>
    <p>Up for {uptime} s</p>
    <table style="width: 100%; border-collapse: collapse;">
        <thead>
            <tr style="border-bottom: 2px solid #dee2e6;">
                <th style="padding: 0.5rem; text-align: left;">Device</th>
                <th style="padding: 0.5rem; text-align: left;">Endpoint</th>
                <th style="padding: 0.5rem; text-align: left;">Polls</th>
                <th style="padding: 0.5rem; text-align: left;">Changed</th>
                <th style="padding: 0.5rem; text-align: left;">Unchanged</th>
                <th style="padding: 0.5rem; text-align: left;">Fetch Errors</th>
                <th style="padding: 0.5rem; text-align: left;">Sent / Failed</th>
                <th style="padding: 0.5rem; text-align: left;">Last Poll</th>
                <th style="padding: 0.5rem; text-align: left;">Last Change</th>
            </tr>
        </thead>
        <tbody>{device_rows}</tbody>
    </table>
</body>
</html>"#,
        uptime = board.uptime_secs(),
        device_rows = device_rows,
    );

    Html(html)
}

async fn status_handler(State(board): State<StatusBoard>) -> impl IntoResponse {
    axum::Json(board.snapshot())
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
