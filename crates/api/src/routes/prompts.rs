use axum::routing::post;
use axum::Router;

use crate::handlers::prompts;
use crate::state::AppState;

/// Routes mounted at `/prompts`.
///
/// ```text
/// POST   /enhance         -> enhance_prompt
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/enhance", post(prompts::enhance_prompt))
}
