use rustyline::{Config, Editor, Result};

use super::connection::ConnectionState;

/// Input prompt. Flags the session when the backend is unreachable, since
/// anything typed then is dropped.
pub fn generate_prompt(state: ConnectionState) -> String {
    match state {
        ConnectionState::Open => "> ".to_string(),
        other => format!("({}) > ", other),
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .build();
    Editor::with_config(config)
}
