//! Centralised tracing initialisation for processes embedding Tally.
//!
//! Call [`init_tracing`] once at program start. `RUST_LOG` wins over the
//! default level; JSON output carries the evaluation span (`subject_id`) on
//! every line.

use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// * `json`: newline-delimited JSON instead of compact text.
/// * `level`: verbosity when `RUST_LOG` is unset or unparsable.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is left untouched.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let (compact, structured) = if json {
        (None, Some(fmt::layer().json().with_current_span(true)))
    } else {
        (Some(fmt::layer().compact()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(structured)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        assert!(init_tracing(false, Level::WARN));
        assert!(!init_tracing(true, Level::DEBUG));
        tracing::warn!("still logging after second init");
    }
}
