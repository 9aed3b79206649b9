use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

/// Логи идут в stderr без времени и target, чтобы не мешать выводу команд.
///
/// `RUST_LOG` перекрывает всё; иначе уровень `default_level` действует только
/// на крейты форума, а HTTP-стек остаётся на `warn`.
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(forum_directives(default_level)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

fn forum_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    format!("warn,forum_client={level},forum_cli={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_applies_only_to_forum_crates() {
        assert_eq!(
            forum_directives("debug"),
            "warn,forum_client=debug,forum_cli=debug"
        );
    }

    #[test]
    fn explicit_directives_are_kept() {
        assert_eq!(forum_directives("reqwest=trace"), "reqwest=trace");
    }

    #[test]
    fn directives_build_a_valid_filter() {
        assert!(EnvFilter::try_new(forum_directives("info")).is_ok());
    }
}
