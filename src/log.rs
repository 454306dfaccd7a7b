//! Logging setup and small helpers for human readable commentary.

use log::LevelFilter;
use std::rc::Rc;

/// A line sink for commentary output (log generators, debug watchers).
pub type LogSink = Rc<dyn Fn(&str)>;

/// Initialize logging for the command line driver.
///
/// Uses `Debug` level if `debug_enabled` is set, `Info` otherwise; an
/// explicit `RUST_LOG` overrides both.
pub fn init_logger(debug_enabled: bool) {
    use std::env;
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false);

    // Let RUST_LOG override our defaults if explicitly set
    if let Ok(spec) = env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    builder.init();
    log::debug!("logger initialized at {level:?} level");
}

/// Sink that forwards every line to `log::info!`.
pub fn info_sink() -> LogSink {
    Rc::new(|line: &str| log::info!("{line}"))
}

/// Sink that forwards every line to `log::debug!`.
pub fn debug_sink() -> LogSink {
    Rc::new(|line: &str| log::debug!("{line}"))
}

/// Wraps `out` so that successive lines get successive prefixes.
///
/// The first line gets `prefixes[0]`, the second `prefixes[1]`, and so on;
/// the last prefix sticks for all remaining lines. Prefix and line are
/// joined by a single space.
pub fn prefixed<'a>(
    out: &'a mut dyn FnMut(&str),
    prefixes: &'a [&'a str],
) -> impl FnMut(&str) + 'a {
    let mut i = 0usize;
    move |line: &str| {
        let pfx = prefixes.get(i).or(prefixes.last()).copied().unwrap_or("");
        if i + 1 < prefixes.len() {
            i += 1;
        }
        out(&format!("{pfx} {line}"));
    }
}

/// Continuation prefix for [`prefixed`]: `"..."` padded to the width of `prefix`.
pub fn elided(prefix: &str) -> String {
    format!("{:<width$}", "...", width = prefix.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_sticks_on_last() {
        let mut lines = Vec::new();
        {
            let mut sink = |s: &str| lines.push(s.to_string());
            let mut out = prefixed(&mut sink, &["hello", "world", "meh..."]);
            out("such");
            out("much");
            out("amaze");
            out("still amazing");
        }
        assert_eq!(
            lines,
            vec!["hello such", "world much", "meh... amaze", "meh... still amazing"]
        );
    }

    #[test]
    fn test_elided_pads_to_prefix() {
        assert_eq!(elided("something"), "...      ");
        assert_eq!(elided("ab"), "...");
    }
}
