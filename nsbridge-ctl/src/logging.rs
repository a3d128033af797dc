use console::style;
use env_logger::{Builder, Env, Target};
use log::Level;
use std::io::Write;

/// Default filter when RUST_LOG is not set
fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

fn styled_level(level: Level) -> String {
    match level {
        Level::Error => format!("{}", style("ERROR").red().bold()),
        Level::Warn => format!("{}", style("WARN ").yellow().bold()),
        Level::Info => format!("{}", style("INFO ").green()),
        Level::Debug => format!("{}", style("DEBUG").cyan()),
        Level::Trace => format!("{}", style("TRACE").dim()),
    }
}

/// Log to stderr only: once isolated, the process can't open anything
/// else, and writing to an open descriptor is all the filter allows.
pub fn init_logger(verbose: bool) {
    let env = Env::default().filter_or("RUST_LOG", default_filter(verbose));

    Builder::from_env(env)
        .target(Target::Stderr)
        .format(|buf, record| {
            let level = styled_level(record.level());
            if record.level() >= Level::Debug {
                let target = record.target().split("::").next().unwrap_or_default();
                writeln!(buf, "{} {} {}", level, style(target).dim(), record.args())
            } else {
                writeln!(buf, "{} {}", level, record.args())
            }
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_follows_verbose() {
        assert_eq!(default_filter(true), "debug");
        assert_eq!(default_filter(false), "warn");
    }

    #[test]
    fn every_level_has_a_label() {
        for level in [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace] {
            assert!(!styled_level(level).is_empty());
        }
    }
}
