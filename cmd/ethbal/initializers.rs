use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{
    EnvFilter, filter::Directive, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::cli::{LogColor, Options};

/// Installs the global subscriber. Logs go to stderr so that `--json`
/// output on stdout stays machine readable.
pub fn init_tracing(opts: &Options) {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => std::io::stderr().is_terminal(),
    };

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    let fmt_layer = fmt::layer()
        .with_target(include_target)
        .with_ansi(use_color)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(log_filter)
        .with(fmt_layer)
        .init();
}
