// Copyright (c) The regdetect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Colors and logging for the command line.
//!
//! Logs go to stderr as `level: message` lines; the report itself goes to stdout through the
//! runner's reporter.

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber, level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable used to configure log levels, in `tracing_subscriber` target syntax.
pub(crate) const LOG_ENV: &str = "REGDETECT_LOG";

/// Events logged with this target are printed without a level heading.
pub(crate) const NO_HEADING_TARGET: &str = "regdetect::no_heading";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects},
    };

    pub(crate) const fn style() -> Styles {
        let bold = Effects::BOLD;
        Styles::styled()
            .header(AnsiColor::Green.on_default().effects(bold))
            .usage(AnsiColor::Green.on_default().effects(bold))
            .literal(AnsiColor::Cyan.on_default().effects(bold))
            .placeholder(AnsiColor::Cyan.on_default())
            .error(AnsiColor::Red.on_default().effects(bold))
            .valid(AnsiColor::Cyan.on_default().effects(bold))
            .invalid(AnsiColor::Yellow.on_default().effects(bold))
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// When to use colors in the report and in log messages
    #[arg(
        long,
        value_enum,
        default_value_t,
        global = true,
        value_name = "WHEN",
        env = "REGDETECT_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    /// Sets up logging and returns the resolved output settings.
    pub(crate) fn init(self) -> OutputContext {
        init_logger(self.color.should_colorize(supports_color::Stream::Stderr));
        OutputContext { color: self.color }
    }
}

/// Output settings resolved once at startup.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    color: Color,
}

impl OutputContext {
    /// Returns true if the report on stdout should be colored.
    pub(crate) fn colorize_stdout(&self) -> bool {
        self.color.should_colorize(supports_color::Stream::Stdout)
    }
}

/// Whether to produce colored output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Color {
    /// Use colors if the stream is a terminal that supports them.
    #[default]
    Auto,

    /// Always use colors.
    Always,

    /// Never use colors.
    Never,
}

impl Color {
    fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Installs the global subscriber. Later calls leave the first subscriber in place.
fn init_logger(colorize: bool) {
    let mut styles = LogStyles::default();
    if colorize {
        styles.colorize();
    }

    let filter = std::env::var(LOG_ENV).unwrap_or_default();
    let (targets, invalid) = match filter.parse::<Targets>() {
        Ok(targets) if !filter.is_empty() => (targets, None),
        Ok(_) => (Targets::new().with_default(LevelFilter::INFO), None),
        Err(error) => (Targets::new().with_default(LevelFilter::INFO), Some(error)),
    };

    let layer = tracing_subscriber::fmt::layer()
        .event_format(LogFormatter { styles })
        .with_writer(std::io::stderr)
        .with_filter(targets);
    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        return;
    }

    if let Some(error) = invalid {
        warn!("ignoring invalid {LOG_ENV} value `{filter}`: {error}");
    }
}

struct LogFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        if metadata.target() != NO_HEADING_TARGET {
            let (heading, style) = self.styles.heading(*metadata.level());
            write!(writer, "{}: ", heading.style(style))?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = Style::new().red().bold();
        self.warning = Style::new().yellow().bold();
        self.info = Style::new().bold();
        self.debug = Style::new().dimmed();
    }

    fn heading(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.info),
            Level::DEBUG => ("debug", self.debug),
            Level::TRACE => ("trace", self.debug),
        }
    }
}
