use crate::utils::{format_money, truncate_str};
use crate::verdict::Assessment;
use std::fmt::Display;
use tracing::{error, info, warn};

#[cfg(feature = "logging")]
pub use setup::{setup_logging, LogConfig, LogLevelGuard};

fn create_separator(width: usize, ch: char) -> String {
    std::iter::repeat(ch).take(width).collect()
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut wrapped = String::new();
    let mut line_length = 0;

    for word in text.split_whitespace() {
        if line_length > 0 && line_length + word.len() + 1 > width {
            wrapped.push('\n');
            wrapped.push_str("  ");
            wrapped.push_str(word);
            line_length = word.len() + 2;
        } else {
            if line_length > 0 {
                wrapped.push(' ');
                line_length += 1;
            }
            wrapped.push_str(word);
            line_length += word.len();
        }
    }
    wrapped
}

fn money_or_na(value: Option<f64>) -> String {
    value.map(format_money).unwrap_or_else(|| "N/A".to_string())
}

pub(crate) fn assessment_card(assessment: &Assessment) -> String {
    const CARD_WIDTH: usize = 80;
    const CONTENT_WIDTH: usize = CARD_WIDTH - 2;

    let listing = &assessment.listing;
    let horizontal_line = create_separator(CARD_WIDTH - 2, '═');
    let change = assessment
        .market_change()
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "\n╔{}╗\n\
         URL: {}\n\
         Title: {}\n\
         Price: {} ({})\n\
         Category: {} @ {}\n\
         Change: {}\n\
         Verdict: {} → {}\n\
         ╚{}╝",
        horizontal_line,
        wrap_text(&listing.url, CONTENT_WIDTH - 5),
        wrap_text(listing.title.as_deref().unwrap_or("N/A"), CONTENT_WIDTH - 7),
        money_or_na(assessment.price),
        listing.price_text.as_deref().unwrap_or("N/A"),
        assessment.category.as_deref().unwrap_or("unknown"),
        money_or_na(assessment.market_value),
        change,
        assessment.verdict,
        assessment.recommendation,
        horizontal_line,
    )
}

pub fn log_assessment_card(assessment: &Assessment) {
    info!("{}", assessment_card(assessment));
}

/// Loud banner for underpriced listings.
pub fn log_alert_card(assessment: &Assessment) {
    let banner = "🚨 ".repeat(20);
    warn!(
        "\n{}\nUNDERPRICED ITEM DETECTED!{}\n{}",
        banner,
        assessment_card(assessment),
        banner
    );
}

pub fn log_error_card<E: Display + std::error::Error>(url: &str, error: &E) {
    const CARD_WIDTH: usize = 70;
    const CONTENT_WIDTH: usize = CARD_WIDTH - 8;

    let top_bottom = create_separator(CARD_WIDTH - 2, '═');
    let middle = create_separator(CARD_WIDTH - 2, '─');

    let mut error_details = error.to_string();
    if let Some(source) = error.source() {
        error_details = format!("{error_details} (cause: {source})");
    }

    error!(
        "\n╔═{}═╗\n\
         ║ URL: {:<width$} ║\n\
         ║{}║\n\
         ║ Error: {:<width$} ║\n\
         ╚═{}═╝",
        top_bottom,
        truncate_str(url, CONTENT_WIDTH),
        middle,
        truncate_str(&error_details, CONTENT_WIDTH),
        top_bottom,
        width = CONTENT_WIDTH
    );
}

#[cfg(feature = "logging")]
mod setup {
    use crate::ScoutError;
    use std::path::PathBuf;
    use tracing::debug;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{
        fmt as subscriber_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    #[derive(Debug, Clone)]
    pub struct LogConfig {
        pub log_dir: PathBuf,
        pub log_level: String,
        pub console_output: bool,
        pub file_output: bool,
        /// Multi-line console output with span events; compact otherwise.
        pub pretty: bool,
    }

    impl Default for LogConfig {
        fn default() -> Self {
            Self {
                log_dir: "logs".into(),
                log_level: "info".into(),
                console_output: true,
                file_output: true,
                pretty: false,
            }
        }
    }

    /// Installs the global subscriber. `RUST_LOG` overrides `log_level`.
    pub fn setup_logging(config: LogConfig) -> Result<(), ScoutError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

        let mut layers = Vec::new();

        if config.console_output {
            let console_layer = subscriber_fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr);
            if config.pretty {
                layers.push(
                    console_layer
                        .with_line_number(true)
                        .with_file(true)
                        .with_span_events(subscriber_fmt::format::FmtSpan::CLOSE)
                        .pretty()
                        .boxed(),
                );
            } else {
                layers.push(console_layer.compact().boxed());
            }
        }

        if config.file_output {
            std::fs::create_dir_all(&config.log_dir)?;

            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "price-scout.log");

            let file_layer = subscriber_fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_writer(file_appender);

            layers.push(file_layer.boxed());
        }

        tracing_subscriber::registry()
            .with(env_filter)
            .with(layers)
            .try_init()
            .map_err(|e| ScoutError::InvalidConfiguration(format!("logging: {e}")))?;

        debug!("Logging system initialized with config: {:?}", config);
        Ok(())
    }

    pub struct LogLevelGuard {
        _guard: tracing::dispatcher::DefaultGuard,
    }

    impl LogLevelGuard {
        pub fn set_level(level: &str) -> Self {
            let filter = EnvFilter::new(level);
            let subscriber = tracing_subscriber::registry()
                .with(subscriber_fmt::layer().with_test_writer())
                .with(filter);

            LogLevelGuard {
                _guard: tracing::subscriber::set_default(subscriber),
            }
        }
    }
}
