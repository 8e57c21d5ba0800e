#![warn(clippy::unwrap_used, clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::doc_markdown
)]
use std::io::{self, BufRead, Write};

use color_eyre::eyre;
use config::Config;
use console::Console;
use store::RonStore;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unic_langid::LanguageIdentifier;

mod command;
mod config;
mod console;
mod store;

fluent_templates::static_loader! {
    static LOCALES = {
        locales: "src/locales",
        fallback_language: "en-US",
    };
}

const US_ENGLISH: LanguageIdentifier = unic_langid::langid!("en-US");

#[macro_export]
macro_rules! i18n {
    ($v:expr) => {{
        use ::fluent_templates::Loader;
        $crate::LOCALES.lookup(&$crate::US_ENGLISH, $v)
    }};
}

#[macro_export]
macro_rules! i18n_args {
    ($v:expr, $($arg:expr, $val:expr),*) => {{
	use ::fluent_templates::Loader;
	let mut args = ::std::collections::HashMap::new();
	$(
	    args.insert(::std::string::String::from($arg), ::fluent::FluentValue::from($val));
	)*
	$crate::LOCALES.lookup_with_args(&$crate::US_ENGLISH, $v, &args)
    }}
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let config = Config::load(&Config::path())?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .init();

    let store = RonStore::new(
        config.coordinates_path(),
        Some(config.legacy_coordinates_path()),
        "Kerbin",
    );
    info!(path = %store.path().display(), "using landing coordinates");
    let mut console = Console::new(&config, store)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", i18n!("title"))?;
    writeln!(stdout, "{}", i18n!("welcome"))?;
    let mut line = String::new();
    loop {
        write!(stdout, "{} ", i18n!("prompt"))?;
        stdout.flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let result = command::parse(&line).and_then(|c| console.execute(c, &mut stdout));
        match result {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                writeln!(stdout, "{}", i18n_args!("error", "message", format!("{e}")))?;
                error!("{:#}", e);
            }
        }
    }
    Ok(())
}
