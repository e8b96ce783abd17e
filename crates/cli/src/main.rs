//! memorun CLI application

// CLI binary needs to output to stderr before tracing is up
#![allow(clippy::print_stderr)]

use memorun::cli::{self, EXIT_ENVIRONMENT, exit_code_for, render_error};
use memorun::tracing::{TracingConfig, init_tracing};

fn main() {
    // NOTE: tracing may be unusable during a panic, so write directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    let format = cli.command.format();

    if let Err(e) = init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: cli.log_filter.clone(),
    }) {
        eprintln!("{e:?}");
        std::process::exit(EXIT_ENVIRONMENT);
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(EXIT_ENVIRONMENT);
        }
    };

    let exit_code = match rt.block_on(memorun::run(cli)) {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for(&err);
            render_error(err, format);
            code
        }
    };
    drop(rt);
    std::process::exit(exit_code);
}
