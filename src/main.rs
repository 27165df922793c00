mod cli;
mod formatting;
mod settings;

use std::process::ExitCode;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mmd_lib::{RenderError, Renderer};
use settings::{Sink, Source};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();
    init_tracing(args.verbose, args.quiet);

    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => formatting::render_error(&err),
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("mmd=debug,mmd_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn execute(args: cli::Cli) -> Result<(), RenderError> {
    let mut config = settings::load_config(args.config.as_deref())?;
    settings::apply_overrides(&mut config, &args);

    let input = settings::resolve_input(args.input.as_deref())?;
    let (output, kind) =
        settings::resolve_output(&input, args.output.as_deref(), args.output_format)?;
    if matches!(output, Sink::Stdout) && args.output_format.is_none() {
        warn!("No output format specified, using svg. Pass `-e <format>` to choose one.");
    }

    let options = settings::render_options(&config, &args);
    options.validate()?;
    let assets = config.renderer_assets()?;
    let definition = read_input(&input).await?;

    let renderer =
        Renderer::new(config.browser.clone(), assets).with_timeout(config.render.timeout);
    info!(%kind, "generating single diagram");
    let outcome = renderer.render(&definition, kind, &options).await;
    renderer.close().await;
    let result = outcome?;

    match &output {
        Sink::Stdout => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&result.data).await?;
            stdout.flush().await?;
        }
        Sink::File(path) => {
            tokio::fs::write(path, &result.data).await?;
            info!(path = %path.display(), "wrote diagram");
        }
    }
    Ok(())
}

async fn read_input(input: &Source) -> Result<String, RenderError> {
    match input {
        Source::File(path) => Ok(tokio::fs::read_to_string(path).await?),
        Source::Stdin { warn } => {
            if *warn {
                warn!(
                    "No input file specified, reading from stdin. Use `-i <input>` to read a file, or `-i -` to silence this warning."
                );
            }
            let mut definition = String::new();
            tokio::io::stdin().read_to_string(&mut definition).await?;
            Ok(definition)
        }
    }
}
