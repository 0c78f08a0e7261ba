use clap::Parser;

use imageauto::cli::{self, Args, Command};
use imageauto::config::AppConfig;

fn load_env() {
    // Load .env file, don't override existing env vars
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Explicit `--config` must exist; the default location falls back to defaults.
fn load_config(args: &Args) -> AppConfig {
    let config = if let Some(ref path) = args.config {
        match AppConfig::load_from_explicit(path.clone()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match AppConfig::load(None) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                eprintln!("Using default settings.\n");
                AppConfig::default()
            }
        }
    };
    config.with_env()
}

#[tokio::main]
async fn main() {
    load_env();
    init_logging();

    let args = Args::parse();
    let config = load_config(&args);

    let result = match args.command {
        Some(Command::Serve { host, port }) => cli::run_serve(config, host, port).await,
        Some(Command::GenerateVideo {
            image,
            prompt,
            negative_prompt,
            duration,
            cfg_scale,
            mode,
            generator,
            no_fallback,
        }) => {
            cli::run_generate_video(
                &config,
                image,
                prompt,
                negative_prompt,
                duration,
                cfg_scale,
                mode,
                generator,
                no_fallback,
            )
            .await
        }
        Some(Command::GenerateImage {
            prompt,
            aspect_ratio,
        }) => cli::run_generate_image(&config, &prompt, &aspect_ratio).await,
        Some(Command::Generators) => cli::show_generators(&config),
        Some(Command::Config { action }) => {
            cli::handle_config_action(action, &config, args.config.as_deref())
        }
        None => {
            println!("imageauto {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Run 'imageauto serve' to start the HTTP API,");
            println!("or 'imageauto --help' for all commands.");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
