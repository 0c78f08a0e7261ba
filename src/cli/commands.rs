//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::args::ConfigAction;
use crate::config::{default_path as get_config_path, AppConfig};
use crate::generator::{AspectRatio, GenerationResult, GenerationSuccess};
use crate::server;
use crate::service::{MediaService, VideoParams, VideoSettings};

fn build_service(config: &AppConfig) -> Result<MediaService, String> {
    MediaService::from_config(config).map_err(|e| e.to_string())
}

/// Start the HTTP API and block until shutdown.
pub async fn run_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), String> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let service = build_service(&config)?;
    let listener = server::bind(&config.server.host, config.server.port)
        .await
        .map_err(|e| {
            format!(
                "Failed to bind {}:{}: {}",
                config.server.host, config.server.port, e
            )
        })?;
    server::serve(listener, Arc::new(service))
        .await
        .map_err(|e| format!("Server error: {}", e))
}

#[allow(clippy::too_many_arguments)]
pub async fn run_generate_video(
    config: &AppConfig,
    image: PathBuf,
    prompt: String,
    negative_prompt: String,
    duration: u32,
    cfg_scale: Option<f32>,
    mode: String,
    generator: Option<String>,
    no_fallback: bool,
) -> Result<(), String> {
    let service = build_service(config)?;
    let params = VideoParams {
        image_path: image,
        prompt,
        settings: VideoSettings {
            negative_prompt,
            duration: Some(duration),
            cfg_scale,
            mode: Some(mode),
            output_count: None,
            generator,
            fallback: Some(!no_fallback),
        },
    };

    println!("Generating video...");
    let result = service
        .generate_video(params)
        .await
        .map_err(|e| format!("Invalid request: {}", e))?;
    report(result)
}

pub async fn run_generate_image(
    config: &AppConfig,
    prompt: &str,
    aspect_ratio: &str,
) -> Result<(), String> {
    let aspect_ratio: AspectRatio = aspect_ratio.parse()?;
    let service = build_service(config)?;

    println!("Generating image with {}...", service.image_backend());
    report(service.generate_image(prompt, aspect_ratio).await)
}

/// Print the generator status report.
pub fn show_generators(config: &AppConfig) -> Result<(), String> {
    let service = build_service(config)?;
    let report = service.generators();

    println!("Video generators ({} available):", report.available_generators);
    for info in &report.generators {
        let marker = if Some(info.kind) == report.default_generator {
            " (default)"
        } else {
            ""
        };
        println!("  {:<12} {}{}", info.kind, info.name, marker);
    }
    println!();
    println!("Image generator: {}", service.image_backend());
    Ok(())
}

fn report(result: GenerationResult) -> Result<(), String> {
    match result {
        GenerationResult::Success(success) => {
            print_success(&success);
            Ok(())
        }
        GenerationResult::Failure(failure) => {
            for previous in &failure.previous_errors {
                eprintln!("  {} failed: {}", previous.generator, previous.error);
            }
            Err(failure.error)
        }
    }
}

fn print_success(success: &GenerationSuccess) {
    let result = GenerationResult::Success(success.clone());
    if let Some(artifact) = result.artifact_ref() {
        println!(
            "Saved: {} ({} bytes)",
            artifact.path.display(),
            artifact.size_bytes
        );
    } else {
        println!("Browser is ready; finish the submission manually.");
    }
    if let Some(provenance) = &success.provenance {
        print!(
            "Generator: {} after {} attempt(s)",
            provenance.generator_name, provenance.attempts
        );
        match provenance.fallback_from {
            Some(from) => println!(", fell back from {}", from),
            None => println!(),
        }
    }
    if let Some(note) = &success.note {
        println!("Note: {}", note);
    }
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &AppConfig,
    explicit_path: Option<&Path>,
) -> Result<(), String> {
    let config_path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!();
            let rendered = config.to_toml_string().map_err(|e| e.to_string())?;
            println!("{}", rendered.trim_end());
            println!();
            println!("{:?}", config.credentials);
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'imageauto config show' to view current settings.",
                    config_path.display()
                ));
            }

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Error creating config directory: {}", e))?;
            }

            let rendered = AppConfig::default()
                .to_toml_string()
                .map_err(|e| e.to_string())?;
            let content = format!(
                "# imageauto configuration\n# Credentials are read from the environment or .env only.\n\n{}",
                rendered
            );
            std::fs::write(&config_path, content)
                .map_err(|e| format!("Error writing config file: {}", e))?;

            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_init_writes_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        handle_config_action(ConfigAction::Init, &AppConfig::default(), Some(&path)).unwrap();
        let loaded = AppConfig::load_from_explicit(path.clone()).unwrap();
        assert_eq!(loaded.server.port, AppConfig::default().server.port);

        let again = handle_config_action(ConfigAction::Init, &AppConfig::default(), Some(&path));
        assert!(again.unwrap_err().contains("already exists"));
    }

    #[test]
    fn test_report_failure_returns_last_error() {
        let err = report(GenerationResult::failure("all backends down")).unwrap_err();
        assert_eq!(err, "all backends down");
    }
}
