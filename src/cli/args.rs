//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Image and video generation service
#[derive(Parser, Debug)]
#[command(name = "imageauto")]
#[command(version, about = "AI image and video generation with fallback across backends", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Bind address (overrides HOST and the config file)
        #[arg(long)]
        host: Option<String>,
        /// Port (overrides PORT and the config file)
        #[arg(long, short)]
        port: Option<u16>,
    },
    /// Generate a video from an image
    GenerateVideo {
        /// Input image
        image: PathBuf,
        /// Motion prompt
        prompt: String,
        #[arg(long, short = 'n', default_value = "")]
        negative_prompt: String,
        /// Length in seconds (5 or 10)
        #[arg(long, short, default_value = "5")]
        duration: u32,
        /// Prompt adherence between 0.0 and 1.0
        #[arg(long)]
        cfg_scale: Option<f32>,
        /// Quality mode: std or pro
        #[arg(long, short, default_value = "std")]
        mode: String,
        /// Backend: api, web or placeholder (default: automatic)
        #[arg(long, short)]
        generator: Option<String>,
        /// Fail instead of trying other backends
        #[arg(long)]
        no_fallback: bool,
    },
    /// Generate an image from a prompt
    GenerateImage {
        prompt: String,
        /// 9:16, 16:9, 1:1, 4:3 or 3:4
        #[arg(long, short, default_value = "9:16")]
        aspect_ratio: String,
    },
    /// Show which video generators are available
    Generators,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["imageauto"]);
        assert!(args.config.is_none());
        assert!(args.command.is_none());
    }

    #[test]
    fn test_args_config_option() {
        let args = Args::parse_from(["imageauto", "--config", "/tmp/config.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/config.toml")));

        let args = Args::parse_from(["imageauto", "generators", "-c", "/tmp/test.toml"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/test.toml")));
    }

    #[test]
    fn test_args_serve_overrides() {
        let args = Args::parse_from(["imageauto", "serve", "--host", "127.0.0.1", "-p", "8080"]);
        match args.command {
            Some(Command::Serve { host, port }) => {
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(8080));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_generate_video_defaults() {
        let args = Args::parse_from(["imageauto", "generate-video", "cat.png", "cat jumps"]);
        match args.command {
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
                assert_eq!(image, PathBuf::from("cat.png"));
                assert_eq!(prompt, "cat jumps");
                assert_eq!(negative_prompt, "");
                assert_eq!(duration, 5);
                assert!(cfg_scale.is_none());
                assert_eq!(mode, "std");
                assert!(generator.is_none());
                assert!(!no_fallback);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_generate_video_options() {
        let args = Args::parse_from([
            "imageauto",
            "generate-video",
            "cat.png",
            "cat jumps",
            "--duration",
            "10",
            "--generator",
            "placeholder",
            "--no-fallback",
        ]);
        match args.command {
            Some(Command::GenerateVideo {
                duration,
                generator,
                no_fallback,
                ..
            }) => {
                assert_eq!(duration, 10);
                assert_eq!(generator.as_deref(), Some("placeholder"));
                assert!(no_fallback);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_generate_image_aspect_ratio() {
        let args = Args::parse_from(["imageauto", "generate-image", "a fox", "-a", "16:9"]);
        match args.command {
            Some(Command::GenerateImage { prompt, aspect_ratio }) => {
                assert_eq!(prompt, "a fox");
                assert_eq!(aspect_ratio, "16:9");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_config_subcommands() {
        let args = Args::parse_from(["imageauto", "config", "show"]);
        assert!(matches!(
            args.command,
            Some(Command::Config {
                action: ConfigAction::Show
            })
        ));

        let args = Args::parse_from(["imageauto", "config", "init"]);
        assert!(matches!(
            args.command,
            Some(Command::Config {
                action: ConfigAction::Init
            })
        ));
    }

    #[test]
    fn test_args_generators_subcommand() {
        let args = Args::parse_from(["imageauto", "generators"]);
        assert!(matches!(args.command, Some(Command::Generators)));
    }
}
