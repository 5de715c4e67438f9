use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ani-tracker",
    version,
    about = "Watch mpv playback and sync episode progress to AniList"
)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Directory holding config.toml and credentials.toml
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Get a new access token
    GetToken,

    /// Monitor mpv and update AniList once the episode is watched
    Run {
        /// Show title, e.g. "Attack on Titan (2013)"
        title: String,
        /// Episode number being watched
        episode: u32,
    },

    /// Update AniList right away, without waiting for mpv
    Update {
        title: String,
        episode: u32,
    },

    /// Close the mpv connection
    Kill,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::error::ErrorKind;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from(["ani-tracker", "run", "Frieren (2023)", "12"]).unwrap();
        match args.cmd {
            Command::Run { title, episode } => {
                assert_eq!(title, "Frieren (2023)");
                assert_eq!(episode, 12);
            }
            other => panic!("Expected Run, got {other:?}"),
        }
        assert!(args.config_dir.is_none());
    }

    #[test]
    fn test_config_dir_after_subcommand() {
        let args =
            Args::try_parse_from(["ani-tracker", "kill", "--config-dir", "/tmp/ani"]).unwrap();
        assert!(matches!(args.cmd, Command::Kill));
        assert_eq!(args.config_dir, Some(PathBuf::from("/tmp/ani")));
    }

    #[test]
    fn test_missing_arguments_are_errors() {
        let err = Args::try_parse_from(["ani-tracker"]).unwrap_err();
        assert!(err.use_stderr());

        let err = Args::try_parse_from(["ani-tracker", "run", "Frieren"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Args::try_parse_from(["ani-tracker", "run", "Frieren", "twelve"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = Args::try_parse_from(["ani-tracker", "help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }
}
