#[cfg(test)]
mod tests {
    use crate::cli::{Args, Command};
    use crate::config::LLMProvider;
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_file(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("investigator.toml");
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_investigate_defaults() {
        let args = Args::try_parse_from(["lead-investigator", "investigate", "--leads", "leads.jsonl"])
            .unwrap();

        assert!(!args.verbose);
        assert!(!args.no_cache);
        assert_eq!(args.config, None);
        assert_eq!(
            args.command,
            Command::Investigate {
                leads: PathBuf::from("leads.jsonl"),
                output: None,
                min_score: None,
                limit: None,
            }
        );
    }

    #[test]
    fn test_rerun_default_threshold() {
        let args = Args::try_parse_from([
            "lead-investigator",
            "rerun",
            "-l",
            "leads.jsonl",
            "-r",
            "results.jsonl",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Command::Rerun {
                leads: PathBuf::from("leads.jsonl"),
                results: PathBuf::from("results.jsonl"),
                below: 50,
            }
        );
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Args::try_parse_from(["lead-investigator"]).is_err());
        assert!(Args::try_parse_from(["lead-investigator", "investigate"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "lead-investigator",
            "investigate",
            "--leads",
            "l.jsonl",
            "--verbose",
            "--llm-provider",
            "openai",
            "--workers",
            "8",
        ])
        .unwrap();

        assert!(args.verbose);
        assert_eq!(args.llm_provider, Some("openai".to_string()));
        assert_eq!(args.workers, Some(8));
    }

    #[test]
    fn test_into_config_applies_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = config_file(
            &temp_dir,
            "[search]\nworkers = 2\n\n[run]\nmax_concurrent_investigations = 1\n",
        );

        let args = Args::try_parse_from([
            "lead-investigator",
            "--config",
            config_path.as_str(),
            "investigate",
            "--leads",
            "l.jsonl",
            "--output",
            "out/results.jsonl",
            "--min-score",
            "60",
            "--llm-provider",
            "deepseek",
            "--model",
            "deepseek-chat",
            "--max-concurrent",
            "3",
            "--database",
            "db/fraud.db",
            "--no-cache",
        ])
        .unwrap();

        let (config, command) = args.into_config().unwrap();

        assert!(matches!(command, Command::Investigate { .. }));
        assert_eq!(config.search.workers, 2);
        assert_eq!(config.run.max_concurrent_investigations, 3);
        assert_eq!(config.run.output_path, PathBuf::from("out/results.jsonl"));
        assert_eq!(config.run.min_heuristic_score, Some(60.0));
        assert_eq!(config.llm.provider, LLMProvider::DeepSeek);
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.store.database_path, PathBuf::from("db/fraud.db"));
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_rerun_appends_to_results_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = config_file(&temp_dir, "");

        let args = Args::try_parse_from([
            "lead-investigator",
            "-c",
            config_path.as_str(),
            "rerun",
            "--leads",
            "l.jsonl",
            "--results",
            "data/previous.jsonl",
            "--below",
            "40",
        ])
        .unwrap();

        let (config, command) = args.into_config().unwrap();

        assert_eq!(config.run.output_path, PathBuf::from("data/previous.jsonl"));
        assert!(matches!(command, Command::Rerun { below: 40, .. }));
    }

    #[test]
    fn test_unknown_provider_keeps_configured_one() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = config_file(&temp_dir, "[llm]\nprovider = \"ollama\"\n");

        let args = Args::try_parse_from([
            "lead-investigator",
            "--config",
            config_path.as_str(),
            "--llm-provider",
            "mystery",
            "investigate",
            "--leads",
            "l.jsonl",
        ])
        .unwrap();

        let (config, _) = args.into_config().unwrap();
        assert_eq!(config.llm.provider, LLMProvider::Ollama);
    }

    #[test]
    fn test_verbose_from_config_file_survives_without_flag() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = config_file(&temp_dir, "verbose = true\n");

        let args = Args::try_parse_from([
            "lead-investigator",
            "--config",
            config_path.as_str(),
            "investigate",
            "--leads",
            "l.jsonl",
        ])
        .unwrap();
        assert!(!args.verbose);

        let (config, _) = args.into_config().unwrap();
        assert!(config.verbose);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_into_config_fails_on_missing_file() {
        let args = Args::try_parse_from([
            "lead-investigator",
            "--config",
            "/nonexistent/investigator.toml",
            "investigate",
            "--leads",
            "l.jsonl",
        ])
        .unwrap();

        assert!(args.into_config().is_err());
    }
}
