//! Train a toxicity classifier, report test metrics, save it, reload it and
//! classify lines typed on stdin.

use std::io;
use std::path::PathBuf;

use detox::config::DetoxConfig;
use detox::console::{install_interrupt_handler, run_console};
use detox::logging;
use detox::workflow::{self, MODEL_DISPLAY_NAME};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    dataset: Option<PathBuf>,
    model: Option<PathBuf>,
    test_fraction: Option<f64>,
    seed: Option<u64>,
    threshold: Option<f32>,
    skip_training: bool,
    print_config: bool,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init("detox") {
        eprintln!("Logging disabled: {err}");
    }

    let mut config =
        DetoxConfig::load_or_default(options.config.as_deref()).map_err(|err| err.to_string())?;
    apply_overrides(&mut config, &options);
    config.validate().map_err(|err| err.to_string())?;
    if options.print_config {
        print!("{}", config.to_toml().map_err(|err| err.to_string())?);
        return Ok(());
    }

    if options.skip_training {
        tracing::info!("Skipping training; using {}", config.model.path.display());
    } else {
        let report = workflow::train_evaluate_save(&config).map_err(|err| err.to_string())?;
        println!(
            "Trained on {} rows, evaluated on {} rows",
            report.train_rows, report.test_rows
        );
        println!("{}", report.metrics.report(MODEL_DISPLAY_NAME));
        println!("The model is saved to {}", report.model_path.display());
    }

    let predictor = workflow::reload(&config.model.path, Some(config.model.threshold))
        .map_err(|err| err.to_string())?;
    if let Err(err) = install_interrupt_handler() {
        tracing::warn!("Ctrl-C handler not installed: {err}");
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    let served = run_console(&predictor, stdin.lock(), &mut stdout.lock())
        .map_err(|err| format!("Console I/O failed: {err}"))?;
    tracing::info!("Input closed after {served} predictions");
    Ok(())
}

fn apply_overrides(config: &mut DetoxConfig, options: &CliOptions) {
    if let Some(path) = &options.dataset {
        config.data.dataset_path = path.clone();
    }
    if let Some(path) = &options.model {
        config.model.path = path.clone();
    }
    if let Some(fraction) = options.test_fraction {
        config.data.test_fraction = fraction;
    }
    if let Some(seed) = options.seed {
        config.data.seed = seed;
    }
    if let Some(threshold) = options.threshold {
        config.model.threshold = threshold;
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--dataset" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                options.dataset = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                options.model = Some(PathBuf::from(value));
            }
            "--test-fraction" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--test-fraction requires a value".to_string())?;
                options.test_fraction = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --test-fraction value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--threshold" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--threshold requires a value".to_string())?;
                options.threshold = Some(
                    value
                        .parse::<f32>()
                        .map_err(|_| format!("Invalid --threshold value: {value}"))?,
                );
            }
            "--skip-training" => options.skip_training = true,
            "--print-config" => options.print_config = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "detox",
        "",
        "Train, evaluate and save a toxicity classifier, then classify stdin lines.",
        "",
        "Usage:",
        "  detox [--config <file>] [--dataset <file.tsv>] [--model <file.zip>]",
        "        [--test-fraction <f>] [--seed <n>] [--threshold <p>] [--skip-training]",
        "        [--print-config]",
        "",
        "Options:",
        "  --config <file>       TOML config (default: detox.toml in the app directory)",
        "  --dataset <file>      Tab-separated training data with a header row",
        "  --model <file>        Model archive to write and reload",
        "  --test-fraction <f>   Share of rows held out for evaluation (default 0.2)",
        "  --seed <n>            Split seed (default 1)",
        "  --threshold <p>       Probability above which a text is toxic (default 0.5)",
        "  --skip-training       Load the existing model archive and go straight to input",
        "  --print-config        Print the effective configuration as TOML and exit",
        "  -h, --help            Show this help",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn parses_overrides() {
        let options = parse_args(args(&[
            "--dataset",
            "train.tsv",
            "--seed",
            "7",
            "--threshold",
            "0.7",
            "--skip-training",
        ]))
        .unwrap();
        assert_eq!(options.dataset, Some(PathBuf::from("train.tsv")));
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.threshold, Some(0.7));
        assert!(options.skip_training);
        assert!(!options.print_config);

        let mut config = DetoxConfig::default();
        apply_overrides(&mut config, &options);
        assert_eq!(config.data.dataset_path, PathBuf::from("train.tsv"));
        assert_eq!(config.data.seed, 7);
        assert_eq!(config.model.threshold, 0.7);
    }

    #[test]
    fn print_config_flag_is_parsed() {
        let options = parse_args(args(&["--print-config", "--threshold", "0.9"])).unwrap();
        assert!(options.print_config);
        let mut config = DetoxConfig::default();
        apply_overrides(&mut config, &options);
        let text = config.to_toml().unwrap();
        let parsed: DetoxConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.model.threshold, 0.9);
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        assert!(parse_args(args(&["--model"])).is_err());
        assert!(parse_args(args(&["--seed", "abc"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }
}
