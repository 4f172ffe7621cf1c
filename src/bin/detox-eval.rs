//! Developer utility to evaluate a saved model archive against a TSV dataset.

use std::path::PathBuf;

use detox::config::DetoxConfig;
use detox::logging;
use detox::workflow::{MODEL_DISPLAY_NAME, evaluate_archive};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    config: Option<PathBuf>,
    model_path: Option<PathBuf>,
    dataset_path: Option<PathBuf>,
    threshold: Option<f32>,
    top: usize,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init("detox-eval") {
        eprintln!("Logging disabled: {err}");
    }
    let config =
        DetoxConfig::load_or_default(options.config.as_deref()).map_err(|err| err.to_string())?;
    let model_path = options.model_path.unwrap_or(config.model.path);
    let dataset_path = options.dataset_path.unwrap_or(config.data.dataset_path);

    let report = evaluate_archive(
        &model_path,
        &dataset_path,
        &config.data.labels,
        options.threshold,
    )
    .map_err(|err| err.to_string())?;
    println!("{}", report.metrics.report(MODEL_DISPLAY_NAME));

    let mistakes = report.confident_mistakes(options.top);
    if !mistakes.is_empty() {
        println!();
        println!(
            "Top misclassified rows (threshold {:.3}):",
            report.model.threshold
        );
        for mistake in mistakes {
            println!(
                "- truth={}  p(toxic)={:.3}  {}",
                mistake.truth, mistake.probability, mistake.text
            );
        }
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut config: Option<PathBuf> = None;
    let mut model_path: Option<PathBuf> = None;
    let mut dataset_path: Option<PathBuf> = None;
    let mut threshold: Option<f32> = None;
    let mut top = 10usize;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                model_path = Some(PathBuf::from(value));
            }
            "--dataset" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                dataset_path = Some(PathBuf::from(value));
            }
            "--threshold" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--threshold requires a value".to_string())?;
                threshold = Some(
                    value
                        .parse::<f32>()
                        .map_err(|_| format!("Invalid --threshold value: {value}"))?,
                );
            }
            "--top" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--top requires a value".to_string())?;
                top = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --top value: {value}"))?;
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    Ok(CliOptions {
        config,
        model_path,
        dataset_path,
        threshold,
        top,
    })
}

fn help_text() -> String {
    [
        "detox-eval",
        "",
        "Evaluate a saved model archive against a labeled TSV file.",
        "",
        "Usage:",
        "  detox-eval [--config <file>] [--model <file.zip>] [--dataset <file.tsv>]",
        "             [--threshold <p>] [--top <n>]",
        "",
        "Options:",
        "  --config <file>   TOML config; supplies label literals and default paths",
        "  --model <file>    Model archive (default: model.path from the config)",
        "  --dataset <file>  Labeled TSV (default: data.dataset_path from the config)",
        "  --threshold <p>   Override the archived decision threshold",
        "  --top <n>         Number of misclassified rows to list (default 10)",
    ]
    .join("\n")
}
