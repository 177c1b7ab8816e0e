#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use hrscore::classifier::{NamedModel, SharedClassifier};
use hrscore::config::EvaluationConfig;
use hrscore::data::{DEFAULT_LABEL_COLUMN, load_score_table};
use hrscore::report::EvaluationReport;
use hrscore::sequential::SequentialClassifier;

#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to a TSV file with an outcome column and one probability column per model
    #[arg(value_name = "SCORES_TSV")]
    pub scores: PathBuf,

    /// TOML file with evaluation settings; command-line flags override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving the report files
    #[arg(long, value_name = "DIR", default_value = "evaluation")]
    pub out_dir: PathBuf,

    /// Name of the binary outcome column
    #[arg(long, default_value = DEFAULT_LABEL_COLUMN)]
    pub label_column: String,

    /// Number of bootstrap resamples for every confidence interval
    #[arg(long, value_name = "N")]
    pub n_bootstraps: Option<usize>,

    /// Confidence level for AUROC and average-precision intervals
    #[arg(long, value_name = "LEVEL")]
    pub ci_level: Option<f64>,

    /// Seed for bootstrap resampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Base-model probability at or above which --sequential routes to the high-risk column
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Add a sequential model that rescores high-risk rows of BASE with HR
    #[arg(long, num_args = 2, value_names = ["BASE", "HR"])]
    pub sequential: Option<Vec<String>>,

    /// Report unrounded NRI tables
    #[arg(long)]
    pub no_round: bool,
}

#[derive(Parser)]
#[command(
    name = "hrscore",
    about = "Evaluation toolkit for clinical risk scores",
    long_about = "Compares probabilistic risk models on a shared cohort: discrimination with \
                 bootstrap intervals, calibration, observed/predicted ratios and net \
                 reclassification improvement."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every score column of a cohort file
    #[command(about = "Evaluate and compare risk scores (outputs: TSV tables and summary.json)")]
    Evaluate(EvaluateArgs),

    /// Print the default evaluation settings as TOML
    #[command(about = "Print the default configuration file")]
    Config,

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn resolve_config(args: &EvaluateArgs) -> Result<EvaluationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EvaluationConfig::load(path)?,
        None => EvaluationConfig::default(),
    };
    if let Some(n) = args.n_bootstraps {
        config.bootstrap.n_bootstraps = n;
    }
    if let Some(level) = args.ci_level {
        config.bootstrap.ci_level = level;
    }
    if let Some(seed) = args.seed {
        config.bootstrap.seed = seed;
    }
    if let Some(cutoff) = args.cutoff {
        config.cutoff = cutoff;
    }
    if args.no_round {
        config.round_nri = false;
    }
    config.validate()?;
    Ok(config)
}

pub fn evaluate(args: EvaluateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    let table = load_score_table(&args.scores, &args.label_column)?;
    let mut models = table.models();

    if let Some(pair) = &args.sequential {
        let [base_name, hr_name] = pair.as_slice() else {
            return Err("--sequential takes exactly two column names".into());
        };
        let lookup = |name: &str| {
            table
                .model(name)
                .ok_or_else(|| format!("--sequential names unknown score column '{name}'"))
        };
        let sequential: SharedClassifier = Arc::new(SequentialClassifier::new(
            lookup(base_name.as_str())?,
            lookup(hr_name.as_str())?,
            config.cutoff,
        )?);
        let name = format!("{base_name} -> {hr_name}");
        log::info!(
            "Added sequential model '{}' with cutoff {}",
            name,
            config.cutoff
        );
        models.push(NamedModel::new(name, sequential));
    }

    let x = table.placeholder_features();
    let report = EvaluationReport::compute(&models, x.view(), table.labels.view(), &config)?;

    for summary in &report.roc {
        println!("{}", summary.legend_label().replace('\n', " "));
    }
    for summary in &report.pr {
        println!("{}", summary.legend_label().replace('\n', " "));
    }

    let written = report.write_all(&args.out_dir)?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Evaluate(args)) => evaluate(args),
        Some(Commands::Config) => EvaluationConfig::default()
            .to_toml_string()
            .map(|text| print!("{text}"))
            .map_err(Into::into),
        Some(Commands::Version) => {
            println!("hrscore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
