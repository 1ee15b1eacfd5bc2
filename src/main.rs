use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sapling_io::DatasetReader;
use sapling_tree::{DEFAULT_PRUNING_CRITERION, DecisionTree, DecisionTreeConfig, accuracy};

#[derive(Parser)]
#[command(name = "sapling")]
#[command(about = "Fit, prune, and apply Gini decision-tree classifiers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Fit a tree on a labelled CSV (last column is the integer class)
    Fit {
        /// Path to the training CSV file
        #[arg(long)]
        data: PathBuf,

        /// Collapse splits whose sample-weighted impurity gain is below this value
        #[arg(long, default_value_t = DEFAULT_PRUNING_CRITERION)]
        criterion: f64,

        /// Skip pruning entirely
        #[arg(long, default_value_t = false)]
        no_prune: bool,

        /// Score features in parallel during split search
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Where to save the fitted model
        #[arg(long)]
        model: Option<PathBuf>,

        /// Print the fitted tree to stderr
        #[arg(long, default_value_t = false)]
        render: bool,
    },

    /// Predict classes for an unlabelled CSV with a saved model
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the CSV file of feature rows
        #[arg(long)]
        data: PathBuf,
    },

    /// Print a saved model as an indented tree
    Render {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct FitOutput {
    n_samples: usize,
    n_features: usize,
    n_classes: usize,
    pruning_criterion: Option<f64>,
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
    training_accuracy: f64,
    model: Option<PathBuf>,
}

#[derive(Serialize)]
struct PredictOutput {
    n_samples: usize,
    predictions: Vec<i64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Fit {
            data,
            criterion,
            no_prune,
            parallel,
            model,
            render,
        } => {
            let dataset = DatasetReader::new(&data)
                .read_labeled()
                .context("failed to read training CSV")?;

            let config = DecisionTreeConfig::new()
                .with_pruning_criterion(criterion)
                .with_parallel_split_search(parallel);
            let tree = if no_prune {
                config.fit_unpruned(dataset.features(), dataset.labels())
            } else {
                config.fit(dataset.features(), dataset.labels())
            }
            .context("fitting failed")?;
            info!(n_nodes = tree.n_nodes(), depth = tree.depth(), "tree fitted");

            if render {
                eprint!("{tree}");
            }

            if let Some(path) = &model {
                tree.save(path)
                    .with_context(|| format!("failed to save model to {}", path.display()))?;
            }

            let predicted = tree.predict_batch(dataset.features())?;
            let output = FitOutput {
                n_samples: dataset.n_samples(),
                n_features: dataset.n_features(),
                n_classes: tree.classes().len(),
                pruning_criterion: tree.pruning_criterion(),
                n_nodes: tree.n_nodes(),
                n_leaves: tree.n_leaves(),
                depth: tree.depth(),
                training_accuracy: accuracy(&predicted, dataset.labels()),
                model,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict { model, data } => {
            let tree: DecisionTree<i64> = DecisionTree::load(&model)
                .with_context(|| format!("failed to load model from {}", model.display()))?;

            let dataset = DatasetReader::new(&data)
                .read_unlabeled()
                .context("failed to read prediction CSV")?;

            let predictions = tree
                .predict_batch(dataset.features())
                .context("prediction failed")?;
            info!(n_samples = predictions.len(), "predictions complete");

            let output = PredictOutput {
                n_samples: predictions.len(),
                predictions,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Render { model } => {
            let tree: DecisionTree<i64> = DecisionTree::load(&model)
                .with_context(|| format!("failed to load model from {}", model.display()))?;
            print!("{tree}");
        }
    }

    Ok(())
}
