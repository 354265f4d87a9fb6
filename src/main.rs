use clap::Parser;
use gensvm::io::{read_data, read_model, write_model, write_predictions};
use gensvm::kernel::{postprocess, Kernel};
use gensvm::model::{SvmModel, WeightPolicy};
use gensvm::predict::{predict_labels, prediction_accuracy};
use gensvm::Result;
use log::{error, info};
use std::path::PathBuf;

/// GenSVM: Generalized Multiclass Support Vector Machine
#[derive(Parser)]
#[command(name = "gensvm")]
#[command(about = "Train and apply generalized multiclass support vector machines")]
#[command(version)]
struct Cli {
    /// Training data file
    train_file: PathBuf,

    /// Optional test data file; labels are predicted after training
    test_file: Option<PathBuf>,

    /// Coefficient for the polynomial and sigmoid kernel
    #[arg(short = 'c', default_value_t = 0.0)]
    coef: f64,

    /// Degree for the polynomial kernel
    #[arg(short = 'd', default_value_t = 2)]
    degree: i32,

    /// Stopping criterion of the majorization loop
    #[arg(short = 'e', default_value_t = 1e-6)]
    epsilon: f64,

    /// Parameter for the rbf, polynomial, or sigmoid kernel
    #[arg(short = 'g', default_value_t = 1.0)]
    gamma: f64,

    /// Huber hinge parameter kappa
    #[arg(short = 'k', default_value_t = 0.0)]
    kappa: f64,

    /// Regularization parameter lambda (lambda > 0)
    #[arg(short = 'l', default_value_t = 0.00390625)]
    lambda: f64,

    /// Write the trained model to this file
    #[arg(short = 'm')]
    model_output: Option<PathBuf>,

    /// Write predictions of the test data to this file
    #[arg(short = 'o')]
    prediction_output: Option<PathBuf>,

    /// Parameter of the lp norm (1.0 <= p <= 2.0)
    #[arg(short = 'p', default_value_t = 1.0)]
    p: f64,

    /// Quiet mode (no output, not even errors)
    #[arg(short = 'q')]
    quiet: bool,

    /// Weight specification (1 = unit, 2 = group)
    #[arg(short = 'r', default_value_t = 1)]
    weights: u8,

    /// Use a previously stored model as seed for V
    #[arg(short = 's')]
    seed_model: Option<PathBuf>,

    /// Kernel type (0 = linear, 1 = poly, 2 = rbf, 3 = sigmoid)
    #[arg(short = 't', default_value_t = 0)]
    kernel_type: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        log::LevelFilter::Off
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(&cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let kernel = match cli.kernel_type {
        0 => Kernel::Linear,
        1 => Kernel::Poly {
            gamma: cli.gamma,
            coef: cli.coef,
            degree: cli.degree,
        },
        2 => Kernel::Rbf { gamma: cli.gamma },
        3 => Kernel::Sigmoid {
            gamma: cli.gamma,
            coef: cli.coef,
        },
        other => {
            return Err(gensvm::GenSvmError::parameter(
                "kernel_type",
                format!("unknown kernel type {}", other),
            ))
        }
    };

    info!("reading training data from {}", cli.train_file.display());
    let mut train_data = read_data(&cli.train_file)?;

    let mut model = SvmModel::new();
    model.p = cli.p;
    model.kappa = cli.kappa;
    model.lambda = cli.lambda;
    model.epsilon = cli.epsilon;
    model.weights = WeightPolicy::from_index(cli.weights)?;
    model.kernel = kernel;
    model.data_file = Some(cli.train_file.display().to_string());

    let seed = match &cli.seed_model {
        Some(path) => {
            info!("seeding V from {}", path.display());
            Some(read_model(path)?.v)
        }
        None => None,
    };

    let start = std::time::Instant::now();
    model.train(&mut train_data, seed.as_ref())?;
    info!("training completed in {:?}", start.elapsed());

    if let Some(path) = &cli.model_output {
        info!("writing model to {}", path.display());
        write_model(&model, path)?;
    }

    if let Some(test_file) = &cli.test_file {
        info!("reading test data from {}", test_file.display());
        let mut test_data = read_data(test_file)?;
        postprocess(kernel, &train_data, &mut test_data)?;

        let predicted = predict_labels(&test_data, &model)?;

        if let Some(y) = &test_data.y {
            let performance = prediction_accuracy(y, &predicted);
            info!("predictive performance: {:.2}%", performance);
        }

        match &cli.prediction_output {
            Some(path) => {
                write_predictions(&test_data, &predicted, path)?;
                info!("predictions written to {}", path.display());
            }
            None => {
                let line: Vec<String> = predicted.iter().map(|l| l.to_string()).collect();
                println!("{}", line.join(" "));
            }
        }
    }

    Ok(())
}
