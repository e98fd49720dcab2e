// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands each subcommand to its
// use case in Layer 2. This is the only layer that prints.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DistribArgs, PlotArgs, PredictArgs, TestArgs, TrainArgs};

use crate::application::{
    evaluate_use_case::{PredictUseCase, TestUseCase},
    inspect_use_case::{DistribUseCase, PlotUseCase},
    train_use_case::TrainUseCase,
};
use crate::ml::evaluator::EvalReport;

#[derive(Parser, Debug)]
#[command(
    name = "mel-classifier",
    version = "0.1.0",
    about = "Train a CNN on mel spectrograms of labelled WAV clips, then test and predict with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its handler; no computation happens here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Test(args)    => run_test(args),
            Commands::Predict(args) => run_predict(args),
            Commands::Distrib(args) => run_distrib(args),
            Commands::Plot(args)    => run_plot(args),
        }
    }
}

fn print_report(name: &str, r: &EvalReport) {
    println!(
        "{name}: Average loss: {:.4}, Accuracy: {}/{} ({:.1}%)",
        r.average_loss, r.correct, r.total, r.accuracy
    );
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!("Starting training on clips in: {}", args.data_dir);
    let checkpoint_dir = args.checkpoint_dir.clone();

    let summary = TrainUseCase::new(args.into()).execute()?;
    let h = &summary.history;

    println!(
        "Training finished after {} epochs{}. Best epoch {} (val loss {:.4}).",
        h.epochs_run(),
        if h.stopped_early { " (early stop)" } else { "" },
        h.best_epoch,
        h.best_val_loss,
    );
    if let Some(test) = &summary.test {
        print_report("Test set", test);
    }
    println!("Checkpoint saved in '{checkpoint_dir}'.");
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    let report = TestUseCase::new(args.checkpoint_dir, args.data_dir, args.cpu).execute()?;
    print_report("Test set", &report);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let p = PredictUseCase::new(args.checkpoint_dir, args.cpu).classify(&args.wav)?;
    match (&p.expected, p.is_correct()) {
        (Some(expected), Some(correct)) => println!(
            "Predicted: \"{}\", expected: \"{}\" ({})",
            p.predicted,
            expected,
            if correct { "correct" } else { "wrong" }
        ),
        _ => println!("Predicted: \"{}\"", p.predicted),
    }
    Ok(())
}

fn run_distrib(args: DistribArgs) -> Result<()> {
    let use_case = DistribUseCase {
        data_dir: args.data_dir,
        approx:   args.approx,
        seed:     args.seed,
        chart:    args.chart,
    };
    let (dist, labels) = use_case.execute()?;

    println!("{} clips, {} classes", dist.total, dist.num_classes());
    println!("{:<20} {:>8} {:>9} {:>8}", "class", "count", "percent", "weight");
    for (label, count) in &dist.counts {
        println!(
            "{:<20} {:>8} {:>8.2}% {:>8.3}",
            labels.name_of(*label).unwrap_or("?"),
            count,
            dist.percent[label],
            dist.weights[label],
        );
    }
    Ok(())
}

fn run_plot(args: PlotArgs) -> Result<()> {
    let use_case = PlotUseCase::with_checkpoint(args.wav, args.out_dir, args.checkpoint_dir.as_deref())?;
    for path in use_case.execute()? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
