use std::fs::File;
use std::path::PathBuf;

use tracing::{error, info};

use physarum::{trainer, Field, FsStore, Trainer, TrainerConfig};

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let mut dir: Option<PathBuf> = None;
    let mut command: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return;
            }
            "--dir" => {
                if i + 1 >= args.len() {
                    eprintln!("--dir needs a path");
                    std::process::exit(2);
                }
                dir = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            cmd if command.is_none() => {
                command = Some(cmd.to_string());
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                std::process::exit(2);
            }
        }
    }

    let result = match command.as_deref() {
        None => run(dir, true, true),
        Some("sweep") => run(dir, true, false),
        Some("eval") => run(dir, false, true),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        error!("run failed: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("physarum - slime-mold growth with a tabular Q-learning policy");
    println!();
    println!("Usage: physarum [--dir DIR] [sweep|eval]");
    println!();
    println!("  (no command)   train the demo dish, then evaluate");
    println!("  sweep          train every missing (seed, bias) combination");
    println!("  eval           replay persisted tables, write stats.csv");
    println!("  --dir DIR      artifact directory (default: platform data dir)");
}

/// Demo dish: a fully walled border around an open interior.
fn bordered_layout(w: usize, h: usize) -> Vec<Vec<bool>> {
    (0..h)
        .map(|y| {
            (0..w)
                .map(|x| x == 0 || y == 0 || x == w - 1 || y == h - 1)
                .collect()
        })
        .collect()
}

fn run(dir: Option<PathBuf>, sweep: bool, eval: bool) -> physarum::Result<()> {
    let mut store = match dir {
        Some(dir) => FsStore::open(dir)?,
        None => FsStore::open_default()?,
    };
    info!("artifact directory: {:?}", store.dir());

    let mut field = Field::from_walls(&bordered_layout(9, 9))?;
    let total = field.generate(3.0);
    info!(
        goal_cells = field.goal().len(),
        total_mass = total,
        "field generated"
    );

    let mut runner = Trainer::new(field, TrainerConfig::default());

    if sweep {
        let seeds = [(2, 2), (4, 4), (6, 6)];
        let biases = [0.3, 0.6, 0.9];
        let stats = runner.sweep(&mut store, &seeds, &biases)?;
        info!(
            trained = stats.trained,
            skipped = stats.skipped,
            failed = stats.failed,
            episodes = stats.episodes,
            "sweep finished"
        );
    }

    if eval {
        let rows = runner.evaluate(&store)?;
        let path = store.dir().join("stats.csv");
        let file = File::create(&path).map_err(|e| physarum::Error::Storage {
            path: path.clone(),
            source: e,
        })?;
        trainer::write_csv(&rows, file).map_err(|e| physarum::Error::Storage {
            path: path.clone(),
            source: e,
        })?;
        info!(rows = rows.len(), "wrote {:?}", path);
    }

    Ok(())
}
