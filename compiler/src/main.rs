// External Modules
extern crate exitcode;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser;
use rusco::{compile, Target};
use rusco_common::error::Formatted;
use tracing_subscriber::EnvFilter;

/// Command line interface for the compiler driver.
#[derive(Parser)]
#[clap(name = "rusco")]
enum Cli {
    /// Parse, analyze, generate and write the assembler text file.
    Compile {
        #[clap(parse(from_os_str))]
        source: PathBuf,

        #[clap(long, arg_enum, default_value = "cil")]
        target: TargetArg,

        #[clap(short, long, parse(from_os_str))]
        output: Option<PathBuf>,

        #[clap(short, long, parse(from_occurrences))]
        verbose: u8,
    },

    /// Compile, assemble and run, echoing the runtime's stdout.
    Run {
        #[clap(parse(from_os_str))]
        source: PathBuf,

        #[clap(long, arg_enum, default_value = "cil")]
        target: TargetArg,

        /// Keep the intermediate working directory instead of deleting it.
        #[clap(long, action)]
        keep: bool,

        #[clap(short, long, parse(from_occurrences))]
        verbose: u8,
    },

    /// Parse and analyze only; report success or failure.
    Check {
        #[clap(parse(from_os_str))]
        source: PathBuf,

        #[clap(short, long, parse(from_occurrences))]
        verbose: u8,
    },
}

#[derive(Clone, Copy, clap::ArgEnum)]
enum TargetArg {
    Cil,
    Jvm,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Cil => Target::Cil,
            TargetArg::Jvm => Target::Jvm,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn module_name(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Program".to_string())
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    Ok(fs::read_to_string(path)?)
}

fn run_compile(source: &Path, target: Target, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let text = read_source(source)?;
    tracing::debug!(path = %source.display(), "parsing");
    let name = module_name(source);
    let code = match compile(&text, target, &name) {
        Ok(code) => code,
        Err(err) => {
            println!("{}", Formatted(&err));
            std::process::exit(exitcode::DATAERR);
        }
    };

    let dest = output.unwrap_or_else(|| source.with_extension(target.file_extension()));
    fs::write(&dest, code)?;
    Ok(dest)
}

fn run_assembler(target: Target, asm_path: &Path) -> anyhow::Result<PathBuf> {
    match target {
        Target::Cil => {
            let exe_path = asm_path.with_extension("exe");
            tracing::info!(cmd = "ilasm", output = %exe_path.display(), "invoking assembler");
            let status = Command::new("ilasm")
                .arg(format!("/output:{}", exe_path.display()))
                .arg(asm_path)
                .status()?;
            anyhow::ensure!(status.success(), "ilasm exited with {status}");
            Ok(exe_path)
        }
        Target::Jvm => {
            tracing::info!(cmd = "jasmin", file = %asm_path.display(), "invoking assembler");
            let status = Command::new("java")
                .arg("-jar")
                .arg("jasmin.jar")
                .arg(asm_path)
                .current_dir(asm_path.parent().unwrap_or_else(|| Path::new(".")))
                .status()?;
            anyhow::ensure!(status.success(), "jasmin exited with {status}");
            Ok(asm_path.with_extension("class"))
        }
    }
}

fn run_runtime(target: Target, class_name: &str, artifact: &Path) -> anyhow::Result<String> {
    let output = match target {
        Target::Cil => Command::new("mono").arg(artifact).output()?,
        Target::Jvm => Command::new("java")
            .arg("-cp")
            .arg(artifact.parent().unwrap_or_else(|| Path::new(".")))
            .arg(class_name)
            .output()?,
    };
    anyhow::ensure!(output.status.success(), "runtime exited with {}", output.status);
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn main() -> anyhow::Result<()> {
    match Cli::parse() {
        Cli::Compile {
            source,
            target,
            output,
            verbose,
        } => {
            init_logging(verbose);
            let dest = run_compile(&source, target.into(), output)?;
            println!("Compile success! -> {}", dest.display());
            std::process::exit(exitcode::OK);
        }

        Cli::Run {
            source,
            target,
            keep,
            verbose,
        } => {
            init_logging(verbose);
            let target: Target = target.into();
            let work_dir = std::env::temp_dir().join(format!("rusco-{}", std::process::id()));
            fs::create_dir_all(&work_dir)?;
            let asm_path = work_dir.join(format!("{}.{}", module_name(&source), target.file_extension()));

            let dest = run_compile(&source, target, Some(asm_path))?;
            let artifact = run_assembler(target, &dest)?;
            let stdout = run_runtime(target, &module_name(&source), &artifact)?;
            print!("{stdout}");

            if !keep {
                let _ = fs::remove_dir_all(&work_dir);
            }
            std::process::exit(exitcode::OK);
        }

        Cli::Check { source, verbose } => {
            init_logging(verbose);
            let text = read_source(&source)?;
            match compile(&text, Target::Cil, &module_name(&source)) {
                Ok(_) => std::process::exit(exitcode::OK),
                Err(err) => {
                    println!("{}", Formatted(&err));
                    std::process::exit(exitcode::DATAERR);
                }
            }
        }
    }
}
