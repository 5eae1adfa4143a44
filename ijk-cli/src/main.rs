use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

/// Compiles Ijk source files to Hack/Jack-style VM assembly.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// An .ijk file, or a directory of .ijk files to compile non-recursively
    #[clap(value_parser)]
    path: PathBuf,

    /// Enable debug logging
    #[clap(short, long)]
    verbose: bool,

    /// Print the filtered token stream for each file before compiling it
    #[clap(long)]
    show_tokens: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.verbose {
        "debug"
    } else {
        "warn"
    }))
    .init();

    if cli.path.is_dir() {
        compile_directory(&cli.path, cli.show_tokens)
    } else if cli.path.is_file() {
        compile_one(&cli.path, cli.show_tokens)
    } else {
        anyhow::bail!("{}: not a file or directory", cli.path.display());
    }
}

fn compile_directory(dir: &Path, show_tokens: bool) -> anyhow::Result<()> {
    let mut compiled_any = false;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_ijk = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("ijk"))
            .unwrap_or(false);
        if !is_ijk {
            continue;
        }
        compile_one(&path, show_tokens)?;
        compiled_any = true;
    }
    if !compiled_any {
        log::warn!("no .ijk files found in {}", dir.display());
    }
    Ok(())
}

fn compile_one(path: &Path, show_tokens: bool) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;

    if show_tokens {
        let tokens = ijk_compiler::tokenize(&source)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        for token in &tokens {
            println!("{}:{} {}", token.line, token.column, token);
        }
    }

    let out_path = path.with_extension("vm");
    let mut out = Vec::new();
    ijk_compiler::compile(&source, &mut out).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    fs::write(&out_path, out)?;
    log::debug!("wrote {}", out_path.display());
    Ok(())
}
