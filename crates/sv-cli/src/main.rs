//! CLI frontend for the SystemVerilog source tools.

use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use sv_preprocess::{strip_comments, Replacement};

#[derive(Parser)]
#[command(name = "sv-tools")]
#[command(about = "SystemVerilog source utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove // and /* */ comments from a source file
    StripComments {
        /// Input file; use '-' for stdin
        file: PathBuf,
        /// Replacement: omitted or a space replaces comments with spaces,
        /// an empty string deletes them (keeping newlines), any other
        /// single character fills the comment contents
        replacement: Option<String>,
    },
}

fn main() {
    // clap exits with code 2 on usage errors; runtime failures exit 1.
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::StripComments { file, replacement } => {
            cmd_strip_comments(&file, replacement.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_strip_comments(
    file: &PathBuf,
    replacement: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = if file.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(file)?
    };

    let replacement = Replacement::from_arg(replacement)?;
    print!("{}", strip_comments(&source, replacement));
    Ok(())
}
