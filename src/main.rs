use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_hunks::Repository;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "GIT_HUNKS_LOG";

#[derive(Parser)]
#[command(name = "git-hunks")]
#[command(about = "Stage and discard individual changed lines in a git working tree")]
#[command(version)]
struct Cli {
    /// Run as if git was started in this directory
    #[arg(short = 'C', global = true, default_value = ".", value_name = "PATH")]
    repo: String,

    /// Log the git commands being run
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show changed lines with the numbers used by `stage` and `discard`
    Diff {
        /// Files to show (all changed files when omitted)
        files: Vec<String>,
    },
    /// Stage specific lines by reference (e.g., file.nix:10..15,-20)
    Stage {
        /// File and line references (e.g., "flake.nix:137" or "flake.nix:10..15")
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Drop specific lines from the working tree by reference
    Discard {
        /// File and line references (e.g., "flake.nix:-20" or "flake.nix:4,5")
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Print a shell completion script
    Completions {
        shell: Shell,
    },
    /// Print the man page
    Man,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let repo = Repository::new(&cli.repo);

    match cli.command {
        Commands::Diff { files } => {
            let output = repo.format_diff(&files)?;
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Commands::Stage { file_refs } => {
            for file_ref in &file_refs {
                repo.stage(file_ref)?;
            }
        }
        Commands::Discard { file_refs } => {
            for file_ref in &file_refs {
                repo.discard(file_ref)?;
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "git-hunks", &mut std::io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut std::io::stdout())?;
        }
    }

    Ok(())
}
