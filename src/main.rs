use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use redsift::{
    check_archives, expand_inputs, init_tracing_once, FilterConfig, IntegrityMode, Mode, Pipeline, QuotePolicy,
    DEFAULT_WINDOW_LIMIT,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "redsift", version, about = "Keyword filter and submission/comment join over zstd NDJSON dumps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep every submission or comment whose title/text contains a term.
    Filter {
        #[command(flatten)]
        common: CommonArgs,
        /// Archives (or directories of *.zst), scanned in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Collect matching submission ids, then keep comments under them.
    Join {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long, required = true, num_args = 1..)]
        submissions: Vec<PathBuf>,
        #[arg(long, required = true, num_args = 1..)]
        comments: Vec<PathBuf>,
        /// Newline-delimited id artifact written after the submissions pass.
        #[arg(long, default_value = "submission_ids.txt")]
        ids_out: PathBuf,
    },
    /// Run only the comments pass against an existing id artifact.
    Resolve {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        ids: PathBuf,
        #[arg(required = true)]
        comments: Vec<PathBuf>,
    },
    /// Validate archives before a long scan.
    Check {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Decode every archive to EOF instead of sampling the head.
        #[arg(long)]
        full: bool,
        #[arg(long, default_value_t = 64 * 1024 * 1024)]
        sample_bytes: u64,
        #[arg(long, default_value_t = DEFAULT_WINDOW_LIMIT)]
        window_limit: u64,
        #[arg(long, default_value_t = 2)]
        file_concurrency: usize,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Output CSV.
    #[arg(short, long)]
    out: PathBuf,
    /// Search term (repeatable); matched case-insensitively as a substring.
    #[arg(short, long = "term")]
    terms: Vec<String>,
    /// Newline-delimited file of additional terms.
    #[arg(long)]
    terms_file: Option<PathBuf>,
    /// Truncate text to this many chars (plus "...").
    #[arg(long)]
    max_text_len: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_WINDOW_LIMIT)]
    window_limit: u64,
    #[arg(long, value_enum, default_value_t = Quoting::All)]
    quote: Quoting,
    /// Worker threads for parse/filter; 1 keeps everything on one thread.
    #[arg(long, default_value_t = 1)]
    threads: usize,
    #[arg(long)]
    no_progress: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Quoting {
    All,
    Minimal,
}

impl CommonArgs {
    fn config(&self, mode: Mode) -> Result<FilterConfig> {
        let mut cfg = FilterConfig::new(&self.terms)
            .with_env_terms()
            .with_mode(mode)
            .with_max_text_len(self.max_text_len)
            .with_window_limit(self.window_limit)
            .with_quote_policy(match self.quote {
                Quoting::All => QuotePolicy::All,
                Quoting::Minimal => QuotePolicy::Minimal,
            })
            .with_worker_threads(self.threads)
            .with_progress(!self.no_progress);
        if let Some(f) = &self.terms_file {
            cfg = cfg.with_terms_file(f)?;
        }
        Ok(cfg)
    }
}

fn require_terms(cfg: &FilterConfig) -> Result<()> {
    if cfg.terms.is_empty() {
        bail!("no search terms given (use --term, --terms-file or REDSIFT_TERMS)");
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();

    match cli.command {
        Command::Filter { common, inputs } => {
            let cfg = common.config(Mode::StandaloneFilter)?;
            require_terms(&cfg)?;
            let inputs = expand_inputs(&inputs);
            let stats = Pipeline::new(cfg).run_filter(&inputs, &common.out)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Join { common, submissions, comments, ids_out } => {
            let cfg = common.config(Mode::TwoPassJoin)?;
            require_terms(&cfg)?;
            let submissions = expand_inputs(&submissions);
            let comments = expand_inputs(&comments);
            let report = Pipeline::new(cfg).run_join(&submissions, &comments, Some(&ids_out), &common.out)?;
            println!("submission ids: {}", report.ids);
            println!("{}", serde_json::to_string_pretty(&report.collect)?);
            println!("{}", serde_json::to_string_pretty(&report.resolve)?);
        }
        Command::Resolve { common, ids, comments } => {
            let cfg = common.config(Mode::TwoPassJoin)?;
            let comments = expand_inputs(&comments);
            let stats = Pipeline::new(cfg).resolve_from_artifact(&ids, &comments, &common.out)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Check { inputs, full, sample_bytes, window_limit, file_concurrency } => {
            let inputs = expand_inputs(&inputs);
            let mode = if full { IntegrityMode::Full } else { IntegrityMode::Quick { sample_bytes } };
            let bad = check_archives(&inputs, mode, window_limit, file_concurrency, true);
            for (p, e) in &bad {
                eprintln!("BAD {}: {}", p.display(), e);
            }
            println!("checked {} archives, {} bad", inputs.len(), bad.len());
            if !bad.is_empty() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
