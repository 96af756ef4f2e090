//! Command line front end: `amplocate amplicon` and `amplocate locate`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};

use amplocate::*;

#[derive(Parser, Debug)]
#[command(name = "amplocate")]
#[command(version, about = "Locate primer-pair amplicons and short patterns in FASTA/FASTQ files")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Number of worker threads
    #[arg(short = 'j', long, global = true, default_value_t = num_cpus::get())]
    threads: usize,

    /// Output file ("-" for stdout, ".gz" suffix for gzip)
    #[arg(short = 'o', long, global = true, default_value = "-")]
    out_file: String,

    /// Line width of FASTA sequences (0 for no wrapping)
    #[arg(short = 'w', long, global = true, default_value_t = 60)]
    line_width: usize,

    /// Flush the output after every record
    #[arg(long, global = true)]
    immediate_output: bool,

    /// Only log errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug messages
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract amplicons (or regions around them) by primer pairs
    Amplicon(AmpliconArgs),
    /// Find every occurrence of short patterns
    Locate(LocateArgs),
}

#[derive(Args, Debug)]
struct AmpliconArgs {
    /// Input FASTA/FASTQ files ("-" for stdin)
    #[arg(default_value = "-")]
    inputs: Vec<String>,

    /// Forward primer (5' to 3')
    #[arg(short = 'F', long)]
    forward: Option<String>,

    /// Reverse primer (5' to 3', on the opposite strand)
    #[arg(short = 'R', long)]
    reverse: Option<String>,

    /// Primer pairs as TSV (name, forward, reverse) or YAML (.yaml/.yml)
    #[arg(short = 'p', long, conflicts_with_all = ["forward", "reverse"])]
    primer_file: Option<String>,

    /// Maximum mismatches in each primer. With mismatches, degenerate bases (e.g. Y, M, N)
    /// are compared letter by letter, so each one counts as a mismatch
    #[arg(short = 'm', long, default_value_t = 0)]
    max_mismatch: usize,

    /// Only search the positive strand
    #[arg(short = 'P', long)]
    only_positive_strand: bool,

    /// Region relative to the amplicon, as begin:end (e.g. 1:-1, or -20:-1 with --flanking)
    #[arg(short = 'r', long, allow_hyphen_values = true)]
    region: Option<String>,

    /// Treat the region as flanking the amplicon
    #[arg(short = 'f', long, requires = "region")]
    flanking: bool,

    /// Discard regions that would have to be clipped to the sequence bounds
    #[arg(short = 's', long = "strict-mode", requires = "region")]
    strict: bool,

    /// Output BED6 plus the amplicon sequence
    #[arg(long)]
    bed: bool,

    /// Append primer mismatch counts to BED output
    #[arg(long, requires = "bed")]
    output_mismatches: bool,

    /// Also output records without any amplicon
    #[arg(short = 'u', long, conflicts_with = "bed")]
    save_unmatched: bool,

    /// Do not reject non-IUPAC sequence bytes when searching with mismatches
    #[arg(long)]
    no_validate_seq: bool,
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Input FASTA/FASTQ files ("-" for stdin)
    #[arg(default_value = "-")]
    inputs: Vec<String>,

    /// Pattern to search for (repeatable)
    #[arg(short = 'p', long = "pattern")]
    patterns: Vec<String>,

    /// FASTA file of patterns
    #[arg(short = 'f', long)]
    pattern_file: Option<String>,

    /// Maximum mismatches in each occurrence. With mismatches, degenerate bases are
    /// compared letter by letter, so each one counts as a mismatch
    #[arg(short = 'm', long, default_value_t = 0)]
    max_mismatch: usize,

    /// Only search the positive strand
    #[arg(short = 'P', long)]
    only_positive_strand: bool,

    /// Append mismatch counts
    #[arg(long)]
    output_mismatches: bool,

    /// Do not reject non-IUPAC sequence bytes when searching with mismatches
    #[arg(long)]
    no_validate_seq: bool,
}

fn init_logging(global: &GlobalArgs) {
    let level = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Records of all inputs as one stream, in the order given.
fn open_inputs(
    inputs: &[String],
) -> Result<impl Iterator<Item = amplocate::errors::Result<Record>>> {
    let readers = inputs
        .iter()
        .map(|input| {
            FastxRecords::from_file(input).with_context(|| format!("Failed to open {input}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(readers.into_iter().flatten())
}

fn load_primers(args: &AmpliconArgs) -> Result<Primers> {
    if let Some(file) = &args.primer_file {
        let bytes =
            std::fs::read(file).with_context(|| format!("Failed to read primer file {file}"))?;
        let primers = if file.ends_with(".yaml") || file.ends_with(".yml") {
            Primers::from_yaml(&bytes)
        } else {
            Primers::from_tsv(&bytes)
        };
        return primers.with_context(|| format!("Invalid primer file {file}"));
    }

    let forward = args.forward.as_deref().unwrap_or_default();
    let reverse = args.reverse.as_deref().unwrap_or_default();
    if forward.is_empty() && reverse.is_empty() {
        bail!("Give primers with -F/-R or a primer file with -p");
    }

    let pair = PrimerPair::new("primer", forward.as_bytes(), reverse.as_bytes())?;
    Ok(Primers::new(vec![pair])?)
}

fn run_amplicon(global: &GlobalArgs, args: AmpliconArgs) -> Result<()> {
    let primers = load_primers(&args)?;
    for pair in primers.pairs() {
        debug!(
            "Primer pair \"{}\": forward {}, reverse {}",
            pair.name,
            String::from_utf8_lossy(&pair.forward),
            String::from_utf8_lossy(&pair.reverse)
        );
    }

    let region = args
        .region
        .as_deref()
        .map(|r| Region::parse(r, args.flanking, args.strict))
        .transpose()?;

    let config = AmpliconConfig {
        max_mismatch: args.max_mismatch,
        only_positive_strand: args.only_positive_strand,
        region,
        output: if args.bed {
            AmpliconOutput::Bed
        } else {
            AmpliconOutput::Fastx
        },
        output_mismatches: args.output_mismatches,
        save_unmatched: args.save_unmatched,
        immediate_output: global.immediate_output,
        line_width: global.line_width,
        threads: global.threads,
        index_options: IndexOptions {
            validate_seq: !args.no_validate_seq,
            ..IndexOptions::default()
        },
    };

    info!(
        "Searching {} primer pairs with {} mismatches on {} threads",
        primers.len(),
        config.max_mismatch,
        config.threads
    );

    let search = AmpliconSearch::new(primers, config)?;
    let records = open_inputs(&args.inputs)?;
    let mut writer = open_output(&global.out_file)?;

    search
        .run(records, &mut *writer)
        .context("Failed to search for amplicons")?;
    Ok(())
}

fn run_locate(global: &GlobalArgs, args: LocateArgs) -> Result<()> {
    let mut patterns = args
        .patterns
        .iter()
        .map(|p| Pattern::new(p.as_str(), p.as_bytes()))
        .collect::<amplocate::errors::Result<Vec<_>>>()?;

    if let Some(file) = &args.pattern_file {
        let records = FastxRecords::from_file(file)?;
        patterns.extend(
            Pattern::from_records(records)
                .with_context(|| format!("Invalid pattern file {file}"))?,
        );
    }

    if patterns.is_empty() {
        bail!("Give patterns with -p or a pattern file with -f");
    }

    let config = LocateConfig {
        max_mismatch: args.max_mismatch,
        only_positive_strand: args.only_positive_strand,
        output_mismatches: args.output_mismatches,
        immediate_output: global.immediate_output,
        threads: global.threads,
        index_options: IndexOptions {
            validate_seq: !args.no_validate_seq,
            ..IndexOptions::default()
        },
    };

    info!(
        "Searching {} patterns with {} mismatches on {} threads",
        patterns.len(),
        config.max_mismatch,
        config.threads
    );

    let search = LocateSearch::new(patterns, config)?;
    let records = open_inputs(&args.inputs)?;
    let mut writer = open_output(&global.out_file)?;

    search
        .run(records, &mut *writer)
        .context("Failed to search for patterns")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    if cli.global.threads == 0 {
        bail!("Number of threads must be at least 1");
    }

    match cli.command {
        Command::Amplicon(args) => run_amplicon(&cli.global, args),
        Command::Locate(args) => run_locate(&cli.global, args),
    }
}
