use clap::{ArgAction, CommandFactory, Parser, ValueHint, value_parser};
use clap_complete::aot::{Shell, generate};
use findop::filters::{self, EntryTypeFilter, EntryTypeFilterParser, FindFilter};
use findop::{FindError, FindOperation};
use std::io::{IsTerminal as _, stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod printer;
use printer::PrinterBuilder;

#[cfg(all(
    any(target_os = "linux", target_os = "macos", target_os = "android"),
    feature = "mimalloc"
))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
#[allow(clippy::struct_excessive_bools)]
/// findop command line arguments
struct Args {
    #[arg(
        value_name = "PATTERN",
        help = "Wildcard name pattern, `*` and `?` are supported, case-insensitive",
        index = 1
    )]
    pattern: Option<String>,

    #[arg(
        value_name = "PATH",
        help = "Directory to enumerate (defaults to the current directory)",
        value_hint = ValueHint::DirPath,
        index = 2
    )]
    directory: Option<PathBuf>,

    #[arg(short = 'r', long = "recursive", help = "Descend into subdirectories")]
    recursive: bool,

    #[arg(
        short = 'L',
        long = "follow-links",
        help = "Descend into symlinked directories and junctions, there is no loop detection"
    )]
    follow_links: bool,

    #[arg(
        short = 't',
        long = "type",
        value_parser = EntryTypeFilterParser,
        help = "Only print entries of this type"
    )]
    entry_type: Option<EntryTypeFilter>,

    #[arg(
        short = 'l',
        long = "long",
        help = "Print attributes, size and modification time"
    )]
    long: bool,

    #[arg(short = 'n', long = "max-results", help = "Stop after this many results")]
    top_n: Option<usize>,

    #[arg(
        short = '0',
        long = "print0",
        help = "Separate results with NUL instead of newline"
    )]
    print0: bool,

    #[arg(long = "sort", help = "Sort results by path (collects everything first)")]
    sort: bool,

    #[arg(long = "no-colour", visible_alias = "no-color", help = "Never colour output")]
    no_colour: bool,

    #[arg(
        long = "generate",
        action = ArgAction::Set,
        value_parser = value_parser!(Shell),
        help = "Generate shell completions"
    )]
    generate: Option<Shell>,
}

fn init_logging() {
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .compact()
        .try_init();
}

fn run(args: Args) -> Result<(), FindError> {
    let root = args.directory.unwrap_or_else(|| PathBuf::from("."));
    let filter = args
        .entry_type
        .map_or(filters::all as FindFilter, EntryTypeFilter::as_filter);

    let results = FindOperation::new(&root)
        .recursive(args.recursive)
        .pattern(args.pattern.as_deref().unwrap_or("*"))
        .follow_reparse_points(args.follow_links)
        .filter(filter)
        .enumerate()?;

    PrinterBuilder::new(results)
        .limit(args.top_n)
        .sort(args.sort)
        .long(args.long)
        .null_terminated(args.print0)
        .nocolour(args.no_colour)
        .print()
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(generator) = args.generate {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_owned();
        generate(generator, &mut cmd, name, &mut stdout());
        return ExitCode::SUCCESS;
    }

    init_logging();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::debug!(kind = ?error.kind(), "enumeration failed");
            eprintln!("findop: {error}");
            ExitCode::FAILURE
        }
    }
}
