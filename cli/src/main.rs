mod test_runner;

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use novascript::{ParseError, Script};

const SUBCOMMANDS: &[&str] = &["parse", "check", "fmt", "strip", "test", "help"];

#[derive(Parser)]
#[command(name = "novascript", version, about = "Nova script parser")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a script and dump its blocks
    Parse(ParseArgs),

    /// Parse scripts and report the first error in each
    Check(CheckArgs),

    /// Print a script re-rendered from its parsed blocks
    Fmt(FileArgs),

    /// Print only the dialogue text of a script
    Strip(FileArgs),

    /// Run .test.nova fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Script file to parse
    file: String,

    /// Dump as JSON instead of debug output
    #[arg(long)]
    json: bool,

    /// Group blocks into dialogue chunks
    #[arg(long)]
    chunks: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Script files to check
    #[arg(required = true)]
    files: Vec<String>,
}

#[derive(clap::Args)]
struct FileArgs {
    /// Script file
    file: String,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.nova file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `novascript file.txt` works like `novascript parse file.txt`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args.iter().skip(1).position(|a| !a.starts_with('-')) {
        let pos = pos + 1;
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "parse".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose, cli.quiet);

    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let result = match cli.command {
        Command::Parse(parse_args) => do_parse(parse_args, color),
        Command::Check(check_args) => do_check(check_args, color),
        Command::Fmt(file_args) => do_fmt(file_args, color),
        Command::Strip(file_args) => do_strip(file_args, color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                Ok(0)
            } else {
                Ok(test_runner::run_tests(path, cli.no_color, &test_args.category))
            }
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Read and parse one script, registering it with the codespan file database.
fn parse_file(
    files: &mut SimpleFiles<String, String>,
    path: &str,
) -> Result<Result<Script, ParseError>> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path))?;
    debug!(path, bytes = source.len(), "parsing script");
    let file_id = files.add(path.to_string(), source.clone());
    Ok(novascript::parser::Parser::new(source, file_id).parse())
}

fn emit_parse_error(color: ColorChoice, files: &SimpleFiles<String, String>, error: &ParseError) {
    let writer = StandardStream::stderr(color);
    let config = term::Config::default();
    let diagnostic = error.to_diagnostic();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, &diagnostic);
}

/// Parse a single script, printing diagnostics on failure.
fn load_script(path: &str, color: ColorChoice) -> Result<Option<Script>> {
    let mut files = SimpleFiles::new();
    match parse_file(&mut files, path)? {
        Ok(script) => Ok(Some(script)),
        Err(error) => {
            emit_parse_error(color, &files, &error);
            Ok(None)
        }
    }
}

fn do_parse(args: ParseArgs, color: ColorChoice) -> Result<i32> {
    let Some(script) = load_script(&args.file, color)? else {
        return Ok(1);
    };

    match (args.chunks, args.json) {
        (true, true) => println!("{}", serde_json::to_string_pretty(&script.chunks())?),
        (true, false) => println!("{:#?}", script.chunks()),
        (false, true) => println!("{}", serde_json::to_string_pretty(&script.blocks)?),
        (false, false) => println!("{:#?}", script.blocks),
    }
    Ok(0)
}

fn do_check(args: CheckArgs, color: ColorChoice) -> Result<i32> {
    let mut files = SimpleFiles::new();
    let mut failed = 0usize;

    for path in &args.files {
        match parse_file(&mut files, path)? {
            Ok(script) => {
                info!(path = path.as_str(), blocks = script.blocks.len(), "script ok");
                eprintln!("ok: {} parsed successfully", path);
            }
            Err(error) => {
                emit_parse_error(color, &files, &error);
                failed += 1;
            }
        }
    }

    Ok(if failed == 0 { 0 } else { 1 })
}

fn do_fmt(args: FileArgs, color: ColorChoice) -> Result<i32> {
    let Some(script) = load_script(&args.file, color)? else {
        return Ok(1);
    };
    print!("{}", script);
    Ok(0)
}

fn do_strip(args: FileArgs, color: ColorChoice) -> Result<i32> {
    let Some(script) = load_script(&args.file, color)? else {
        return Ok(1);
    };

    let texts: Vec<String> = script
        .chunks()
        .iter()
        .filter(|chunk| !chunk.is_eager())
        .map(|chunk| chunk.text())
        .filter(|text| !text.is_empty())
        .collect();
    println!("{}", texts.join("\n\n"));
    Ok(0)
}
