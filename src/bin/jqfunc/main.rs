//! jqfunc CLI: define and call jq-backed functions from the command line.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jqfunc::host::{Diagnostics, HostValue, SourceRange};
use jqfunc::{decode_functions, Function, FunctionDefinition, Settings};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod defs;

#[derive(Debug, Parser)]
#[command(name = "jqfunc")]
#[command(about = "Define and call jq-backed functions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run an ad-hoc query as a function
    Call(CallArgs),
    /// Call a function from a definitions file
    Run(RunArgs),
    /// Compile every function in a definitions file and report diagnostics
    Check(CheckArgs),
}

/// How the subject and positional arguments are supplied.
#[derive(Debug, Args)]
struct SubjectArgs {
    /// File holding the subject JSON (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Decode the subject into a typed value instead of passing it as JSON text
    #[arg(long)]
    typed: bool,

    /// Parameter values, one JSON document each
    #[arg(value_name = "ARG_JSON")]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct CallArgs {
    /// jq query to run
    #[arg(short, long)]
    query: String,

    /// Declared parameter name, bound as $NAME (repeatable)
    #[arg(short, long = "param", value_name = "NAME")]
    params: Vec<String>,

    #[command(flatten)]
    subject: SubjectArgs,
}

#[derive(Debug, Args)]
struct DefsArgs {
    /// TOML file of function definitions
    #[arg(short, long)]
    defs: PathBuf,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    defs: DefsArgs,

    /// Function to call
    name: String,

    #[command(flatten)]
    subject: SubjectArgs,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    defs: DefsArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Call(args) => {
            let def = FunctionDefinition::new(
                "call",
                args.params,
                args.query,
                SourceRange::new("<command line>", Default::default(), Default::default()),
            );
            let function = Function::new(def.compile()?, &Settings::default().subject_param);
            print_result(&function.call(&call_args(&args.subject)?)?)
        }
        Command::Run(args) => {
            let (table, diags) = load_table(&args.defs)?;
            report(&diags);
            let result = table
                .call(&args.name, &call_args(&args.subject)?)
                .with_context(|| format!("Failed to call {}", args.name))?;
            print_result(&result)
        }
        Command::Check(args) => {
            let (table, diags) = load_table(&args.defs)?;
            report(&diags);
            if diags.has_errors() {
                bail!("{} error(s) in {}", diags.errors().count(), args.defs.defs.display());
            }
            for function in table.iter() {
                let params: Vec<_> = function.params().iter().map(|p| p.name.as_str()).collect();
                println!("{}({})", function.name(), params.join(", "));
            }
            Ok(())
        }
    }
}

fn load_table(args: &DefsArgs) -> Result<(jqfunc::FunctionTable, Diagnostics)> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let body = defs::load(&args.defs)?;
    let (table, _remaining, diags) = decode_functions(body, &settings);
    Ok((table, diags))
}

fn report(diags: &Diagnostics) {
    for diag in diags {
        eprintln!("{:?}: {}", diag.severity, diag);
    }
}

/// The subject first, then each parameter decoded from its JSON text.
fn call_args(args: &SubjectArgs) -> Result<Vec<HostValue>> {
    let text = read_subject(args.input.as_deref())?;
    let subject = if args.typed {
        let value: serde_json::Value =
            serde_json::from_str(&text).context("Subject is not valid JSON")?;
        HostValue::from_json(value)
    } else {
        HostValue::String(text)
    };

    let mut values = vec![subject];
    for (i, arg) in args.args.iter().enumerate() {
        let value: serde_json::Value = serde_json::from_str(arg)
            .with_context(|| format!("Argument {} is not valid JSON: {}", i + 1, arg))?;
        values.push(HostValue::from_json(value));
    }
    Ok(values)
}

fn read_subject(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input: {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn print_result(value: &HostValue) -> Result<()> {
    match value {
        HostValue::String(s) => println!("{}", s),
        other => {
            let json = other.to_json().context("Result cannot be printed as JSON")?;
            println!("{}", serde_json::to_string(&json)?);
        }
    }
    Ok(())
}
