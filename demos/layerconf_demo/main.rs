//! # layerconf demo application
//!
//! A small CLI that resolves a handful of options through every layer
//! layerconf supports. It exists to demonstrate and manually verify the
//! library, not to do anything useful.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example layerconf_demo -- show
//! cargo run --example layerconf_demo -- config dump
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature               | How to exercise it                                                   |
//! |-----------------------|----------------------------------------------------------------------|
//! | Defaults              | `cargo run --example layerconf_demo -- show`                         |
//! | Config file (cwd)     | Put `[defaults]\ncolor = red` in `./layerconf-demo.cfg`, run `show`  |
//! | Config file override  | `LAYERCONF_DEMO_CONFIG=/tmp/demo.cfg cargo run ... -- show`          |
//! | Env var               | `DEMO_RETRIES=7 cargo run --example layerconf_demo -- show`          |
//! | Deprecated env var    | `DEMO_COLOUR=green cargo run --example layerconf_demo -- show`       |
//! | CLI argument          | `cargo run --example layerconf_demo -- --color blue show`            |
//! | Choices               | `cargo run --example layerconf_demo -- --color purple show`          |
//! | Templated default     | `cargo run --example layerconf_demo -- --var user=alice show`        |
//! | `config list/get`     | `cargo run --example layerconf_demo -- config get RETRIES`           |
//! | Tracing output        | `RUST_LOG=layerconf=debug cargo run --example layerconf_demo -- show`|

use std::collections::HashMap;
use std::path::Path;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use layerconf::{
    ClapArgs, ConfigArgs, DeprecationLedger, ResolveRequest, Resolver, Scope, Value,
    parse_definitions,
};

const DEFINITIONS: &str = r#"
RETRIES:
  description: How many times to retry a failed request.
  type: integer
  default: 3
  env:
    - name: DEMO_RETRIES
  ini:
    - section: defaults
      key: retries
COLOR:
  description: Output color.
  type: string
  default: yellow
  choices: [red, green, yellow, blue]
  cli:
    - name: color
  env:
    - name: DEMO_COLOUR
      deprecated:
        why: misspelled
        removed_in: "2.0"
        alternatives: DEMO_COLOR
    - name: DEMO_COLOR
  ini:
    - section: defaults
      key: color
GREETING:
  description: Greeting printed by `show`.
  type: string
  default: "{{ 'hello ' ~ user }}"
  vars:
    - name: greeting
WORK_DIR:
  description: Scratch directory, removed on exit.
  type: temppath
  default: ~/.layerconf-demo/tmp
"#;

/// layerconf demo: resolve options from every layer and print them.
#[derive(Parser, Debug)]
#[command(name = "layerconf-demo")]
struct Cli {
    /// Output color.
    #[arg(long, global = true)]
    color: Option<String>,

    /// Extra variable, as NAME=VALUE. May be repeated.
    #[arg(long = "var", global = true, value_parser = parse_var)]
    vars: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every resolved option with its origin.
    Show,
    /// Inspect the option definitions and the active config file.
    Config(ConfigArgs),
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}

fn report(ledger: &DeprecationLedger) {
    for (identifier, info) in ledger.deprecated() {
        eprintln!(
            "[DEPRECATION WARNING] {identifier}:\n\t{}",
            DeprecationLedger::format_deprecation_message(&info, true, None)
        );
    }
    for warning in ledger.warnings() {
        eprintln!("[WARNING] {warning}");
    }
    for error in ledger.errors() {
        eprintln!("[ERROR] {}: {}", error.message, error.cause);
    }
}

fn show(resolver: &Resolver, vars: &HashMap<String, Value>) -> Result<(), layerconf::ResolveError> {
    let request = ResolveRequest::new().variables(vars);
    for name in resolver.list_definitions(Scope::Base).into_keys() {
        let resolved = resolver.resolve(&name, &request)?;
        println!("{name:<12} {:<24} ({})", resolved.value.value, resolved.origin);
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let definitions = parse_definitions(DEFINITIONS, Path::new("<demo>"), false, true)
        .unwrap_or_else(|e| {
            eprintln!("Invalid definitions:\n{e}");
            std::process::exit(1);
        })
        .definitions;

    let resolver = Resolver::builder()
        .app_name("layerconf-demo")
        .definitions(definitions)
        .cli_args(ClapArgs::new(matches))
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to set up config:\n{e}");
            std::process::exit(1);
        });

    let vars: HashMap<String, Value> = cli
        .vars
        .into_iter()
        .map(|(k, v)| (k, Value::from(v.as_str())))
        .collect();

    let result = match cli.command {
        Commands::Show => show(&resolver, &vars),
        Commands::Config(args) => resolver.handle_and_print(&args.into_action(), Scope::Base),
    };
    report(resolver.ledger());
    resolver.release_temp_paths();
    if let Err(e) = result {
        eprintln!("Config error:\n{e}");
        std::process::exit(1);
    }
}
