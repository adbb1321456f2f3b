//! Command-line front end: `generate` renders a parser from a grammar
//! file, `dump` serializes its AST. See spec.md §6.2.
//!
//! Grounded on `radlr-cli`'s `Cargo.toml` dependency on `clap` — this
//! binary uses the derive API, the idiomatic successor to the
//! `Command`/`ArgMatches` builder style, for the same dependency.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use parsegen_core::config::ModifierConfig;
use parsegen_core::{compile, dump};

#[derive(Parser)]
#[command(name = "parsegen", version, about = "A PEG parser generator")]
struct Cli {
  /// Raises the log level; repeat for more detail (-v, -vv, -vvv).
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Compile a grammar and emit parser source code.
  Generate {
    grammar: PathBuf,

    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value = "rust")]
    backend: String,

    /// Name given to the generated parser type.
    #[arg(long, default_value = "GeneratedParser")]
    parser_name: String,

    /// Modifier pipeline overrides, each of the form `mod.<pass>=<bool>`.
    #[arg(long = "mod", value_name = "mod.<pass>=<bool>")]
    mods: Vec<String>,
  },
  /// Serialize a grammar's AST as JSON.
  Dump {
    grammar: PathBuf,

    /// Dump the AST after the modifier pipeline runs, instead of as parsed.
    #[arg(long)]
    modified: bool,

    #[arg(long = "mod", value_name = "mod.<pass>=<bool>")]
    mods: Vec<String>,
  },
}

fn install_logger(verbosity: u8) {
  let level = match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };
  env_logger::Builder::new().filter_level(level).init();
}

/// Parses `mod.<pass>=<bool>` tokens into a [`ModifierConfig`], starting
/// from the default (every optional pass off). Unknown pass names are a
/// usage error, surfaced before any compilation is attempted.
fn apply_mod_overrides(mut config: ModifierConfig, mods: &[String]) -> Result<ModifierConfig, String> {
  for entry in mods {
    let rest = entry.strip_prefix("mod.").ok_or_else(|| format!("malformed override `{entry}`, expected `mod.<pass>=<bool>`"))?;
    let (pass, value) = rest.split_once('=').ok_or_else(|| format!("malformed override `{entry}`, expected `mod.<pass>=<bool>`"))?;
    let enable: bool = value.parse().map_err(|_| format!("`{entry}`: value must be `true` or `false`"))?;
    config = match pass {
      "expand_class" => config.with_expand_class(enable),
      "replace_rep" => config.with_replace_rep(enable),
      "eliminate_and" => config.with_eliminate_and(enable),
      "strict_any_char" => config.with_strict_any_char(enable),
      other => return Err(format!("unknown modifier pass `{other}`")),
    };
  }
  Ok(config)
}

fn run(cli: Cli) -> Result<(), String> {
  match cli.command {
    Command::Generate { grammar, output, backend, parser_name, mods } => {
      let config = apply_mod_overrides(ModifierConfig::default(), &mods)?;
      let source = fs::read_to_string(&grammar).map_err(|e| format!("reading {}: {e}", grammar.display()))?;
      let (grammar, diags) = compile(&source, Some(grammar.display().to_string()), &config).map_err(|e| e.to_string())?;
      for warning in diags.warnings() {
        log::warn!("{warning}");
      }

      let rendered = match backend.as_str() {
        "rust" => parsegen_codegen::generate(&grammar, &parser_name).map_err(|e| e.to_string())?,
        other => return Err(format!("unknown backend `{other}`")),
      };

      match output {
        Some(dir) => {
          fs::create_dir_all(&dir).map_err(|e| format!("creating {}: {e}", dir.display()))?;
          let path = dir.join(format!("{parser_name}.rs"));
          fs::write(&path, rendered).map_err(|e| format!("writing {}: {e}", path.display()))?;
        }
        None => println!("{rendered}"),
      }
      Ok(())
    }
    Command::Dump { grammar, modified, mods } => {
      let config = apply_mod_overrides(ModifierConfig::default(), &mods)?;
      let source = fs::read_to_string(&grammar).map_err(|e| format!("reading {}: {e}", grammar.display()))?;

      let json = if modified {
        let (g, _diags) = compile(&source, Some(grammar.display().to_string()), &config).map_err(|e| e.to_string())?;
        dump::to_json(&g).map_err(|e| e.to_string())?
      } else {
        let g = parsegen_core::parser::Parser::new(&source, Some(grammar.display().to_string())).parse().map_err(|e| e.to_string())?;
        dump::to_json(&g).map_err(|e| e.to_string())?
      };
      println!("{json}");
      Ok(())
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  install_logger(cli.verbose);
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("error: {e}");
      ExitCode::FAILURE
    }
  }
}
