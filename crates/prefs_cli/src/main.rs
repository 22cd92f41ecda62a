use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use prefs_cli::{parse_switch, run, CommandKind, CommonOptions};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--prefs" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --prefs".to_string())?;
                options.prefs_path = PathBuf::from(value);
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "list" => match command_args {
            [] => CommandKind::List { prefix: None },
            [prefix] => CommandKind::List {
                prefix: Some(prefix.clone()),
            },
            _ => return Err("list takes at most one prefix".to_string()),
        },
        "get" => match command_args {
            [key] => CommandKind::Get { key: key.clone() },
            _ => return Err("get requires exactly one key".to_string()),
        },
        "delete-saved" => {
            let mut category = None;
            let mut property = None;
            let mut arg_index = 0usize;
            while arg_index < command_args.len() {
                let flag = command_args[arg_index].as_str();
                let value = command_args
                    .get(arg_index + 1)
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                match flag {
                    "--category" => category = Some(value.clone()),
                    "--property" => property = Some(value.clone()),
                    other => {
                        return Err(format!(
                            "unknown delete-saved argument '{other}' (expected --category or --property)"
                        ))
                    }
                }
                arg_index += 2;
            }
            CommandKind::DeleteSaved { category, property }
        }
        "auto-refresh" => match command_args {
            [] => CommandKind::AutoRefresh { enabled: None },
            [value] => CommandKind::AutoRefresh {
                enabled: Some(parse_switch(value).ok_or_else(|| {
                    format!("invalid auto-refresh value '{value}' (expected on or off)")
                })?),
            },
            _ => return Err("auto-refresh takes at most one value".to_string()),
        },
        "reset-view" => {
            if !command_args.is_empty() {
                return Err("reset-view takes no arguments".to_string());
            }
            CommandKind::ResetView
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "prefs_cli - inspect and reset saved debug command prefs",
        "",
        "Usage:",
        "  prefs_cli [--prefs <path>] list [<prefix>]",
        "  prefs_cli [--prefs <path>] get <key>",
        "  prefs_cli [--prefs <path>] delete-saved [--category <name>] [--property <name>]",
        "  prefs_cli [--prefs <path>] auto-refresh [on|off]",
        "  prefs_cli [--prefs <path>] reset-view",
        "",
        "Defaults:",
        "  --prefs noa_debugger_prefs.json",
    ]
    .join("\n")
}
