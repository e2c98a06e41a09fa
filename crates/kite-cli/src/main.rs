use std::env;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::path::PathBuf;

use serde_json::json;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use kite_core::catalog;
use kite_core::summarize;
use kite_core::Config;
use kite_core::InvocationId;
use kite_core::SessionAction;
use kite_core::SessionEffect;
use kite_core::Session;
use kite_core::SessionEventStore;
use kite_core::UserAction;
use kite_core::View;
use kite_exec::auth_badge;
use kite_exec::AgentTransport;
use kite_exec::IdentityProvider;
use kite_exec::LocalIdentity;
use kite_exec::ScriptedTransport;
use kite_exec::SessionDriver;
use kite_exec::SimulatedAgent;

mod settings;
mod ui;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    journal: Option<PathBuf>,
    script: Option<PathBuf>,
    path: Option<PathBuf>,
    decision: Option<String>,
    verbose: bool,
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("kite {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "suggestions" => {
            for suggestion in catalog::SUGGESTIONS {
                println!("{:<20} {}", suggestion.title, suggestion.message);
            }
            Ok(())
        }
        "demo" => {
            let options = parse_options(args.collect())?;
            let config = init(&options)?;
            run_demo(config, options)
        }
        "replay" => {
            let options = parse_options(args.collect())?;
            let config = init(&options)?;
            run_replay(config, options)
        }
        "journal" => {
            let options = parse_options(args.collect())?;
            let config = settings::load_config(options.config.as_deref())?;
            let path = options
                .path
                .or_else(|| settings::journal_path(&config, None))
                .or_else(settings::default_journal_path)
                .ok_or("no journal path; pass --path")?;
            let records = SessionEventStore::open(&path)?.load()?;
            println!("{}", serde_json::to_string_pretty(&summarize(&records))?);
            Ok(())
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

fn parse_options(args: Vec<String>) -> Result<Options, Box<dyn std::error::Error>> {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let takes_value = matches!(
            flag,
            "--config" | "--journal" | "--script" | "--path" | "--decision"
        );
        if takes_value {
            let Some(value) = args.get(i + 1) else {
                return Err(format!("{flag} requires a value").into());
            };
            match flag {
                "--config" => options.config = Some(PathBuf::from(value)),
                "--journal" => options.journal = Some(PathBuf::from(value)),
                "--script" => options.script = Some(PathBuf::from(value)),
                "--path" => options.path = Some(PathBuf::from(value)),
                _ => options.decision = Some(value.clone()),
            }
            i += 2;
            continue;
        }
        match flag {
            "--verbose" | "-v" => options.verbose = true,
            other => return Err(format!("unsupported argument: {other}").into()),
        }
        i += 1;
    }
    Ok(options)
}

fn init(options: &Options) -> Result<Config, Box<dyn std::error::Error>> {
    let config = settings::load_config(options.config.as_deref())?;
    let level = if options.verbose {
        Level::DEBUG
    } else {
        config.session.log_level.parse().unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(config)
}

fn open_driver<T: AgentTransport>(
    config: Config,
    transport: T,
    options: &Options,
) -> Result<SessionDriver<T>, Box<dyn std::error::Error>> {
    let journal = settings::journal_path(&config, options.journal.clone());
    let session = Session::proverbs(config)?;
    let mut driver = SessionDriver::new(session, transport);
    if let Some(path) = journal {
        tracing::info!(path = %path.display(), "journal enabled");
        driver = driver.with_journal(SessionEventStore::open(path)?);
    }
    Ok(driver)
}

fn run_demo(config: Config, options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = open_driver(config, SimulatedAgent::new(), &options)?;
    let mut identity = LocalIdentity::from_env();
    let mut last_revision = None;

    println!("kite {} · chatting with {}", env!("CARGO_PKG_VERSION"), driver.session().config.session.agent_name);
    println!("Type a message, /suggest for ideas, /signin, /signout, /log or /quit.");
    let effects = driver.start()?;
    show(&mut driver, effects, &mut last_revision);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/suggest" => {
                for suggestion in catalog::SUGGESTIONS {
                    println!("  {:<20} {}", suggestion.title, suggestion.message);
                }
                continue;
            }
            "/signin" => {
                match identity.sign_in() {
                    Ok(_) => print!("{}", ui::format_view(&auth_badge(&identity, &driver.session().display))),
                    Err(err) => println!("! {err}"),
                }
                continue;
            }
            "/signout" => {
                if let Err(err) = identity.sign_out() {
                    println!("! {err}");
                }
                print!("{}", ui::format_view(&auth_badge(&identity, &driver.session().display)));
                continue;
            }
            "/log" => {
                for entry in driver.session().logs.iter() {
                    println!("{}", ui::format_log(entry));
                }
                continue;
            }
            _ => {}
        }

        let action = SessionAction::User(UserAction::SendMessage(line.to_string()));
        let effects = step(&mut driver, action);
        show(&mut driver, effects, &mut last_revision);
    }

    let effects = step(&mut driver, SessionAction::User(UserAction::EndSession));
    show(&mut driver, effects, &mut last_revision);
    Ok(())
}

fn run_replay(config: Config, options: Options) -> Result<(), Box<dyn std::error::Error>> {
    let script = options
        .script
        .clone()
        .ok_or("replay requires --script PATH")?;
    let transport = ScriptedTransport::open(&script)?;
    let mut driver = open_driver(config, transport, &options)?;
    let mut last_revision = None;

    let effects = driver.start()?;
    print_effects(&effects);
    let effects = driver.pump()?;
    print_effects(&effects);

    if let Some(decision) = options.decision.as_deref() {
        let pending: Vec<InvocationId> = driver
            .session()
            .pending()
            .into_iter()
            .filter(|record| record.approval_status().is_some())
            .map(|record| record.id.clone())
            .collect();
        for invocation_id in pending {
            let effects = driver.step(SessionAction::User(UserAction::Respond {
                invocation_id,
                decision: json!(decision),
            }))?;
            print_effects(&effects);
        }
    }

    let effects = driver.dispatch(SessionAction::User(UserAction::EndSession))?;
    print_effects(&effects);
    print_board(&driver, &mut last_revision, true);
    println!("sent {} message(s) to the agent", driver.transport().sent().len());
    Ok(())
}

/// A transport failure was already recorded as a notice; show it and go on.
fn step<T: AgentTransport>(driver: &mut SessionDriver<T>, action: SessionAction) -> Vec<SessionEffect> {
    match driver.step(action) {
        Ok(effects) => effects,
        Err(err) => {
            println!("! transport: {err}");
            Vec::new()
        }
    }
}

fn show<T: AgentTransport>(
    driver: &mut SessionDriver<T>,
    effects: Vec<SessionEffect>,
    last_revision: &mut Option<u64>,
) {
    let mut queue = effects;
    while !queue.is_empty() {
        print_effects(&queue);
        print_board(driver, last_revision, false);
        let awaiting = queue.iter().rev().find_map(|effect| match effect {
            SessionEffect::Render {
                invocation_id,
                view,
                ..
            } if !view.buttons.is_empty() => Some((invocation_id.clone(), view.clone())),
            _ => None,
        });
        queue = match awaiting {
            Some((invocation_id, view)) if driver.session().invocation(&invocation_id).is_some() => {
                match prompt_decision(&view) {
                    Ok(Some(decision)) => step(
                        driver,
                        SessionAction::User(UserAction::Respond {
                            invocation_id,
                            decision,
                        }),
                    ),
                    Ok(None) => Vec::new(),
                    Err(err) => {
                        println!("! {err}");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };
    }
}

fn prompt_decision(view: &View) -> io::Result<Option<serde_json::Value>> {
    print!("choose 1-{} (enter to decide later): ", view.buttons.len());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let choice = line
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|idx| idx.checked_sub(1))
        .and_then(|idx| view.buttons.get(idx));
    Ok(choice.map(|button| button.decision.clone()))
}

fn print_effects(effects: &[SessionEffect]) {
    for text in effects.iter().filter_map(ui::format_effect) {
        println!("{text}");
    }
}

fn print_board<T: AgentTransport>(driver: &SessionDriver<T>, last_revision: &mut Option<u64>, force: bool) {
    let session = driver.session();
    let revision = session.store.revision();
    if !force && *last_revision == Some(revision) {
        return;
    }
    *last_revision = Some(revision);
    print!("{}", ui::format_view(&catalog::proverbs_board(session.state(), &session.display)));
}

fn print_help() {
    println!("kite {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  kite demo [--config PATH] [--journal PATH] [--verbose]");
    println!("  kite replay --script PATH [--decision VALUE] [--config PATH] [--journal PATH] [--verbose]");
    println!("  kite journal [--path PATH] [--config PATH]");
    println!("  kite suggestions");
    println!("  kite --help");
    println!("  kite --version");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn options_parse_values_and_flags() {
        let options = parse_options(strings(&[
            "--script",
            "session.jsonl",
            "--decision",
            "approved",
            "-v",
        ]))
        .unwrap();
        assert_eq!(options.script, Some(PathBuf::from("session.jsonl")));
        assert_eq!(options.decision.as_deref(), Some("approved"));
        assert!(options.verbose);
    }

    #[test]
    fn options_reject_missing_values_and_unknown_flags() {
        assert!(parse_options(strings(&["--script"])).is_err());
        assert!(parse_options(strings(&["--repo", "."])).is_err());
    }
}
