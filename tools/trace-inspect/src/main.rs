use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use trace_store::{RecordStream, RegisterChange, TraceRecord, TraceSession};
use tracing_subscriber::EnvFilter;

mod config;

use config::{Cli, Command, Options};

#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    line: usize,
    record: &'a TraceRecord,
    changes: Vec<RegisterChange>,
}

#[derive(Debug, Serialize)]
struct DumpEntry<'a> {
    line: usize,
    record: &'a TraceRecord,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.options.log_level)?;
    tracing::debug!(config = ?cli.options.cache_config(), "cache configuration");
    run(&cli.options, cli.command)
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log filter {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

fn run(options: &Options, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Info { trace } => info(options, &trace),
        Command::Show { trace, line, json } => show(options, &trace, line, json),
        Command::Dump {
            trace,
            from,
            count,
            json,
        } => dump(options, &trace, from, count, json),
        Command::Check { trace, max_errors } => check(&trace, max_errors),
    }
}

fn open_session(options: &Options, trace: &Path) -> anyhow::Result<TraceSession> {
    TraceSession::open(trace, options.cache_config())
        .with_context(|| format!("open trace {}", trace.display()))
}

fn info(options: &Options, trace: &Path) -> anyhow::Result<()> {
    let mut session = open_session(options, trace)?;
    println!("trace: {}", trace.display());
    println!("lines: {}", session.total());
    println!("bytes: {}", session.cache().index().byte_len());
    tracing::debug!(stats = ?session.cache().stats(), "cache stats");
    session.close();
    Ok(())
}

fn show(options: &Options, trace: &Path, line: usize, json: bool) -> anyhow::Result<()> {
    let mut session = open_session(options, trace)?;
    if !session.go_to(line) {
        bail!(
            "line {line} is out of range (trace has {} lines)",
            session.total()
        );
    }
    let Some(record) = session.current() else {
        bail!("line {line} could not be parsed");
    };
    let changes = session
        .previous()
        .map(|previous| record.changed_registers(&previous))
        .unwrap_or_default();

    let mut out = io::stdout().lock();
    if json {
        let payload = ShowOutput {
            line,
            record: &record,
            changes,
        };
        serde_json::to_writer_pretty(&mut out, &payload).context("serialize record")?;
        writeln!(out)?;
    } else {
        write_record(&mut out, line, &record, &changes)?;
    }
    session.close();
    Ok(())
}

fn write_record(
    out: &mut impl Write,
    line: usize,
    record: &TraceRecord,
    changes: &[RegisterChange],
) -> io::Result<()> {
    writeln!(out, "line {line} (step {:#x})", record.step)?;
    writeln!(
        out,
        "address {:#x}  offset {:#x}",
        record.address, record.offset
    )?;
    writeln!(out, "instruction: {}", record.instruction)?;
    for (n, value) in record.registers.iter().enumerate() {
        writeln!(out, "x{n:<3} {value:#018x}")?;
    }
    writeln!(out, "sp   {:#018x}", record.sp)?;
    writeln!(out, "pc   {:#018x}", record.pc)?;

    if changes.is_empty() {
        writeln!(out, "changed: none")?;
    } else {
        let list: Vec<String> = changes
            .iter()
            .map(|c| format!("{} {:#x} -> {:#x}", c.register, c.before, c.after))
            .collect();
        writeln!(out, "changed: {}", list.join(", "))?;
    }
    Ok(())
}

fn dump(
    options: &Options,
    trace: &Path,
    from: usize,
    count: usize,
    json: bool,
) -> anyhow::Result<()> {
    let mut session = open_session(options, trace)?;
    if count == 0 {
        return Ok(());
    }
    if !session.go_to(from) {
        bail!(
            "line {from} is out of range (trace has {} lines)",
            session.total()
        );
    }

    let mut out = io::stdout().lock();
    for _ in 0..count {
        let line = session.position();
        match session.current() {
            Some(record) if json => {
                let entry = DumpEntry {
                    line,
                    record: &record,
                };
                serde_json::to_writer(&mut out, &entry).context("serialize record")?;
                writeln!(out)?;
            }
            Some(record) => writeln!(out, "{}", record.to_line())?,
            None => eprintln!("line {line}: malformed, skipped"),
        }
        if !session.next() {
            break;
        }
    }
    session.close();
    Ok(())
}

fn check(trace: &Path, max_errors: usize) -> anyhow::Result<()> {
    let mut stream =
        RecordStream::open(trace).with_context(|| format!("open trace {}", trace.display()))?;

    let mut malformed = 0usize;
    for item in stream.by_ref() {
        let item = item.with_context(|| format!("read {}", trace.display()))?;
        if let Err(err) = item.record {
            if malformed < max_errors {
                println!("line {}: {err}", item.line);
            }
            malformed += 1;
        }
    }

    println!(
        "checked {} lines, {malformed} malformed",
        stream.lines_read()
    );
    if malformed > 0 {
        bail!("{malformed} malformed line(s) in {}", trace.display());
    }
    Ok(())
}
