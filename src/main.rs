//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{anyhow, bail, Context};
use clap::{crate_version, Arg, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use snlc::{
    codegen::{self, Listing, Options},
    error::Diagnostics,
    fold, ir, parse,
};

use std::{
    fmt::Display,
    fs::File,
    io::{self, BufRead, BufReader, Read, Write},
};

fn main() -> anyhow::Result<()> {
    // Los avisos se muestran aunque RUST_LOG no esté definido
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = Command::new("SNL compiler")
        .version(crate_version!())
        .arg(
            Arg::new("optimize")
                .short('O')
                .help("Fold constants before generating code"),
        )
        .arg(
            Arg::new("asm")
                .short('S')
                .help("Generate assembly (default)"),
        )
        .arg(
            Arg::new("run")
                .short('r')
                .long("run")
                .conflicts_with("asm")
                .help("Run the program in the built-in simulator, reading integers from stdin"),
        )
        .arg(
            Arg::new("ir")
                .long("ir")
                .conflicts_with_all(&["asm", "run"])
                .help("Print the quadruple table instead of assembly"),
        )
        .arg(
            Arg::new("annotate")
                .long("annotate")
                .help("Precede the instructions of each quadruple with a comment"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .required(true)
                .help("SNL source file"),
        )
        .get_matches();

    let path = args.value_of("source").context("Missing source file")?;
    let file = File::open(path).with_context(|| format!("Failed to open for reading: {}", path))?;

    let mut log = io::stderr();
    let quads = compile(BufReader::new(file), path, args.is_present("optimize"), &mut log)?;

    if args.is_present("ir") {
        let table = ir::Listing(&quads).to_string();
        return write_output(&args, table.as_bytes());
    }

    let mut options = Options::empty();
    if args.is_present("annotate") {
        options |= Options::ANNOTATE;
    }

    let listing = assemble(&quads, options, path, &mut log)?;

    if !args.is_present("run") {
        return write_output(&args, listing.to_string().as_bytes());
    }

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read program input from stdin")?;

    let input = input
        .split_whitespace()
        .map(|word| word.parse::<i32>().with_context(|| format!("Bad integer input: {}", word)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let exit = runtime::run(&listing.to_string(), input).context("Program failed")?;
    write_output(&args, exit.output.as_bytes())
}

/// Fases delanteras y, opcionalmente, plegado de constantes.
fn compile<R, L>(reader: R, path: &str, optimize: bool, log: &mut L) -> anyhow::Result<Vec<ir::Quadruple>>
where
    R: BufRead,
    L: Write,
{
    let program = match parse::from_reader(reader, path) {
        Ok(program) => program,
        Err(diagnostics) => fail(diagnostics, path)?,
    };

    let analysis = program.analyze();
    if !analysis.is_ok() {
        return fail(Diagnostics::from(analysis.errors), path);
    }

    if !optimize {
        return Ok(analysis.quads);
    }

    let folded = fold::fold(&analysis.quads);
    warn(&folded.warnings, log)?;

    Ok(folded.quads)
}

fn assemble<L: Write>(
    quads: &[ir::Quadruple],
    options: Options,
    path: &str,
    log: &mut L,
) -> anyhow::Result<Listing> {
    let listing = codegen::generate(quads, options)
        .map_err(|error| anyhow!("{}", error))
        .with_context(|| format!("Failed to generate code: {}", path))?;

    warn(listing.warnings(), log)?;
    Ok(listing)
}

/// Los avisos no detienen la compilación, pero siempre se reportan.
fn warn<W: Display, L: Write>(warnings: &[W], log: &mut L) -> anyhow::Result<()> {
    for warning in warnings {
        writeln!(log, "warning: {}", warning).context("Failed to write warnings")?;
    }

    Ok(())
}

fn fail<T>(diagnostics: Diagnostics, path: &str) -> anyhow::Result<T> {
    // Diagnostics no es Send, se imprime antes de abortar
    eprint!("{}", diagnostics);
    bail!("Failed to compile: {}", path)
}

fn write_output(args: &ArgMatches, bytes: &[u8]) -> anyhow::Result<()> {
    match args.value_of("output") {
        // Salida a stdout
        None | Some("-") => io::stdout()
            .write_all(bytes)
            .context("Failed to write to stdout"),

        // Salida a archivo
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            file.write_all(bytes)
                .with_context(|| format!("Failed to write to file: {}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snlc::ir::{Operand, Operator, Quadruple, Temp};

    #[test]
    fn fold_warnings_are_logged() {
        let source = "program q var integer x, y; begin read(y); x := y / 0 end.";

        let mut log = Vec::new();
        compile(source.as_bytes(), "warn.snl", true, &mut log).unwrap();
        let log = String::from_utf8(log).unwrap();
        assert!(log.starts_with("warning: Division by zero in quadruple"), "{}", log);
        assert_eq!(log.lines().count(), 1);

        let mut log = Vec::new();
        compile(source.as_bytes(), "warn.snl", false, &mut log).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn lost_temporaries_are_logged() {
        let mut quads: Vec<_> = (1..=11)
            .map(|n| Quadruple::new(Operator::Assign, Operand::Int(n), Operand::None, Operand::Temp(Temp(n as u32))))
            .collect();

        quads.push(Quadruple::new(Operator::Output, Operand::Temp(Temp(1)), Operand::None, Operand::None));

        let mut log = Vec::new();
        assemble(&quads, Options::empty(), "lost.snl", &mut log).unwrap();

        let log = String::from_utf8(log).unwrap();
        assert!(log.starts_with("warning: Temporary `t1` was evicted"), "{}", log);
    }
}
