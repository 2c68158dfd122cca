use std::{
    fs,
    io::{self, IsTerminal},
    process,
};

use anyhow::Context;
use log::info;
use wizarding_front::{
    config::{self, Config},
    lexer::{reader_chars, CharStream, Lexer},
    Driver, Echo, Parser,
};

/// parse (or just lex) everything the lexer yields, returning the number of errors
fn run<I: CharStream>(
    mut lexer: Lexer<I>,
    config: &Config,
    interactive: bool,
) -> anyhow::Result<usize> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut driver = Driver::new(io::stderr());

    let summary = if config.dump_tokens {
        driver.dump_tokens(&mut lexer, &mut out)?
    } else {
        if interactive {
            driver = driver.with_prompt("ready> ");
        }
        let mut parser = Parser::with_precedence(lexer, config.operator_precedence());
        driver.run(&mut parser, &mut Echo::new(out))?
    };

    info!(
        "parsed {} units with {} errors",
        summary.units, summary.errors
    );
    Ok(summary.errors)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = config::app().get_matches();
    let config = Config::from_matches(&matches)?;

    let errors = match &config.input {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            run(Lexer::new(source.chars()), &config, false)?
        }
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            run(Lexer::new(reader_chars(stdin.lock())), &config, interactive)?
        }
    };

    if errors > 0 {
        process::exit(1);
    }
    Ok(())
}
