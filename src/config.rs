use std::{collections::HashMap, path::PathBuf};

use clap::{App, Arg, ArgMatches};
use lazy_static::lazy_static;
use regex::Regex;

use crate::parser::default_precedence;

lazy_static! {
    static ref PRECEDENCE_RE: Regex = Regex::new(r"^(?P<op>\S)=(?P<precedence>\d+)$").unwrap();
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid precedence `{0}`, expected OP=N such as `^=60`")]
    InvalidPrecedence(String),
    #[error("`{0}` cannot be used as a binary operator")]
    ReservedOperator(char),
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct Config {
    pub input: Option<PathBuf>,
    pub dump_tokens: bool,
    pub precedence: Vec<(char, u32)>,
}

pub fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("wizarding-front")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("input")
                .value_name("FILE")
                .help("source file to parse, reads stdin when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("tokens")
                .long("tokens")
                .help("print the token stream instead of parsing"),
        )
        .arg(
            Arg::with_name("precedence")
                .short("p")
                .long("precedence")
                .value_name("OP=N")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("add or override a binary operator precedence"),
        )
}

/// parse an `OP=N` precedence override
pub fn parse_precedence(input: &str) -> Result<(char, u32), ConfigError> {
    let invalid = || ConfigError::InvalidPrecedence(input.to_string());

    let cap = PRECEDENCE_RE.captures(input).ok_or_else(invalid)?;
    let op = cap["op"].chars().next().ok_or_else(invalid)?;
    let precedence = cap["precedence"].parse().map_err(|_| invalid())?;

    // these never reach the parser as operators, or would break calls and grouping
    if op.is_alphanumeric() || "(),;#.".contains(op) {
        return Err(ConfigError::ReservedOperator(op));
    }

    Ok((op, precedence))
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        let precedence = match matches.values_of("precedence") {
            Some(values) => values.map(parse_precedence).collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            input: matches.value_of_os("input").map(PathBuf::from),
            dump_tokens: matches.is_present("tokens"),
            precedence,
        })
    }

    /// the default table with this config's overrides applied
    pub fn operator_precedence(&self) -> HashMap<char, u32> {
        let mut operator_precedence = default_precedence();
        operator_precedence.extend(self.precedence.iter().copied());
        operator_precedence
    }
}
