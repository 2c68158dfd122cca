use std::io::{self, Write};

use log::debug;

use crate::{
    ast::ASTNode,
    lexer::{CharStream, Lexer, Token},
    parser::Parser,
};

/// Downstream consumer of finished top-level units.
///
/// Redefinitions and call arity belong here: the parser only checks that each
/// unit is well formed on its own.
pub trait Backend {
    fn handle(&mut self, node: ASTNode) -> anyhow::Result<()>;
}

impl Backend for Vec<ASTNode> {
    fn handle(&mut self, node: ASTNode) -> anyhow::Result<()> {
        self.push(node);
        Ok(())
    }
}

/// Acknowledges every unit on `out` and prints its tree.
pub struct Echo<W: Write> {
    out: W,
}

impl<W: Write> Echo<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Backend for Echo<W> {
    fn handle(&mut self, node: ASTNode) -> anyhow::Result<()> {
        let kind = match &node {
            ASTNode::Function(_) => "a function definition",
            ASTNode::Extern(_) => "an extern",
            ASTNode::TopLevel(_) => "a top-level expression",
        };
        writeln!(self.out, "Parsed {}.", kind)?;
        writeln!(self.out, "  {}", node)?;
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Summary {
    pub units: usize,
    pub errors: usize,
}

/// The top-level loop: dispatch, hand off, report, repeat until end of input.
pub struct Driver<W: Write> {
    diagnostics: W,
    prompt: Option<String>,
}

impl<W: Write> Driver<W> {
    pub fn new(diagnostics: W) -> Self {
        Self {
            diagnostics,
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn into_inner(self) -> W {
        self.diagnostics
    }

    fn show_prompt(&mut self) -> io::Result<()> {
        if let Some(prompt) = &self.prompt {
            write!(self.diagnostics, "{}", prompt)?;
            self.diagnostics.flush()?;
        }
        Ok(())
    }

    pub fn run<I, B>(&mut self, parser: &mut Parser<I>, backend: &mut B) -> io::Result<Summary>
    where
        I: CharStream,
        B: Backend,
    {
        let mut summary = Summary::default();

        self.show_prompt()?;
        while let Some(result) = parser.parse_top_level() {
            match result {
                Ok(node) => {
                    debug!("handing off {:?}", node);
                    summary.units += 1;
                    if let Err(err) = backend.handle(node) {
                        summary.errors += 1;
                        writeln!(self.diagnostics, "error: {:#}", err)?;
                    }
                }
                Err(err) => {
                    summary.errors += 1;
                    writeln!(self.diagnostics, "error: {}", err)?;
                }
            }
            self.show_prompt()?;
        }

        debug!("input exhausted: {:?}", summary);
        Ok(summary)
    }

    /// write every token to `out` instead of parsing; lexical errors go to the diagnostics
    pub fn dump_tokens<I, O>(&mut self, lexer: &mut Lexer<I>, out: &mut O) -> io::Result<Summary>
    where
        I: CharStream,
        O: Write,
    {
        let mut summary = Summary::default();
        loop {
            match lexer.next_token() {
                Ok(Token::EndOfInput) => break,
                Ok(token) => {
                    summary.units += 1;
                    writeln!(out, "{:?}", token)?;
                }
                Err(err) => {
                    summary.errors += 1;
                    writeln!(self.diagnostics, "error: {}", err)?;
                }
            }
        }
        Ok(summary)
    }
}
