pub mod ast;
pub mod config;
pub mod driver;
pub mod lexer;
pub mod parser;

pub use ast::{ASTNode, Expression, Function, Prototype};
pub use driver::{Backend, Driver, Echo, Summary};
pub use lexer::{CharStream, LexError, Lexer, Token};
pub use parser::{parse_str, Parser, ParserError};
