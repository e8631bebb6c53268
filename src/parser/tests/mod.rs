mod aml;
mod lexer;
mod query_definition;
mod sql;
