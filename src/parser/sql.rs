//! Operator-precedence parser for SQL WHERE fragments.
//!
//! A shunting-yard over [`tokenize`] output with an operand stack and an
//! operator stack. A right parenthesis collapses whatever opened it: a
//! group, the argument list of a function call, or the value list of IN.

use super::lexer::{Keyword, Token, TokenKind, tokenize};
use crate::ast::{
    ArithmeticOp, ComparisonOp, Expr, Function, IsOperand, LogicalOp, Parameter, Precedence,
    PropertyRef, Query, TableId,
};
use crate::error::{QueryError, QueryResult};
use crate::pattern::{PatternList, WildcardSyntax};

/// Parse a WHERE clause body against `table`.
///
/// # Example
/// ```
/// use aml_query::ast::Query;
/// use aml_query::parser::sql::parse_where;
///
/// let query = Query::new("Part");
/// let expr = parse_where(&query, query.root(), "[Part].state = 'Released' and cost > 5").unwrap();
/// assert_eq!(expr.to_string(), "t0.state = 'Released' and t0.cost > 5");
/// ```
pub fn parse_where(query: &Query, table: TableId, sql: &str) -> QueryResult<Expr> {
    let tokens = tokenize(sql)?;
    tracing::trace!("Parsing WHERE fragment with {} tokens", tokens.len());
    let mut parser = SqlParser::new(query, table, sql.len());
    parser.feed(&tokens)?;
    parser.finish()
}

/// Parse the body of an IN list (`1, 2, 3` or `'a', 'b'`).
pub fn parse_in_list(query: &Query, table: TableId, body: &str) -> QueryResult<Vec<Expr>> {
    let tokens = tokenize(body)?;
    let mut parser = SqlParser::new(query, table, body.len());
    parser.open(Paren::InList, 0);
    parser.feed(&tokens)?;
    parser.close(body.len())?;
    match parser.finish_operand()? {
        Operand::List(items) => Ok(items),
        _ => Err(QueryError::parse(0, "expected a value list")),
    }
}

/// Split `min and max` at the top-level `and` and parse each side.
pub fn parse_between_range(query: &Query, table: TableId, text: &str) -> QueryResult<(Expr, Expr)> {
    let tokens = tokenize(text)?;
    let mut depth = 0i32;
    let mut split = None;
    for (i, tok) in tokens.iter().enumerate() {
        if tok.is_op("(") {
            depth += 1;
        } else if tok.is_op(")") {
            depth -= 1;
        } else if depth == 0 && tok.is_keyword(Keyword::And) {
            split = Some(i);
            break;
        }
    }
    let split = split.ok_or_else(|| QueryError::parse(0, "between range needs 'and'"))?;
    let min = parse_tokens(query, table, &tokens[..split], tokens[split].offset)?;
    let max = parse_tokens(query, table, &tokens[split + 1..], text.len())?;
    Ok((min, max))
}

/// Parse a single value or expression.
pub fn parse_value(query: &Query, table: TableId, text: &str) -> QueryResult<Expr> {
    parse_where(query, table, text)
}

fn parse_tokens(query: &Query, table: TableId, tokens: &[Token], end: usize) -> QueryResult<Expr> {
    let mut parser = SqlParser::new(query, table, end);
    parser.feed(tokens)?;
    parser.finish()
}

/// Intermediate operand values.
#[derive(Debug)]
enum Operand {
    Expr(Expr),
    Null,
    List(Vec<Expr>),
    /// Bounds of a `between`.
    Range(Expr, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unary {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binary {
    Logical(LogicalOp),
    Compare(ComparisonOp),
    Arithmetic(ArithmeticOp),
    Like { negated: bool },
    In { negated: bool },
    Between { negated: bool },
    BetweenAnd,
    Is { negated: bool },
}

impl Binary {
    fn precedence(self) -> Precedence {
        match self {
            Binary::Logical(op) => op.precedence(),
            Binary::Arithmetic(op) => op.precedence(),
            Binary::BetweenAnd => Precedence::SubComparison,
            _ => Precedence::Comparison,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Paren {
    Group,
    Call(String),
    InList,
}

#[derive(Debug)]
enum StackOp {
    Unary(Unary, usize),
    Binary(Binary, usize),
    /// Open parenthesis with the operand stack height at opening.
    Open(Paren, usize, usize),
}

struct SqlParser<'q> {
    query: &'q Query,
    table: TableId,
    operands: Vec<Operand>,
    operators: Vec<StackOp>,
    /// True when the next token must start an operand.
    expect_operand: bool,
    end: usize,
}

impl<'q> SqlParser<'q> {
    fn new(query: &'q Query, table: TableId, end: usize) -> Self {
        Self {
            query,
            table,
            operands: Vec::new(),
            operators: Vec::new(),
            expect_operand: true,
            end,
        }
    }

    fn feed(&mut self, tokens: &[Token]) -> QueryResult<()> {
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            let next = tokens[i + 1..].iter().find(|t| t.kind != TokenKind::Comment);
            match tok.kind {
                TokenKind::Comment => {}
                TokenKind::String => {
                    self.operand(Operand::Expr(Expr::String(tok.string_value())), tok)?
                }
                TokenKind::Number => {
                    let value = parse_number(tok)?;
                    self.operand(Operand::Expr(value), tok)?;
                }
                TokenKind::Identifier => {
                    if next.is_some_and(|n| n.is_op("(")) {
                        self.require_operand(tok)?;
                        self.open(Paren::Call(tok.text.clone()), tok.offset);
                        i += 1;
                        while tokens[i].kind == TokenKind::Comment {
                            i += 1;
                        }
                    } else {
                        let value = self.identifier(tok)?;
                        self.operand(Operand::Expr(value), tok)?;
                    }
                }
                TokenKind::Keyword(keyword) => self.keyword(keyword, tok)?,
                TokenKind::Operator => self.symbol(tok)?,
            }
            i += 1;
        }
        Ok(())
    }

    fn require_operand(&self, tok: &Token) -> QueryResult<()> {
        if !self.expect_operand {
            return Err(QueryError::parse(
                tok.offset,
                format!("unexpected '{}', expected an operator", tok.text),
            ));
        }
        Ok(())
    }

    fn require_operator(&self, tok: &Token) -> QueryResult<()> {
        if self.expect_operand {
            return Err(QueryError::parse(
                tok.offset,
                format!("unexpected '{}', expected a value", tok.text),
            ));
        }
        Ok(())
    }

    fn operand(&mut self, value: Operand, tok: &Token) -> QueryResult<()> {
        self.require_operand(tok)?;
        self.operands.push(value);
        self.expect_operand = false;
        Ok(())
    }

    fn keyword(&mut self, keyword: Keyword, tok: &Token) -> QueryResult<()> {
        let binary = match keyword {
            Keyword::Null => return self.operand(Operand::Null, tok),
            Keyword::Not => {
                self.require_operand(tok)?;
                self.operators.push(StackOp::Unary(Unary::Not, tok.offset));
                return Ok(());
            }
            Keyword::And => Binary::Logical(LogicalOp::And),
            Keyword::Or => Binary::Logical(LogicalOp::Or),
            Keyword::In => Binary::In { negated: false },
            Keyword::NotIn => Binary::In { negated: true },
            Keyword::Like => Binary::Like { negated: false },
            Keyword::NotLike => Binary::Like { negated: true },
            Keyword::Between => Binary::Between { negated: false },
            Keyword::NotBetween => Binary::Between { negated: true },
            Keyword::BetweenAnd => Binary::BetweenAnd,
            Keyword::Is => Binary::Is { negated: false },
            Keyword::IsNot => Binary::Is { negated: true },
        };
        self.binary(binary, tok)
    }

    fn symbol(&mut self, tok: &Token) -> QueryResult<()> {
        match tok.text.as_str() {
            "(" => {
                self.require_operand(tok)?;
                let in_list = matches!(
                    self.operators.last(),
                    Some(StackOp::Binary(Binary::In { .. }, _))
                );
                self.open(if in_list { Paren::InList } else { Paren::Group }, tok.offset);
                Ok(())
            }
            ")" => self.close(tok.offset),
            "," => {
                self.require_operator(tok)?;
                self.reduce_to_paren(tok.offset)?;
                match self.operators.last() {
                    Some(StackOp::Open(Paren::Call(_) | Paren::InList, _, _)) => {
                        self.expect_operand = true;
                        Ok(())
                    }
                    _ => Err(QueryError::parse(tok.offset, "',' outside of a list")),
                }
            }
            ";" => Err(QueryError::unsupported("multiple statements")),
            "-" | "+" if self.expect_operand => {
                if tok.text == "-" {
                    self.operators.push(StackOp::Unary(Unary::Negate, tok.offset));
                }
                Ok(())
            }
            "*" if self.expect_operand => {
                self.operand(
                    Operand::Expr(Expr::AllProperties {
                        table: self.table,
                        extended: false,
                    }),
                    tok,
                )
            }
            text => {
                if let Some(op) = ComparisonOp::from_symbol(text) {
                    self.binary(Binary::Compare(op), tok)
                } else if let Some(op) = ArithmeticOp::from_symbol(text) {
                    self.binary(Binary::Arithmetic(op), tok)
                } else {
                    Err(QueryError::parse(
                        tok.offset,
                        format!("unexpected character '{}'", text),
                    ))
                }
            }
        }
    }

    fn open(&mut self, paren: Paren, offset: usize) {
        self.operators
            .push(StackOp::Open(paren, self.operands.len(), offset));
        self.expect_operand = true;
    }

    fn close(&mut self, offset: usize) -> QueryResult<()> {
        let empty_list = self.expect_operand
            && matches!(
                self.operators.last(),
                Some(StackOp::Open(_, height, _)) if *height == self.operands.len()
            );
        if !empty_list {
            if self.expect_operand {
                return Err(QueryError::parse(offset, "unexpected ')'"));
            }
            self.reduce_to_paren(offset)?;
        }
        let Some(StackOp::Open(paren, height, _)) = self.operators.pop() else {
            return Err(QueryError::parse(offset, "unbalanced ')'"));
        };
        let items: Vec<Operand> = self.operands.split_off(height);
        let value = match paren {
            Paren::Group => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(single), None) => single,
                    _ => return Err(QueryError::parse(offset, "expected one expression in parentheses")),
                }
            }
            Paren::InList => Operand::List(
                items
                    .into_iter()
                    .map(|o| into_expr(o, offset))
                    .collect::<QueryResult<_>>()?,
            ),
            Paren::Call(name) => {
                let args = items
                    .into_iter()
                    .map(|o| into_expr(o, offset))
                    .collect::<QueryResult<Vec<_>>>()?;
                Operand::Expr(sql_function(&name, args)?)
            }
        };
        self.operands.push(value);
        self.expect_operand = false;
        Ok(())
    }

    fn binary(&mut self, op: Binary, tok: &Token) -> QueryResult<()> {
        self.require_operator(tok)?;
        let precedence = op.precedence();
        while let Some(top) = self.operators.last() {
            let top_precedence = match top {
                StackOp::Unary(Unary::Not, _) => Precedence::Not,
                StackOp::Unary(Unary::Negate, _) => Precedence::Negation,
                StackOp::Binary(b, _) => b.precedence(),
                StackOp::Open(..) => break,
            };
            if top_precedence < precedence {
                break;
            }
            self.reduce_one()?;
        }
        self.operators.push(StackOp::Binary(op, tok.offset));
        self.expect_operand = true;
        Ok(())
    }

    fn reduce_to_paren(&mut self, offset: usize) -> QueryResult<()> {
        loop {
            match self.operators.last() {
                Some(StackOp::Open(..)) => return Ok(()),
                Some(_) => self.reduce_one()?,
                None => return Err(QueryError::parse(offset, "unbalanced ')'")),
            }
        }
    }

    fn pop_operand(&mut self, offset: usize) -> QueryResult<Operand> {
        self.operands
            .pop()
            .ok_or_else(|| QueryError::parse(offset, "missing operand"))
    }

    fn reduce_one(&mut self) -> QueryResult<()> {
        let Some(op) = self.operators.pop() else {
            return Ok(());
        };
        let result = match op {
            StackOp::Open(_, _, offset) => {
                return Err(QueryError::parse(offset, "unbalanced '('"));
            }
            StackOp::Unary(unary, offset) => {
                let inner = into_expr(self.pop_operand(offset)?, offset)?;
                match unary {
                    Unary::Not => Expr::Not(Box::new(inner)),
                    Unary::Negate => Expr::Negate(Box::new(inner)),
                }
            }
            StackOp::Binary(binary, offset) => {
                let right = self.pop_operand(offset)?;
                let left = self.pop_operand(offset)?;
                if binary == Binary::BetweenAnd {
                    let min = into_expr(left, offset)?;
                    let max = into_expr(right, offset)?;
                    self.operands.push(Operand::Range(min, max));
                    return Ok(());
                }
                let left = Box::new(into_expr(left, offset)?);
                combine(binary, left, right, offset)?
            }
        };
        self.operands.push(Operand::Expr(result));
        Ok(())
    }

    fn finish_operand(mut self) -> QueryResult<Operand> {
        if self.expect_operand && !self.operators.is_empty() {
            return Err(QueryError::parse(self.end, "unexpected end of input"));
        }
        while !self.operators.is_empty() {
            self.reduce_one()?;
        }
        let result = self
            .operands
            .pop()
            .ok_or_else(|| QueryError::parse(self.end, "empty expression"))?;
        if !self.operands.is_empty() {
            return Err(QueryError::parse(self.end, "expected an operator"));
        }
        Ok(result)
    }

    fn finish(self) -> QueryResult<Expr> {
        let end = self.end;
        into_expr(self.finish_operand()?, end)
    }

    fn identifier(&self, tok: &Token) -> QueryResult<Expr> {
        if let Some(name) = tok.text.strip_prefix('@').or_else(|| tok.text.strip_prefix(':')) {
            return Ok(Expr::Parameter(Parameter::named(name)));
        }
        if tok.text.eq_ignore_ascii_case("true") {
            return Ok(Expr::Bool(true));
        }
        if tok.text.eq_ignore_ascii_case("false") {
            return Ok(Expr::Bool(false));
        }
        let segments = tok.segments();
        let name = match segments.as_slice() {
            [name] => name.clone(),
            [owner, name] if self.is_own_table(owner) => name.clone(),
            _ => {
                tracing::debug!("Rejected property reference '{}'", tok.text);
                return Err(QueryError::unsupported(format!(
                    "property reference '{}' does not refer to the current table",
                    tok.text
                )));
            }
        };
        if name == "*" {
            return Ok(Expr::AllProperties {
                table: self.table,
                extended: false,
            });
        }
        Ok(Expr::Property(PropertyRef::new(self.table, name)))
    }

    fn is_own_table(&self, owner: &str) -> bool {
        let canonical = |s: &str| s.to_ascii_lowercase().replace(' ', "_");
        let owner = canonical(owner);
        if owner == "innovator" {
            return true;
        }
        let Some(item) = self.query.get(self.table) else {
            return false;
        };
        item.type_name.as_deref().map(canonical) == Some(owner.clone())
            || item.alias.as_deref().map(canonical) == Some(owner)
    }
}

fn into_expr(operand: Operand, offset: usize) -> QueryResult<Expr> {
    match operand {
        Operand::Expr(e) => Ok(e),
        Operand::List(items) => Ok(Expr::List(items)),
        Operand::Null => Err(QueryError::unsupported("null outside of 'is null'")),
        Operand::Range(..) => Err(QueryError::parse(offset, "'and' range outside of between")),
    }
}

fn combine(binary: Binary, left: Box<Expr>, right: Operand, offset: usize) -> QueryResult<Expr> {
    Ok(match binary {
        Binary::Logical(op) => Expr::Logical {
            op,
            left,
            right: Box::new(into_expr(right, offset)?),
        },
        Binary::Compare(op) => {
            if matches!(right, Operand::Null) {
                return Err(QueryError::unsupported(format!(
                    "comparison '{}' with null",
                    op
                )));
            }
            Expr::Comparison {
                op,
                left,
                right: Box::new(into_expr(right, offset)?),
            }
        }
        Binary::Arithmetic(op) => Expr::Arithmetic {
            op,
            left,
            right: Box::new(into_expr(right, offset)?),
        },
        Binary::Like { negated } => {
            let pattern = match into_expr(right, offset)? {
                Expr::String(s) => {
                    Expr::Pattern(PatternList::parse_wildcard(&s, &WildcardSyntax::SQL_SERVER)?)
                }
                other => other,
            };
            Expr::Like {
                left,
                pattern: Box::new(pattern),
                negated,
            }
        }
        Binary::In { negated } => {
            let list = match right {
                Operand::List(items) => items,
                Operand::Expr(Expr::List(items)) => items,
                Operand::Expr(single) => vec![single],
                _ => return Err(QueryError::parse(offset, "'in' needs a value list")),
            };
            Expr::In {
                left,
                list,
                negated,
                table: None,
            }
        }
        Binary::Between { negated } => match right {
            Operand::Range(min, max) => Expr::Between {
                left,
                min: Box::new(min),
                max: Box::new(max),
                negated,
                table: None,
            },
            _ => return Err(QueryError::parse(offset, "'between' needs 'and'")),
        },
        Binary::Is { negated } => match right {
            Operand::Null => Expr::Is {
                left,
                operand: if negated {
                    IsOperand::NotNull
                } else {
                    IsOperand::Null
                },
            },
            _ => return Err(QueryError::unsupported("'is' only supports null")),
        },
        Binary::BetweenAnd => return Err(QueryError::parse(offset, "'and' range outside of between")),
    })
}

fn parse_number(tok: &Token) -> QueryResult<Expr> {
    let text = tok.text.as_str();
    if !text.contains(['.', 'e', 'E']) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Expr::Integer(n));
        }
    }
    text.parse::<f64>()
        .map(Expr::Float)
        .map_err(|_| QueryError::parse(tok.offset, format!("invalid number '{}'", text)))
}

/// Map a SQL Server function call onto [`Function`].
fn sql_function(name: &str, mut args: Vec<Expr>) -> QueryResult<Expr> {
    let lower = name.to_ascii_lowercase();
    let unit = |args: &mut Vec<Expr>| -> QueryResult<String> {
        if args.is_empty() {
            return Err(QueryError::unsupported(format!("{} without arguments", name)));
        }
        match args.remove(0) {
            Expr::Property(p) => Ok(p.name.to_ascii_lowercase()),
            Expr::String(s) => Ok(s.to_ascii_lowercase()),
            other => Err(QueryError::unsupported(format!(
                "date part '{}' in {}",
                other, name
            ))),
        }
    };
    let func = match lower.as_str() {
        "getdate" | "current_timestamp" | "sysdatetime" => Function::CurrentDateTime,
        "getutcdate" | "sysutcdatetime" => Function::CurrentUtcDateTime,
        "len" | "length" => Function::Length,
        "lower" => Function::ToLower,
        "upper" => Function::ToUpper,
        "trim" | "ltrim" | "rtrim" => Function::Trim,
        "substring" => {
            if args.len() == 3 {
                let start = args.remove(1);
                let zero_based = Expr::Arithmetic {
                    op: ArithmeticOp::Sub,
                    left: Box::new(start),
                    right: Box::new(Expr::Integer(1)),
                };
                args.insert(1, zero_based);
            }
            Function::Substring
        }
        "charindex" => {
            if args.len() != 2 {
                return Err(QueryError::unsupported("charindex with a start position"));
            }
            args.swap(0, 1);
            return Ok(Expr::Arithmetic {
                op: ArithmeticOp::Add,
                left: Box::new(Expr::Function {
                    func: Function::IndexOf,
                    args,
                }),
                right: Box::new(Expr::Integer(1)),
            });
        }
        "year" => Function::Year,
        "month" => Function::Month,
        "day" => Function::Day,
        "datepart" => match unit(&mut args)?.as_str() {
            "year" | "yyyy" | "yy" => Function::Year,
            "month" | "mm" | "m" => Function::Month,
            "day" | "dd" | "d" => Function::Day,
            "hour" | "hh" => Function::Hour,
            "minute" | "mi" | "n" => Function::Minute,
            "second" | "ss" | "s" => Function::Second,
            other => return Err(QueryError::unsupported(format!("datepart '{}'", other))),
        },
        "dateadd" => {
            let func = match unit(&mut args)?.as_str() {
                "day" | "dd" | "d" => Function::AddDays,
                "hour" | "hh" => Function::AddHours,
                "minute" | "mi" | "n" => Function::AddMinutes,
                other => return Err(QueryError::unsupported(format!("dateadd '{}'", other))),
            };
            // dateadd(unit, n, date) -> addDays(date, n)
            args.reverse();
            func
        }
        "datediff" => match unit(&mut args)?.as_str() {
            "day" | "dd" | "d" => Function::DiffDays,
            other => return Err(QueryError::unsupported(format!("datediff '{}'", other))),
        },
        _ => Function::from_name(name),
    };
    Ok(Expr::Function { func, args })
}
