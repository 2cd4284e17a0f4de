//! Recursive-descent parser from MUQL tokens to [`super::ast::Query`]
//! (SPEC_FULL.md §4.5). Syntax errors carry line/column; semantic errors
//! (unknown node kind, unknown field, incompatible comparator) carry the
//! offending token (SPEC_FULL.md §4.5 "Error surface").

use super::ast::*;
use super::lexer::{lex, Token, TokenKind};
use crate::model::EdgeKind;

#[derive(Debug, Clone)]
pub struct MuqlError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl std::fmt::Display for MuqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for MuqlError {}

/// Default bound when `PATH ... MAX DEPTH` is omitted.
const DEFAULT_PATH_DEPTH: usize = 10;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

pub fn parse(input: &str) -> Result<Query, MuqlError> {
    let tokens = lex(input).map_err(|e| MuqlError { line: e.line, col: e.col, message: e.message })?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> MuqlError {
        let tok = self.peek();
        MuqlError { line: tok.line, col: tok.col, message: message.into() }
    }

    fn expect_eof(&self) -> Result<(), MuqlError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing input {:?}", self.peek().kind)))
        }
    }

    /// Consumes an identifier token, case-insensitively comparing against
    /// `word`. Does not advance on mismatch.
    fn eat_keyword(&mut self, word: &str) -> bool {
        if let TokenKind::Ident(s) = &self.peek().kind {
            if s.eq_ignore_ascii_case(word) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), MuqlError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.err(format!("expected {word:?}, found {:?}", self.peek().kind)))
        }
    }

    fn ident(&mut self) -> Result<String, MuqlError> {
        match self.advance().kind {
            TokenKind::Ident(s) => Ok(s),
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn peek_ident_is(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(s) if s.eq_ignore_ascii_case(word))
    }

    fn parse_query(&mut self) -> Result<Query, MuqlError> {
        if self.peek_ident_is("select") {
            self.advance();
            return Ok(Query::Select(self.parse_select()?));
        }
        if self.peek_ident_is("show") {
            self.advance();
            return Ok(Query::Show(self.parse_show()?));
        }
        if self.peek_ident_is("find") {
            self.advance();
            return Ok(Query::Find(self.parse_find()?));
        }
        if self.peek_ident_is("path") {
            self.advance();
            return Ok(Query::Path(self.parse_path()?));
        }
        if self.peek_ident_is("analyze") || self.peek_ident_is("analyse") {
            self.advance();
            return Ok(Query::Analyze(self.parse_analyze()?));
        }
        Err(self.err(format!(
            "expected one of SELECT/SHOW/FIND/PATH/ANALYZE, found {:?}",
            self.peek().kind
        )))
    }

    // ---- SELECT --------------------------------------------------------

    fn parse_select(&mut self) -> Result<SelectQuery, MuqlError> {
        let fields = self.parse_field_list()?;
        self.expect_keyword("from")?;
        let from = self.parse_node_kind()?;

        let where_ = if self.peek_ident_is("where") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.peek_ident_is("order") {
            self.advance();
            self.expect_keyword("by")?;
            loop {
                let field = self.ident()?;
                let dir = if self.peek_ident_is("desc") {
                    self.advance();
                    SortDir::Desc
                } else if self.peek_ident_is("asc") {
                    self.advance();
                    SortDir::Asc
                } else {
                    SortDir::Asc
                };
                order_by.push((field, dir));
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }

        let limit = if self.peek_ident_is("limit") {
            self.advance();
            Some(self.parse_number()? as usize)
        } else {
            None
        };

        Ok(SelectQuery { fields, from, where_, order_by, limit })
    }

    fn parse_field_list(&mut self) -> Result<Vec<Field>, MuqlError> {
        let mut fields = Vec::new();
        loop {
            fields.push(self.parse_field()?);
            if matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<Field, MuqlError> {
        if matches!(self.peek().kind, TokenKind::Star) {
            self.advance();
            return Ok(Field::Star);
        }
        for (word, func) in [
            ("count", AggFunc::Count),
            ("avg", AggFunc::Avg),
            ("min", AggFunc::Min),
            ("max", AggFunc::Max),
            ("sum", AggFunc::Sum),
        ] {
            if self.peek_ident_is(word) {
                // Lookahead for `(` to disambiguate from a field literally named e.g. "count".
                let save = self.pos;
                self.advance();
                if matches!(self.peek().kind, TokenKind::LParen) {
                    self.advance();
                    let field = if matches!(self.peek().kind, TokenKind::Star) {
                        self.advance();
                        AggField::Star
                    } else {
                        AggField::Name(self.ident()?)
                    };
                    if !matches!(self.peek().kind, TokenKind::RParen) {
                        return Err(self.err("expected ')' closing aggregate"));
                    }
                    self.advance();
                    return Ok(Field::Aggregate(func, field));
                }
                self.pos = save;
            }
        }
        Ok(Field::Name(self.ident()?))
    }

    fn parse_node_kind(&mut self) -> Result<NodeKindFilter, MuqlError> {
        let word = self.ident()?;
        match word.to_ascii_lowercase().as_str() {
            "modules" => Ok(NodeKindFilter::Modules),
            "classes" => Ok(NodeKindFilter::Classes),
            "functions" => Ok(NodeKindFilter::Functions),
            "methods" => Ok(NodeKindFilter::Methods),
            "nodes" => Ok(NodeKindFilter::Nodes),
            other => Err(self.err(format!("unknown node kind {other:?}"))),
        }
    }

    // ---- WHERE expressions ---------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, MuqlError> {
        let mut left = self.parse_and_expr()?;
        while self.peek_ident_is("or") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, MuqlError> {
        let mut left = Expr::Cmp(self.parse_condition()?);
        while self.peek_ident_is("and") {
            self.advance();
            let right = Expr::Cmp(self.parse_condition()?);
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_condition(&mut self) -> Result<Condition, MuqlError> {
        let field = self.ident()?;

        if self.peek_ident_is("not") {
            self.advance();
            self.expect_keyword("in")?;
            let value = self.parse_value_list()?;
            return Ok(Condition { field, op: CompareOp::NotIn, value });
        }
        if self.peek_ident_is("in") {
            self.advance();
            let value = self.parse_value_list()?;
            return Ok(Condition { field, op: CompareOp::In, value });
        }
        if self.peek_ident_is("like") {
            self.advance();
            let value = self.parse_value()?;
            return Ok(Condition { field, op: CompareOp::Like, value });
        }
        if self.peek_ident_is("contains") {
            self.advance();
            let value = self.parse_value()?;
            return Ok(Condition { field, op: CompareOp::Contains, value });
        }

        let op = match self.advance().kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Neq => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Lte => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Gte => CompareOp::Ge,
            other => return Err(self.err(format!("expected comparator, found {other:?}"))),
        };
        let value = self.parse_value()?;

        if matches!(value, Value::Null) && !matches!(op, CompareOp::Eq | CompareOp::Ne) {
            return Err(self.err("null is only valid in equality comparisons"));
        }

        Ok(Condition { field, op, value })
    }

    fn parse_value_list(&mut self) -> Result<Value, MuqlError> {
        if !matches!(self.peek().kind, TokenKind::LParen) {
            return Err(self.err("expected '(' starting value list"));
        }
        self.advance();
        let mut values = Vec::new();
        if !matches!(self.peek().kind, TokenKind::RParen) {
            loop {
                values.push(self.parse_value()?);
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        if !matches!(self.peek().kind, TokenKind::RParen) {
            return Err(self.err("expected ')' closing value list"));
        }
        self.advance();
        Ok(Value::List(values))
    }

    fn parse_value(&mut self) -> Result<Value, MuqlError> {
        match self.advance().kind {
            TokenKind::String(s) => Ok(Value::Str(s)),
            TokenKind::Number(n) => Ok(Value::Num(n)),
            TokenKind::Ident(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            TokenKind::Ident(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            TokenKind::Ident(s) if s.eq_ignore_ascii_case("null") => Ok(Value::Null),
            other => Err(self.err(format!("expected literal value, found {other:?}"))),
        }
    }

    fn parse_number(&mut self) -> Result<f64, MuqlError> {
        match self.advance().kind {
            TokenKind::Number(n) => Ok(n),
            other => Err(self.err(format!("expected number, found {other:?}"))),
        }
    }

    fn parse_string(&mut self) -> Result<String, MuqlError> {
        match self.advance().kind {
            TokenKind::String(s) => Ok(s),
            TokenKind::Ident(s) => Ok(s),
            other => Err(self.err(format!("expected string or identifier, found {other:?}"))),
        }
    }

    // ---- SHOW ------------------------------------------------------------

    fn parse_show(&mut self) -> Result<ShowQuery, MuqlError> {
        let word = self.ident()?;
        let kind = match word.to_ascii_lowercase().as_str() {
            "dependencies" => ShowKind::Dependencies,
            "dependents" => ShowKind::Dependents,
            "callers" => ShowKind::Callers,
            "callees" => ShowKind::Callees,
            "inheritance" => ShowKind::Inheritance,
            "implementations" => ShowKind::Implementations,
            "children" => ShowKind::Children,
            "parents" => ShowKind::Parents,
            other => return Err(self.err(format!("unknown SHOW kind {other:?}"))),
        };
        self.expect_keyword("of")?;
        let reference = self.parse_string()?;
        let depth = if self.peek_ident_is("depth") {
            self.advance();
            Some(self.parse_number()? as usize)
        } else {
            None
        };
        Ok(ShowQuery { kind, reference, depth })
    }

    // ---- FIND --------------------------------------------------------

    fn parse_find(&mut self) -> Result<FindQuery, MuqlError> {
        let kind = self.parse_node_kind()?;

        macro_rules! two_word {
            ($a:literal, $b:literal, $variant:ident) => {
                if self.peek_ident_is($a) {
                    let save = self.pos;
                    self.advance();
                    if self.peek_ident_is($b) {
                        self.advance();
                        let r = self.parse_string()?;
                        return Ok(FindQuery { kind, predicate: FindPredicate::$variant(r) });
                    }
                    self.pos = save;
                }
            };
        }

        two_word!("called", "by", CalledBy);
        two_word!("imported", "by", ImportedBy);

        if self.peek_ident_is("calling") {
            self.advance();
            return Ok(FindQuery { kind, predicate: FindPredicate::Calling(self.parse_string()?) });
        }
        if self.peek_ident_is("importing") {
            self.advance();
            return Ok(FindQuery { kind, predicate: FindPredicate::Importing(self.parse_string()?) });
        }
        if self.peek_ident_is("inheriting") {
            self.advance();
            return Ok(FindQuery { kind, predicate: FindPredicate::Inheriting(self.parse_string()?) });
        }
        if self.peek_ident_is("implementing") {
            self.advance();
            return Ok(FindQuery { kind, predicate: FindPredicate::Implementing(self.parse_string()?) });
        }
        if self.peek_ident_is("mutating") {
            self.advance();
            return Ok(FindQuery { kind, predicate: FindPredicate::Mutating(self.parse_string()?) });
        }
        if self.peek_ident_is("with") {
            self.advance();
            if self.peek_ident_is("decorator") {
                self.advance();
                return Ok(FindQuery { kind, predicate: FindPredicate::WithDecorator(self.parse_string()?) });
            }
            if self.peek_ident_is("annotation") {
                self.advance();
                return Ok(FindQuery { kind, predicate: FindPredicate::WithAnnotation(self.parse_string()?) });
            }
            return Err(self.err("expected DECORATOR or ANNOTATION after WITH"));
        }
        if self.peek_ident_is("matching") {
            self.advance();
            return Ok(FindQuery { kind, predicate: FindPredicate::Matching(self.parse_string()?) });
        }
        if self.peek_ident_is("similar") {
            self.advance();
            self.expect_keyword("to")?;
            return Ok(FindQuery { kind, predicate: FindPredicate::SimilarTo(self.parse_string()?) });
        }

        Err(self.err(format!("unknown FIND predicate starting at {:?}", self.peek().kind)))
    }

    // ---- PATH --------------------------------------------------------

    fn parse_path(&mut self) -> Result<PathQuery, MuqlError> {
        self.expect_keyword("from")?;
        let from = self.parse_string()?;
        self.expect_keyword("to")?;
        let to = self.parse_string()?;

        let mut max_depth = DEFAULT_PATH_DEPTH;
        if self.peek_ident_is("max") {
            self.advance();
            self.expect_keyword("depth")?;
            max_depth = self.parse_number()? as usize;
        }

        let mut via = None;
        if self.peek_ident_is("via") {
            self.advance();
            let word = self.ident()?;
            via = Some(word.parse::<EdgeKind>().map_err(|e| self.err(e))?);
        }

        Ok(PathQuery { from, to, max_depth, via })
    }

    // ---- ANALYZE --------------------------------------------------------

    fn parse_analyze(&mut self) -> Result<AnalyzeQuery, MuqlError> {
        let word = self.ident()?;
        let kind = match word.to_ascii_lowercase().as_str() {
            "coupling" => AnalysisKind::Coupling,
            "cohesion" => AnalysisKind::Cohesion,
            "complexity" => AnalysisKind::Complexity,
            "hotspots" => AnalysisKind::Hotspots,
            "circular" => AnalysisKind::Circular,
            "unused" => AnalysisKind::Unused,
            "impact" => AnalysisKind::Impact,
            other => return Err(self.err(format!("unknown ANALYZE kind {other:?}"))),
        };
        let for_ref = if self.peek_ident_is("for") {
            self.advance();
            Some(self.parse_string()?)
        } else {
            None
        };
        Ok(AnalyzeQuery { kind, for_ref })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_with_where_order_limit() {
        let q = parse("SELECT name FROM functions WHERE complexity > 20 ORDER BY complexity DESC LIMIT 3").unwrap();
        let Query::Select(sel) = q else { panic!("expected select") };
        assert_eq!(sel.from, NodeKindFilter::Functions);
        assert_eq!(sel.limit, Some(3));
        assert_eq!(sel.order_by, vec![("complexity".to_string(), SortDir::Desc)]);
        assert!(matches!(sel.where_, Some(Expr::Cmp(Condition { op: CompareOp::Gt, .. }))));
    }

    #[test]
    fn parses_show_of_with_depth() {
        let q = parse("SHOW dependents OF 'module:src/a.py' DEPTH 2").unwrap();
        let Query::Show(show) = q else { panic!("expected show") };
        assert_eq!(show.kind, ShowKind::Dependents);
        assert_eq!(show.depth, Some(2));
    }

    #[test]
    fn parses_find_calling() {
        let q = parse("FIND functions CALLING 'foo'").unwrap();
        let Query::Find(find) = q else { panic!("expected find") };
        assert_eq!(find.predicate, FindPredicate::Calling("foo".to_string()));
    }

    #[test]
    fn parses_path_with_via() {
        let q = parse("PATH FROM 'a' TO 'b' MAX DEPTH 5 VIA calls").unwrap();
        let Query::Path(p) = q else { panic!("expected path") };
        assert_eq!(p.max_depth, 5);
        assert_eq!(p.via, Some(EdgeKind::Calls));
    }

    #[test]
    fn parses_analyze_for() {
        let q = parse("ANALYZE impact FOR 'a'").unwrap();
        let Query::Analyze(a) = q else { panic!("expected analyze") };
        assert_eq!(a.kind, AnalysisKind::Impact);
        assert_eq!(a.for_ref, Some("a".to_string()));
    }

    #[test]
    fn strips_comments() {
        let q = parse("SELECT * FROM modules -- trailing comment\n").unwrap();
        assert!(matches!(q, Query::Select(_)));
    }

    #[test]
    fn rejects_null_with_inequality() {
        let err = parse("SELECT * FROM functions WHERE complexity > null").unwrap_err();
        assert!(err.message.contains("null"));
    }

    #[test]
    fn in_and_not_in_parse() {
        let q = parse("SELECT * FROM functions WHERE name IN ('a', 'b')").unwrap();
        assert!(matches!(q, Query::Select(_)));
        let q2 = parse("SELECT * FROM functions WHERE name NOT IN ('a', 'b')").unwrap();
        assert!(matches!(q2, Query::Select(_)));
    }
}
