use std::fmt;

use crate::value::Value;

/// A parsed script: statements in source order.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

/// One executable line of a script.
#[derive(Debug, Clone)]
pub struct Statement {
    /// 1-based source line.
    pub line: usize,
    /// The original source line, untrimmed.
    pub source: String,
    pub kind: StatementKind,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Assignment {
        target: VarPath,
        expr: Expression,
    },
    Request {
        method: HttpMethod,
        endpoint: Expression,
        body: Option<Expression>,
        pipeline: Option<Pipeline>,
    },
    /// `assert <left> [<op> <right>]`; without a comparison the left side must be truthy.
    Assertion {
        left: Expression,
        comparison: Option<(CompareOp, Expression)>,
    },
    Output {
        kind: OutputKind,
        expr: Expression,
    },
    ControlMarker {
        kind: ControlKind,
        raw: String,
    },
}

/// A variable reference with an optional dotted path, e.g. `$response.body.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarPath {
    pub name: String,
    pub path: Vec<String>,
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name)?;
        for segment in &self.path {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Variable(VarPath),
    /// Text with `$var` substitutions, rendered to a string.
    Template(Vec<Segment>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Var(VarPath),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Value::String(s)) => write!(f, "\"{}\"", s),
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Variable(var) => write!(f, "{}", var),
            Expression::Template(segments) => {
                write!(f, "\"")?;
                for segment in segments {
                    match segment {
                        Segment::Text(s) => write!(f, "{}", s)?,
                        Segment::Var(var) => write!(f, "{}", var)?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single `|` segment allowed after a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Pipeline {
    /// `| @name` — a filter expression looked up by name.
    NamedFilter(String),
    /// `| <expr>` — an inline filter expression.
    Filter(String),
    /// `| %name` — a configured projection.
    Projection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    In,
    NotIn,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::GtEq => ">=",
            CompareOp::LtEq => "<=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Echo,
    Print,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    If,
    For,
    End,
}
