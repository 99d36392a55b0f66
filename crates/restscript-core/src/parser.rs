//! Line-oriented parser for request scripts.
//!
//! Each non-blank, non-comment line becomes one [`Statement`]. Recognition
//! is prefix based, in this order: `assert`, `echo`, `print`, an HTTP verb,
//! `if`/`for`/`end`, then `$name = expr`. Anything else is a [`ParseError`].
//!
//! ```text
//! # fetch and check
//! GET users | length
//! $count = $data
//! assert $count > 0
//! POST users
//! <<JSON
//! {"name": "$name"}
//! JSON
//! ```
//!
//! Expressions are stored unevaluated; the executor substitutes variables.

use crate::ast::*;
use crate::error::ParseError;
use crate::value::Value;

/// A heredoc being collected for the most recent request.
struct PendingHeredoc {
    marker: String,
    start_line: usize,
    lines: Vec<String>,
}

pub fn parse(source: &str) -> Result<Script, ParseError> {
    let mut statements: Vec<Statement> = Vec::new();
    let mut heredoc: Option<PendingHeredoc> = None;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;

        if let Some(pending) = heredoc.as_mut() {
            if raw.trim() == pending.marker {
                let body = parse_body_text(&pending.lines.join("\n"));
                attach_heredoc(&mut statements, body, pending.start_line)?;
                heredoc = None;
            } else {
                pending.lines.push(raw.to_string());
            }
            continue;
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(marker) = heredoc_marker(trimmed) {
            match statements.last() {
                Some(Statement { kind: StatementKind::Request { body: None, .. }, .. }) => {}
                _ => {
                    return Err(ParseError::new(
                        line,
                        "heredoc body must follow a request without an inline body",
                    ))
                }
            }
            heredoc = Some(PendingHeredoc {
                marker: marker.to_string(),
                start_line: line,
                lines: Vec::new(),
            });
            continue;
        }

        let kind = parse_line(trimmed, line)?;
        statements.push(Statement {
            line,
            source: raw.to_string(),
            kind,
        });
    }

    if let Some(pending) = heredoc {
        return Err(ParseError::new(
            pending.start_line,
            format!("unterminated heredoc, expected '{}'", pending.marker),
        ));
    }

    Ok(Script { statements })
}

fn attach_heredoc(
    statements: &mut [Statement],
    body_expr: Expression,
    line: usize,
) -> Result<(), ParseError> {
    match statements.last_mut() {
        Some(Statement { kind: StatementKind::Request { body, .. }, .. }) if body.is_none() => {
            *body = Some(body_expr);
            Ok(())
        }
        _ => Err(ParseError::new(line, "heredoc body must follow a request")),
    }
}

fn heredoc_marker(trimmed: &str) -> Option<&str> {
    let marker = trimmed.strip_prefix("<<")?;
    if !marker.is_empty() && marker.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(marker)
    } else {
        None
    }
}

fn parse_line(text: &str, line: usize) -> Result<StatementKind, ParseError> {
    if let Some(rest) = text.strip_prefix("assert ") {
        return parse_assertion(rest, line);
    }
    if let Some(rest) = text.strip_prefix("echo ") {
        return Ok(StatementKind::Output {
            kind: OutputKind::Echo,
            expr: parse_expression(rest, line)?,
        });
    }
    if let Some(rest) = text.strip_prefix("print ") {
        return Ok(StatementKind::Output {
            kind: OutputKind::Print,
            expr: parse_expression(rest, line)?,
        });
    }

    let first_word = text.split_whitespace().next().unwrap_or_default();
    if let Some(method) = HttpMethod::parse(first_word) {
        let target = text[first_word.len()..].trim();
        if target.is_empty() {
            return Err(ParseError::new(line, format!("{} requires a target", method)));
        }
        return parse_request(method, target, line);
    }

    if text.starts_with("if ") {
        return Ok(control(ControlKind::If, text));
    }
    if text.starts_with("for ") {
        return Ok(control(ControlKind::For, text));
    }
    if text == "end" {
        return Ok(control(ControlKind::End, text));
    }

    if text.starts_with('$') {
        if let Some(kind) = parse_assignment(text, line)? {
            return Ok(kind);
        }
    }

    Err(ParseError::new(line, "unrecognized statement"))
}

fn control(kind: ControlKind, text: &str) -> StatementKind {
    StatementKind::ControlMarker {
        kind,
        raw: text.to_string(),
    }
}

fn parse_assignment(text: &str, line: usize) -> Result<Option<StatementKind>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let Some((target, end)) = read_var_path(&chars, 0) else {
        return Ok(None);
    };
    let mut pos = end;
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    if chars.get(pos) != Some(&'=') || chars.get(pos + 1) == Some(&'=') {
        return Ok(None);
    }
    let rest: String = chars[pos + 1..].iter().collect();
    if rest.trim().is_empty() {
        return Err(ParseError::new(line, format!("missing value for {}", target)));
    }
    Ok(Some(StatementKind::Assignment {
        target,
        expr: parse_expression(&rest, line)?,
    }))
}

fn parse_request(method: HttpMethod, target: &str, line: usize) -> Result<StatementKind, ParseError> {
    let parts = split_top_level(target, '|');
    if parts.len() > 2 {
        return Err(ParseError::new(
            line,
            "only one filter or projection segment is allowed per request",
        ));
    }

    let head = parts[0].trim();
    if head.is_empty() {
        return Err(ParseError::new(line, format!("{} requires a target", method)));
    }
    let (endpoint_text, body_text) = match head.split_once(char::is_whitespace) {
        Some((endpoint, body)) => (endpoint, Some(body.trim())),
        None => (head, None),
    };

    let pipeline = match parts.get(1) {
        Some(segment) => Some(parse_pipeline(segment.trim(), line)?),
        None => None,
    };

    let body = match body_text {
        Some(text) if !text.is_empty() => Some(parse_expression(text, line)?),
        _ => None,
    };

    Ok(StatementKind::Request {
        method,
        endpoint: parse_expression(endpoint_text, line)?,
        body,
        pipeline,
    })
}

fn parse_pipeline(segment: &str, line: usize) -> Result<Pipeline, ParseError> {
    if segment.is_empty() {
        return Err(ParseError::new(line, "empty filter after '|'"));
    }
    if let Some(name) = segment.strip_prefix('@') {
        if name.trim().is_empty() {
            return Err(ParseError::new(line, "missing filter name after '@'"));
        }
        return Ok(Pipeline::NamedFilter(name.trim().to_string()));
    }
    if let Some(name) = segment.strip_prefix('%') {
        if name.trim().is_empty() {
            return Err(ParseError::new(line, "missing projection name after '%'"));
        }
        return Ok(Pipeline::Projection(name.trim().to_string()));
    }
    Ok(Pipeline::Filter(segment.to_string()))
}

fn parse_assertion(text: &str, line: usize) -> Result<StatementKind, ParseError> {
    let text = text.trim();
    let Some((start, end, op)) = find_operator(text) else {
        return Ok(StatementKind::Assertion {
            left: parse_expression(text, line)?,
            comparison: None,
        });
    };
    let left = text[..start].trim();
    let right = text[end..].trim();
    if left.is_empty() || right.is_empty() {
        return Err(ParseError::new(
            line,
            format!("assertion is missing an operand around '{}'", op),
        ));
    }
    Ok(StatementKind::Assertion {
        left: parse_expression(left, line)?,
        comparison: Some((op, parse_expression(right, line)?)),
    })
}

/// Finds the first comparison operator outside quotes and brackets.
///
/// Returns the byte range of the operator and the operator itself.
fn find_operator(text: &str) -> Option<(usize, usize, CompareOp)> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' if quote_may_open(i.checked_sub(1).map(|p| bytes[p] as char)) => {
                quote = Some(b)
            }
            b'[' | b'{' => depth += 1,
            b']' | b'}' => depth -= 1,
            _ if depth == 0 => {
                if let Some(found) = operator_at(bytes, i) {
                    return Some(found);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn operator_at(bytes: &[u8], i: usize) -> Option<(usize, usize, CompareOp)> {
    let rest = &bytes[i..];
    let symbolic = [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::GtEq),
        ("<=", CompareOp::LtEq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ];
    for (symbol, op) in symbolic {
        if rest.starts_with(symbol.as_bytes()) {
            return Some((i, i + symbol.len(), op));
        }
    }

    let preceded_by_space = i > 0 && bytes[i - 1].is_ascii_whitespace();
    if !preceded_by_space {
        return None;
    }
    if rest.starts_with(b"not") && rest.get(3).is_some_and(|b| b.is_ascii_whitespace()) {
        let mut j = i + 3;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes[j..].starts_with(b"in") && bytes.get(j + 2).is_some_and(|b| b.is_ascii_whitespace()) {
            return Some((i, j + 2, CompareOp::NotIn));
        }
    }
    if rest.starts_with(b"in") && rest.get(2).is_some_and(|b| b.is_ascii_whitespace()) {
        return Some((i, i + 2, CompareOp::In));
    }
    None
}

/// A quote opens a string only at the start of a token, so apostrophes in
/// bare words (`It's`) stay literal.
fn quote_may_open(prev: Option<char>) -> bool {
    prev.map_or(true, |p| {
        p.is_ascii_whitespace() || matches!(p, '[' | '{' | '(' | ',' | ':' | '=' | '!' | '<' | '>' | '|')
    })
}

/// Splits on `sep` where it appears outside quotes and brackets.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut escaped = false;
    let mut start = 0;
    let mut prev: Option<char> = None;

    for (i, c) in text.char_indices() {
        let before = prev.replace(c);
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if quote_may_open(before) => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parses an expression template without evaluating it.
pub fn parse_expression(text: &str, line: usize) -> Result<Expression, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::new(line, "empty expression"));
    }

    if let Some(inner) = text.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .filter(|_| text.len() >= 2 && !ends_with_escaped_quote(text))
            .ok_or_else(|| ParseError::new(line, format!("unterminated string: {}", text)))?;
        return Ok(from_segments(scan_segments(inner, true), true));
    }
    if let Some(inner) = text.strip_prefix('\'') {
        let inner = inner
            .strip_suffix('\'')
            .filter(|_| text.len() >= 2)
            .ok_or_else(|| ParseError::new(line, format!("unterminated string: {}", text)))?;
        return Ok(Expression::Literal(Value::String(inner.to_string())));
    }

    if text.starts_with('$') {
        let chars: Vec<char> = text.chars().collect();
        if let Some((var, end)) = read_var_path(&chars, 0) {
            if end == chars.len() {
                return Ok(Expression::Variable(var));
            }
        }
    }

    match text.to_ascii_lowercase().as_str() {
        "true" => return Ok(Expression::Literal(Value::Bool(true))),
        "false" => return Ok(Expression::Literal(Value::Bool(false))),
        "null" | "none" => return Ok(Expression::Literal(Value::Null)),
        _ => {}
    }

    if looks_numeric(text) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Expression::Literal(Value::Integer(i)));
        }
        if let Ok(n) = text.parse::<f64>() {
            return Ok(Expression::Literal(Value::Number(n)));
        }
    }

    Ok(parse_body_text(text))
}

/// Parses free text: a template when it references variables, JSON when it
/// parses as JSON, otherwise a plain string.
fn parse_body_text(text: &str) -> Expression {
    let segments = scan_segments(text, false);
    if segments.iter().any(|s| matches!(s, Segment::Var(_))) {
        return Expression::Template(segments);
    }
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
            return Expression::Literal(Value::from(json));
        }
    }
    Expression::Literal(Value::String(text.to_string()))
}

fn from_segments(mut segments: Vec<Segment>, collapse_single_var: bool) -> Expression {
    if segments.iter().all(|s| matches!(s, Segment::Text(_))) {
        let text: String = segments
            .into_iter()
            .map(|s| match s {
                Segment::Text(t) => t,
                Segment::Var(_) => unreachable!(),
            })
            .collect();
        return Expression::Literal(Value::String(text));
    }
    if collapse_single_var && segments.len() == 1 {
        if let Some(Segment::Var(var)) = segments.pop() {
            return Expression::Variable(var);
        }
    }
    Expression::Template(segments)
}

fn ends_with_escaped_quote(text: &str) -> bool {
    let body = &text[..text.len() - 1];
    let backslashes = body.chars().rev().take_while(|c| *c == '\\').count();
    backslashes % 2 == 1
}

fn looks_numeric(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && text.chars().any(|c| c.is_ascii_digit())
}

/// Splits text into literal and `$var` segments.
///
/// With `escapes`, `\n \t \" \\ \$` are decoded; `\$` never interpolates.
/// A `$` not followed by an identifier stays literal.
fn scan_segments(text: &str, escapes: bool) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if escapes && c == '\\' && i + 1 < chars.len() {
            let decoded = match chars[i + 1] {
                'n' => Some('\n'),
                't' => Some('\t'),
                'r' => Some('\r'),
                '"' => Some('"'),
                '\\' => Some('\\'),
                '$' => Some('$'),
                _ => None,
            };
            match decoded {
                Some(d) => {
                    literal.push(d);
                    i += 2;
                }
                None => {
                    literal.push(c);
                    i += 1;
                }
            }
            continue;
        }
        if c == '$' {
            if let Some((var, end)) = read_var_path(&chars, i) {
                if !literal.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Var(var));
                i = end;
                continue;
            }
        }
        literal.push(c);
        i += 1;
    }
    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    segments
}

/// Reads `$name(.segment)*` starting at `start`, which must be a `$`.
///
/// Returns the path and the index just past it.
fn read_var_path(chars: &[char], start: usize) -> Option<(VarPath, usize)> {
    if chars.get(start) != Some(&'$') {
        return None;
    }
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let first = *chars.get(start + 1)?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }

    let mut pos = start + 1;
    let mut name = String::new();
    while pos < chars.len() && is_word(chars[pos]) {
        name.push(chars[pos]);
        pos += 1;
    }

    let mut path = Vec::new();
    while pos + 1 < chars.len() && chars[pos] == '.' && is_word(chars[pos + 1]) {
        pos += 1;
        let mut segment = String::new();
        while pos < chars.len() && is_word(chars[pos]) {
            segment.push(chars[pos]);
            pos += 1;
        }
        path.push(segment);
    }

    Some((VarPath { name, path }, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> StatementKind {
        let script = parse(source).unwrap();
        assert_eq!(script.statements.len(), 1);
        script.statements.into_iter().next().unwrap().kind
    }

    fn var(name: &str, path: &[&str]) -> VarPath {
        VarPath {
            name: name.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_assignment_literal() {
        match single("$x = 5") {
            StatementKind::Assignment { target, expr } => {
                assert_eq!(target, var("x", &[]));
                assert_eq!(expr, Expression::Literal(Value::Integer(5)));
            }
            other => panic!("Expected Assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assignment_dotted_target() {
        match single(r#"$user.name = "Ada""#) {
            StatementKind::Assignment { target, expr } => {
                assert_eq!(target, var("user", &["name"]));
                assert_eq!(expr, Expression::Literal(Value::from("Ada")));
            }
            other => panic!("Expected Assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assignment_variable_path() {
        match single("$id = $data.0.id") {
            StatementKind::Assignment { expr, .. } => {
                assert_eq!(expr, Expression::Variable(var("data", &["0", "id"])));
            }
            other => panic!("Expected Assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_with_filter() {
        match single("GET users | length") {
            StatementKind::Request { method, endpoint, body, pipeline } => {
                assert_eq!(method, HttpMethod::Get);
                assert_eq!(endpoint, Expression::Literal(Value::from("users")));
                assert!(body.is_none());
                assert_eq!(pipeline, Some(Pipeline::Filter("length".to_string())));
            }
            other => panic!("Expected Request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_named_filter_and_projection() {
        match single("get users | @active") {
            StatementKind::Request { method, pipeline, .. } => {
                assert_eq!(method, HttpMethod::Get);
                assert_eq!(pipeline, Some(Pipeline::NamedFilter("active".to_string())));
            }
            other => panic!("Expected Request, got {:?}", other),
        }
        match single("GET users | %summary") {
            StatementKind::Request { pipeline, .. } => {
                assert_eq!(pipeline, Some(Pipeline::Projection("summary".to_string())));
            }
            other => panic!("Expected Request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_second_pipe_is_error() {
        let err = parse("GET users | .[] | length").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_parse_request_endpoint_template() {
        match single("DELETE user-service@user:$id") {
            StatementKind::Request { method, endpoint, .. } => {
                assert_eq!(method, HttpMethod::Delete);
                assert_eq!(
                    endpoint,
                    Expression::Template(vec![
                        Segment::Text("user-service@user:".to_string()),
                        Segment::Var(var("id", &[])),
                    ])
                );
            }
            other => panic!("Expected Request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_inline_body() {
        match single(r#"POST users {"name": "$name", "tags": ["a|b"]} | .id"#) {
            StatementKind::Request { body, pipeline, .. } => {
                assert!(matches!(body, Some(Expression::Template(_))));
                assert_eq!(pipeline, Some(Pipeline::Filter(".id".to_string())));
            }
            other => panic!("Expected Request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_apostrophe_in_bare_body_keeps_pipeline() {
        match single("POST notes It's fine | .id") {
            StatementKind::Request { body, pipeline, .. } => {
                assert_eq!(body, Some(Expression::Literal(Value::from("It's fine"))));
                assert_eq!(pipeline, Some(Pipeline::Filter(".id".to_string())));
            }
            other => panic!("Expected Request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assertion_apostrophe_in_bare_word() {
        match single("assert don't == $word") {
            StatementKind::Assertion { left, comparison: Some((op, right)) } => {
                assert_eq!(left, Expression::Literal(Value::from("don't")));
                assert_eq!(op, CompareOp::Eq);
                assert_eq!(right, Expression::Variable(var("word", &[])));
            }
            other => panic!("Expected Assertion, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_assertion_quoted_left_operand() {
        match single(r#"assert "a == b" == $name"#) {
            StatementKind::Assertion { left, comparison: Some((op, _)) } => {
                assert_eq!(left, Expression::Literal(Value::from("a == b")));
                assert_eq!(op, CompareOp::Eq);
            }
            other => panic!("Expected Assertion, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_heredoc_body() {
        let script = parse("POST users\n<<EOF\n{\"name\": \"Ada\"}\nEOF\necho done").unwrap();
        assert_eq!(script.statements.len(), 2);
        match &script.statements[0].kind {
            StatementKind::Request { body: Some(Expression::Literal(Value::Map(map))), .. } => {
                assert_eq!(map.get("name"), Some(&Value::from("Ada")));
            }
            other => panic!("Expected Request with JSON body, got {:?}", other),
        }
        assert_eq!(script.statements[1].line, 5);
    }

    #[test]
    fn test_parse_heredoc_without_request_fails() {
        let err = parse("echo hi\n<<EOF\nx\nEOF").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parse_unterminated_heredoc_fails() {
        let err = parse("POST users\n<<EOF\n{}").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parse_assertions() {
        match single("assert $response.status == 200") {
            StatementKind::Assertion { left, comparison } => {
                assert_eq!(left, Expression::Variable(var("response", &["status"])));
                let (op, right) = comparison.unwrap();
                assert_eq!(op, CompareOp::Eq);
                assert_eq!(right, Expression::Literal(Value::Integer(200)));
            }
            other => panic!("Expected Assertion, got {:?}", other),
        }
        let ops = [
            ("assert $a != 1", CompareOp::NotEq),
            ("assert $a >= 1", CompareOp::GtEq),
            ("assert $a <= 1", CompareOp::LtEq),
            ("assert $a > 1", CompareOp::Gt),
            ("assert $a < 1", CompareOp::Lt),
            ("assert \"x\" in $list", CompareOp::In),
            ("assert $index not in $list", CompareOp::NotIn),
        ];
        for (source, expected) in ops {
            match single(source) {
                StatementKind::Assertion { comparison: Some((op, _)), .. } => {
                    assert_eq!(op, expected, "{}", source)
                }
                other => panic!("Expected Assertion for {}, got {:?}", source, other),
            }
        }
    }

    #[test]
    fn test_parse_assertion_operator_inside_string_ignored() {
        match single(r#"assert $name == "a == b""#) {
            StatementKind::Assertion { comparison: Some((op, right)), .. } => {
                assert_eq!(op, CompareOp::Eq);
                assert_eq!(right, Expression::Literal(Value::from("a == b")));
            }
            other => panic!("Expected Assertion, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bare_assertion() {
        match single("assert $ok") {
            StatementKind::Assertion { left, comparison } => {
                assert_eq!(left, Expression::Variable(var("ok", &[])));
                assert!(comparison.is_none());
            }
            other => panic!("Expected Assertion, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_echo_and_print() {
        match single(r#"echo "Hello $name""#) {
            StatementKind::Output { kind, expr } => {
                assert_eq!(kind, OutputKind::Echo);
                assert_eq!(
                    expr,
                    Expression::Template(vec![
                        Segment::Text("Hello ".to_string()),
                        Segment::Var(var("name", &[])),
                    ])
                );
            }
            other => panic!("Expected Output, got {:?}", other),
        }
        match single("print $data") {
            StatementKind::Output { kind, expr } => {
                assert_eq!(kind, OutputKind::Print);
                assert_eq!(expr, Expression::Variable(var("data", &[])));
            }
            other => panic!("Expected Output, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_markers_are_lenient() {
        let script = parse("if $x == 1\nfor $u in $users\nend").unwrap();
        let kinds: Vec<ControlKind> = script
            .statements
            .iter()
            .map(|s| match &s.kind {
                StatementKind::ControlMarker { kind, .. } => *kind,
                other => panic!("Expected ControlMarker, got {:?}", other),
            })
            .collect();
        assert_eq!(kinds, vec![ControlKind::If, ControlKind::For, ControlKind::End]);
    }

    #[test]
    fn test_parse_unrecognized_statement() {
        let err = parse("# header\n\nfrobnicate now").unwrap_err();
        assert_eq!(err, ParseError::new(3, "unrecognized statement"));
    }

    #[test]
    fn test_line_numbers_skip_blank_and_comments() {
        let script = parse("\n# comment\n$a = 1\n\n  # indented comment\necho $a\n").unwrap();
        let lines: Vec<usize> = script.statements.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 6]);
        assert_eq!(script.statements[1].source, "echo $a");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let source = "GET users | length\n$count = $data\nassert $count > 0";
        let first = parse(source).unwrap();
        let second = parse(source).unwrap();
        assert_eq!(first.statements.len(), second.statements.len());
        for (a, b) in first.statements.iter().zip(&second.statements) {
            assert_eq!(a.line, b.line);
            assert_eq!(a.source, b.source);
        }
    }

    #[test]
    fn test_single_quotes_do_not_interpolate() {
        assert_eq!(
            parse_expression("'Hello $name'", 1).unwrap(),
            Expression::Literal(Value::from("Hello $name"))
        );
    }

    #[test]
    fn test_escaped_dollar_does_not_interpolate() {
        assert_eq!(
            parse_expression(r#""Price: \$99""#, 1).unwrap(),
            Expression::Literal(Value::from("Price: $99"))
        );
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        assert_eq!(
            parse_expression(r#""Cost: $ 5""#, 1).unwrap(),
            Expression::Literal(Value::from("Cost: $ 5"))
        );
    }

    #[test]
    fn test_quoted_single_variable_collapses() {
        assert_eq!(
            parse_expression(r#""$x""#, 1).unwrap(),
            Expression::Variable(var("x", &[]))
        );
    }

    #[test]
    fn test_trailing_dot_not_part_of_path() {
        assert_eq!(
            parse_expression(r#""Bye $name.""#, 1).unwrap(),
            Expression::Template(vec![
                Segment::Text("Bye ".to_string()),
                Segment::Var(var("name", &[])),
                Segment::Text(".".to_string()),
            ])
        );
    }

    #[test]
    fn test_json_literal() {
        match parse_expression("[1, 2, 3]", 1).unwrap() {
            Expression::Literal(Value::List(items)) => assert_eq!(items.len(), 3),
            other => panic!("Expected list literal, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(parse("echo \"unclosed").is_err());
    }
}
