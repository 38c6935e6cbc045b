//! The grammar stage: turns HOCON source text into the unresolved builder
//! tree, preserving concatenation parts, substitution markers, include
//! directives and enough source positions for error reporting.
//!
//! The root object may omit its enclosing braces. Parsing aborts at the
//! first syntax error; there is no recovery.

use crate::ast::{ConcatPart, Entry, Field, Include, IncludePath, Key, Object, Value};
use crate::error::SyntaxError;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while};
use nom::character::complete::{char, line_ending, multispace1, space0};
use nom::combinator::{eof, map, opt, value};
use nom::multi::many0;
use nom::number::complete::recognize_float;
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::{IResult, Slice};
use nom_locate::LocatedSpan;
use tracing::trace;

type Input<'a> = LocatedSpan<&'a str>;

const ROOT_DELIMITERS: &[&str] = &["'#'", "','", "'\\n'"];
const OBJECT_DELIMITERS: &[&str] = &["'#'", "','", "'\\n'", "'}'"];
const ARRAY_DELIMITERS: &[&str] = &["'#'", "','", "'\\n'", "']'"];
const SUBSTITUTION_DELIMITERS: &[&str] = &["'}'"];

#[derive(Debug, PartialEq)]
enum FailureKind {
    Expected(&'static [&'static str]),
    ExpectedValue,
    Unterminated(&'static str),
    InvalidEscape(char),
    Nom(nom::error::ErrorKind),
}

#[derive(Debug, PartialEq)]
pub(crate) struct ParseFailure<'a> {
    span: Input<'a>,
    kind: FailureKind,
}

impl<'a> nom::error::ParseError<Input<'a>> for ParseFailure<'a> {
    fn from_error_kind(input: Input<'a>, kind: nom::error::ErrorKind) -> Self {
        ParseFailure { span: input, kind: FailureKind::Nom(kind) }
    }

    fn append(_input: Input<'a>, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, O> = IResult<Input<'a>, O, ParseFailure<'a>>;

fn soft_error<O>(input: Input) -> PResult<O> {
    Err(nom::Err::Error(ParseFailure { span: input, kind: FailureKind::Nom(nom::error::ErrorKind::Fail) }))
}

fn hard_error<O>(input: Input, kind: FailureKind) -> PResult<O> {
    Err(nom::Err::Failure(ParseFailure { span: input, kind }))
}

fn position(input: Input) -> crate::ast::Span {
    crate::ast::Span::new(input.location_line(), input.get_utf8_column())
}

/// Entry point: `parse` turns source text into a builder tree.
pub fn parse(input: &str) -> Result<Object, SyntaxError> {
    trace!(bytes = input.len(), "parsing configuration source");
    match root(Input::new(input)) {
        Ok((_, object)) => Ok(object),
        Err(nom::Err::Error(failure)) | Err(nom::Err::Failure(failure)) => Err(to_syntax_error(input, failure)),
        Err(nom::Err::Incomplete(_)) => Err(SyntaxError::new(input, 1, 1, "Unexpected end of input".to_owned())),
    }
}

fn to_syntax_error(input: &str, failure: ParseFailure) -> SyntaxError {
    let line = failure.span.location_line();
    let column = failure.span.get_utf8_column();
    let message = match failure.kind {
        FailureKind::Expected(delimiters) => {
            format!("Expected delimiters are one of {}", delimiters.join(", "))
        }
        FailureKind::ExpectedValue => "Expected a value".to_owned(),
        FailureKind::Unterminated(what) => format!("Unterminated {what}"),
        FailureKind::InvalidEscape(c) => format!("Invalid escape sequence '\\{c}'"),
        FailureKind::Nom(_) => "Unexpected input".to_owned(),
    };
    SyntaxError::new(input, line, column, message)
}

/// ```peg
/// comment = { ("//" | "#") ~ (!NEWLINE ~ ANY)* ~ (NEWLINE | EOI) }
/// ```
fn comment(input: Input) -> PResult<Input> {
    let start = alt((tag("//"), tag("#")));
    let body = take_while(|x| x != '\n' && x != '\r');
    let end = alt((line_ending, eof));
    delimited(start, body, end)(input)
}

/// Inline whitespace only; newlines terminate a logical value line.
fn ws_inline(input: Input) -> PResult<Input> {
    take_while(|c| c == ' ' || c == '\t')(input)
}

fn empty_lines(input: Input) -> PResult<()> {
    let empty_line = alt((comment, multispace1));
    value((), many0(empty_line))(input)
}

/// Parse separators for arrays and objects: a comma, a line ending or a
/// comment, each optionally followed by one trailing comma.
///
/// ```ebnf
/// separator = _{ ("," ~ NEWLINE*) | ((NEWLINE | comment)+ ~ ","? ~ NEWLINE*) }
/// ```
fn separator(input: Input) -> PResult<()> {
    let comma = value((), pair(char(','), empty_lines));
    let eol = alt((value((), line_ending), value((), comment)));
    let newline_first = value((), tuple((eol, empty_lines, opt(char(',')), empty_lines)));
    preceded(space0, alt((comma, newline_first)))(input)
}

/// Consumes a closing delimiter, or fails hard naming the delimiter set the
/// grammar would have accepted at this point.
fn closing<'a>(input: Input<'a>, delimiter: char, expected: &'static [&'static str]) -> PResult<'a, ()> {
    let (rest, _) = empty_lines(input)?;
    match char::<Input, ParseFailure>(delimiter)(rest) {
        Ok((rest, _)) => Ok((rest, ())),
        Err(_) => hard_error(rest, FailureKind::Expected(expected)),
    }
}

// ---------------------------------------------------------------------------
// strings
// ---------------------------------------------------------------------------

/// Double-quoted string with escape processing. Unterminated literals and
/// unknown escapes fail hard.
fn quoted_string(input: Input) -> PResult<String> {
    let fragment = input.fragment();
    let mut chars = fragment.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => return soft_error(input),
    }

    let mut out = String::new();
    loop {
        match chars.next() {
            None => return hard_error(input, FailureKind::Unterminated("string literal")),
            Some((_, '\n')) | Some((_, '\r')) => {
                return hard_error(input, FailureKind::Unterminated("string literal"))
            }
            Some((i, '"')) => return Ok((input.slice(i + 1..), out)),
            Some((_, '\\')) => match chars.next() {
                None => return hard_error(input, FailureKind::Unterminated("string literal")),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '/')) => out.push('/'),
                Some((_, 'b')) => out.push('\u{0008}'),
                Some((_, 'f')) => out.push('\u{000C}'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((j, 'u')) => {
                    let hex = match fragment.get(j + 1..j + 5) {
                        Some(hex) if hex.chars().all(|c| c.is_ascii_hexdigit()) => hex,
                        _ => return hard_error(input, FailureKind::InvalidEscape('u')),
                    };
                    let code = u32::from_str_radix(hex, 16).expect("verified hex digits");
                    match char::from_u32(code) {
                        Some(c) => out.push(c),
                        None => return hard_error(input, FailureKind::InvalidEscape('u')),
                    }
                    for _ in 0..4 {
                        chars.next();
                    }
                }
                Some((_, other)) => return hard_error(input, FailureKind::InvalidEscape(other)),
            },
            Some((_, c)) => out.push(c),
        }
    }
}

/// Triple-quoted multi-line string: raw, no escape processing. Any quote
/// characters beyond the closing three become literal content, so
/// `"""a""""` yields `a"`.
fn triple_quoted_string(input: Input) -> PResult<String> {
    let fragment = input.fragment();
    if !fragment.starts_with("\"\"\"") {
        return soft_error(input);
    }

    let body = &fragment[3..];
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            let mut run = 0;
            while i + run < bytes.len() && bytes[i + run] == b'"' {
                run += 1;
            }
            if run >= 3 {
                let content = &body[..i + run - 3];
                return Ok((input.slice(3 + i + run..), content.to_owned()));
            }
            i += run;
        } else {
            i += 1;
        }
    }
    hard_error(input, FailureKind::Unterminated("multiline string"))
}

/// Characters permitted in unquoted value strings. `/` is also permitted
/// unless it starts a `//` comment.
fn is_unquoted_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '$' | '"' | '{' | '}' | '[' | ']' | ':' | '=' | ',' | '+' | '#' | '`' | '^' | '?' | '!' | '@' | '*' | '&' | '\\'
        )
}

fn unquoted_string(input: Input) -> PResult<String> {
    let fragment = input.fragment();
    let mut end = 0;
    let mut chars = fragment.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_unquoted_char(c) {
            break;
        }
        if c == '/' && matches!(chars.peek(), Some((_, '/'))) {
            break;
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        return soft_error(input);
    }
    Ok((input.slice(end..), fragment[..end].to_owned()))
}

// ---------------------------------------------------------------------------
// keys
// ---------------------------------------------------------------------------

/// Characters permitted in unquoted key segments. Embedded spaces are legal
/// and trimmed at segment boundaries; `.` splits the path.
fn is_unquoted_key_char(c: char) -> bool {
    !matches!(
        c,
        '.' | ':' | '=' | '+' | '{' | '}' | '[' | ']' | ',' | '#' | '"' | '$' | '\n' | '\r'
    )
}

fn unquoted_key_run(input: Input) -> PResult<String> {
    let fragment = input.fragment();
    let mut end = 0;
    let mut chars = fragment.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !is_unquoted_key_char(c) {
            break;
        }
        if c == '/' && matches!(chars.peek(), Some((_, '/'))) {
            break;
        }
        end = i + c.len_utf8();
    }
    if end == 0 {
        return soft_error(input);
    }
    Ok((input.slice(end..), fragment[..end].to_owned()))
}

/// One path segment: unquoted runs and quoted strings concatenated, e.g.
/// `a "b" c` is the single segment `a b c`. Whitespace adjoining quoted
/// pieces is preserved; the segment ends are trimmed only when unquoted.
fn key_segment(input: Input) -> PResult<String> {
    let mut pieces: Vec<(String, bool)> = Vec::new();
    let mut rest = input;
    loop {
        match quoted_string(rest) {
            Ok((r, s)) => {
                pieces.push((s, true));
                rest = r;
                continue;
            }
            Err(nom::Err::Failure(e)) => return Err(nom::Err::Failure(e)),
            Err(_) => {}
        }
        match unquoted_key_run(rest) {
            Ok((r, s)) => {
                pieces.push((s, false));
                rest = r;
            }
            Err(_) => break,
        }
    }

    let Some(first) = pieces.first() else {
        return soft_error(input);
    };
    let trim_start = !first.1;
    let trim_end = !pieces.last().expect("non-empty").1;
    let quoted_any = pieces.iter().any(|(_, quoted)| *quoted);

    let mut joined: String = pieces.into_iter().map(|(s, _)| s).collect();
    if trim_start {
        joined = joined.trim_start().to_owned();
    }
    if trim_end {
        joined = joined.trim_end().to_owned();
    }
    if joined.is_empty() && !quoted_any {
        return soft_error(input);
    }
    Ok((rest, joined))
}

/// ```peg
/// key = { key_segment ~ ("." ~ key_segment)* }
/// ```
fn key(input: Input) -> PResult<Key> {
    let (rest, (head, tail)) = pair(key_segment, many0(preceded(char('.'), key_segment)))(input)?;
    let mut segments = Vec::with_capacity(1 + tail.len());
    segments.push(head);
    segments.extend(tail);
    Ok((rest, Key::new(segments)))
}

// ---------------------------------------------------------------------------
// scalar value chunks
// ---------------------------------------------------------------------------

/// True when the character would extend the current token, meaning the
/// keyword or number just matched is really part of an unquoted string.
fn extends_token(rest: Input) -> bool {
    matches!(rest.fragment().chars().next(), Some(c) if is_unquoted_char(c) || c == '"')
}

/// Integers without a fractional or exponent part become `Long`; anything
/// else becomes `Double`. Values like `1.2.3` or `12abc` fall through to
/// unquoted strings.
fn number_value(input: Input) -> PResult<Value> {
    let (rest, text) = recognize_float(input)?;
    if extends_token(rest) {
        return soft_error(input);
    }
    let text = text.fragment();
    let value = if text.contains('.') || text.contains('e') || text.contains('E') {
        match text.parse::<f64>() {
            Ok(n) => Value::Double(n),
            Err(_) => return soft_error(input),
        }
    } else {
        match text.parse::<i64>() {
            Ok(n) => Value::Long(n),
            // out of i64 range, keep the value as a double
            Err(_) => match text.parse::<f64>() {
                Ok(n) => Value::Double(n),
                Err(_) => return soft_error(input),
            },
        }
    };
    Ok((rest, value))
}

/// ```peg
/// keyword = @{ "true" | "false" | "null" }
/// ```
fn keyword_value(input: Input) -> PResult<Value> {
    let (rest, word) = alt((tag("true"), tag("false"), tag("null")))(input)?;
    if extends_token(rest) {
        return soft_error(input);
    }
    let value = match *word.fragment() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Null,
    };
    Ok((rest, value))
}

/// ```peg
/// substitution = { "${" ~ "?"? ~ key ~ "}" }
/// ```
fn substitution(input: Input) -> PResult<Value> {
    let span = position(input);
    let (rest, _) = tag("${")(input)?;
    let (rest, optional) = opt(char('?'))(rest)?;
    let (rest, _) = space0(rest)?;
    let (rest, path) = key(rest)?;
    let (rest, _) = space0(rest)?;
    let (rest, _) = match char::<Input, ParseFailure>('}')(rest) {
        Ok(ok) => ok,
        Err(_) => return hard_error(rest, FailureKind::Expected(SUBSTITUTION_DELIMITERS)),
    };
    Ok((rest, Value::Substitution { path, optional: optional.is_some(), span }))
}

// ---------------------------------------------------------------------------
// composite values
// ---------------------------------------------------------------------------

/// ```ebnf
/// array = { "[" ~ NEWLINE* ~ (concat_value ~ (separator ~ concat_value)* ~ separator?)? ~ "]" }
/// ```
fn array_value(input: Input) -> PResult<Value> {
    let (rest, _) = char('[')(input)?;
    let (rest, _) = empty_lines(rest)?;
    let elements = opt(terminated(
        pair(concat_value, many0(preceded(separator, concat_value))),
        opt(separator),
    ));
    let (rest, elements) = map(elements, |maybe| match maybe {
        Some((head, tail)) => combine_vec((head, tail)),
        None => vec![],
    })(rest)?;
    let (rest, _) = closing(rest, ']', ARRAY_DELIMITERS)?;
    Ok((rest, Value::Array(elements)))
}

/// ```peg
/// object = { "{" ~ NEWLINE* ~ object_body? ~ NEWLINE* ~ "}" }
/// ```
fn object(input: Input) -> PResult<Object> {
    let (rest, _) = char('{')(input)?;
    let (rest, _) = empty_lines(rest)?;
    let (rest, entries) = opt(object_body)(rest)?;
    let (rest, _) = closing(rest, '}', OBJECT_DELIMITERS)?;
    Ok((rest, Object::new(entries.unwrap_or_default())))
}

fn object_value(input: Input) -> PResult<Value> {
    map(object, Value::Object)(input)
}

/// ```peg
/// value_chunk = _{ substitution | string | array | object | keyword | number | unquoted_string }
/// ```
fn value_chunk(input: Input) -> PResult<Value> {
    alt((
        substitution,
        map(triple_quoted_string, Value::String),
        map(quoted_string, Value::String),
        array_value,
        object_value,
        keyword_value,
        number_value,
        map(unquoted_string, Value::String),
    ))(input)
}

/// Adjacent chunks on one logical line form a concatenation. The whitespace
/// between chunks is captured verbatim; string concatenations must
/// reproduce it.
fn concat_value(input: Input) -> PResult<Value> {
    let (mut rest, first) = value_chunk(input)?;
    let mut parts = Vec::new();
    loop {
        let (after_ws, ws) = ws_inline(rest)?;
        match value_chunk(after_ws) {
            Ok((r, chunk)) => {
                parts.push(ConcatPart { whitespace: ws.fragment().to_string(), value: chunk });
                rest = r;
            }
            Err(nom::Err::Failure(e)) => return Err(nom::Err::Failure(e)),
            Err(_) => break,
        }
    }
    if parts.is_empty() {
        Ok((rest, first))
    } else {
        Ok((rest, Value::Concat { first: Box::new(first), rest: parts }))
    }
}

/// A field value after `=`, `:` or `+=`; its absence is a hard error.
fn field_value(input: Input) -> PResult<Value> {
    match concat_value(input) {
        Ok(ok) => Ok(ok),
        Err(nom::Err::Failure(e)) => Err(nom::Err::Failure(e)),
        Err(_) => hard_error(input, FailureKind::ExpectedValue),
    }
}

/// ```ebnf
/// field = { key ~ (("=" | ":" | "+=") ~ concat_value | object) }
/// ```
///
/// `+=` desugars to a self-reference concatenation so that
/// `a += x` appends to the previously accumulated array at `a`.
fn field(input: Input) -> PResult<Field> {
    let span = position(input);
    let (rest, field_key) = key(input)?;

    if let Ok((rest, _)) = tag::<_, Input, ParseFailure>("+=")(rest) {
        let (rest, _) = empty_lines(rest)?;
        let (rest, appended) = field_value(rest)?;
        let value = Value::Concat {
            first: Box::new(Value::SelfReference),
            rest: vec![ConcatPart { whitespace: " ".to_owned(), value: Value::Array(vec![appended]) }],
        };
        return Ok((rest, Field { key: field_key, value, span }));
    }

    if let Ok((rest, _)) = alt((char::<Input, ParseFailure>('='), char(':')))(rest) {
        let (rest, _) = empty_lines(rest)?;
        let (rest, value) = field_value(rest)?;
        return Ok((rest, Field { key: field_key, value, span }));
    }

    // no separator at all, immediately followed by an object value
    let (rest, body) = object(rest)?;
    Ok((rest, Field { key: field_key, value: Value::Object(body), span }))
}

// ---------------------------------------------------------------------------
// includes
// ---------------------------------------------------------------------------

/// ```peg
/// include_file = { ^"file(" ~ string ~ ")" }
/// ```
fn include_file(input: Input) -> PResult<IncludePath> {
    let left = tuple((tag_no_case("file"), space0, char('('), multispace1_opt));
    let right = pair(multispace1_opt, char(')'));
    map(delimited(left, quoted_string, right), IncludePath::File)(input)
}

/// ```peg
/// include_url = { ^"url(" ~ string ~ ")" }
/// ```
fn include_url(input: Input) -> PResult<IncludePath> {
    let left = tuple((tag_no_case("url"), space0, char('('), multispace1_opt));
    let right = pair(multispace1_opt, char(')'));
    map(delimited(left, quoted_string, right), IncludePath::Url)(input)
}

/// ```peg
/// include_classpath = { ^"classpath(" ~ string ~ ")" }
/// ```
fn include_classpath(input: Input) -> PResult<IncludePath> {
    let left = tuple((tag_no_case("classpath"), space0, char('('), multispace1_opt));
    let right = pair(multispace1_opt, char(')'));
    map(delimited(left, quoted_string, right), IncludePath::Classpath)(input)
}

fn multispace1_opt(input: Input) -> PResult<()> {
    value((), opt(multispace1))(input)
}

/// ```peg
/// regular_include = { include_file | include_url | include_classpath | string }
/// ```
fn regular_include(input: Input) -> PResult<IncludePath> {
    alt((include_file, include_url, include_classpath, map(quoted_string, IncludePath::Any)))(input)
}

/// ```peg
/// required_include = { ^"required(" ~ regular_include ~ ")" }
/// ```
fn required_include(input: Input) -> PResult<(IncludePath, bool)> {
    let left = tuple((tag_no_case("required"), space0, char('('), multispace1_opt));
    let right = pair(multispace1_opt, char(')'));
    map(delimited(left, regular_include, right), |path| (path, true))(input)
}

/// ```peg
/// include = { ^"include" ~ (required_include | regular_include) }
/// ```
fn include(input: Input) -> PResult<Include> {
    let span = position(input);
    let (rest, _) = terminated(tag_no_case("include"), multispace1)(input)?;
    let (rest, (path, required)) = alt((required_include, map(regular_include, |p| (p, false))))(rest)?;
    Ok((rest, Include { path, required, span }))
}

// ---------------------------------------------------------------------------
// object bodies and the root
// ---------------------------------------------------------------------------

/// ```ebnf
/// entry = _{ include | field }
/// ```
fn entry(input: Input) -> PResult<Entry> {
    alt((map(include, Entry::Include), map(field, Entry::Field)))(input)
}

/// ```peg
/// object_body = { entry ~ (separator ~ entry)* ~ separator? }
/// ```
fn object_body(input: Input) -> PResult<Vec<Entry>> {
    let parser = terminated(pair(entry, many0(preceded(separator, entry))), opt(separator));
    map(parser, combine_vec)(input)
}

fn combine_vec<T>((head, mut rest): (T, Vec<T>)) -> Vec<T> {
    rest.insert(0, head);
    rest
}

/// The root object, with optional enclosing braces.
fn root(input: Input) -> PResult<Object> {
    let (rest, _) = empty_lines(input)?;
    let (rest, object) = if rest.fragment().starts_with('{') {
        object(rest)?
    } else {
        let (rest, body) = opt(object_body)(rest)?;
        (rest, Object::new(body.unwrap_or_default()))
    };
    let (rest, _) = empty_lines(rest)?;
    if rest.fragment().is_empty() {
        Ok((rest, object))
    } else {
        hard_error(rest, FailureKind::Expected(ROOT_DELIMITERS))
    }
}
