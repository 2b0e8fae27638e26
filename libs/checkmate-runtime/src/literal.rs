// Literal codec for test fixtures
//
// Fixtures are literal text in the submitted language's own syntax. They
// are decoded by a dedicated recursive-descent parser into a closed set of
// variants; nothing here evaluates expressions. The same decoder reads the
// value reprs a sandbox reports back.

use std::fmt;

use serde::{Deserialize, Serialize};

const MAX_LITERAL_DEPTH: usize = 100;

/// Structural decoding selected per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Plain,
    /// Flat lists become singly-linked `ListNode` chains
    LinkedList,
    /// Level-order lists with `None` holes become `TreeNode` trees
    Tree,
}

impl Variant {
    pub fn from_flags(is_linked_list: bool, is_tree: bool) -> Self {
        match (is_linked_list, is_tree) {
            (true, _) => Variant::LinkedList,
            (false, true) => Variant::Tree,
            (false, false) => Variant::Plain,
        }
    }

    /// Canonical shape of a value under this variant. Applied to expected
    /// values and snapshots alike, so both sides of a comparison agree.
    pub fn normalize(self, literal: Literal) -> Literal {
        if self == Variant::Plain {
            return literal;
        }
        match literal {
            Literal::List(items) if items.is_empty() => Literal::None,
            Literal::List(items) if items.iter().all(|item| matches!(item, Literal::List(_))) => {
                Literal::List(items.into_iter().map(|item| self.normalize(item)).collect())
            }
            Literal::List(mut items) if self == Variant::Tree => {
                while matches!(items.last(), Some(Literal::None)) {
                    items.pop();
                }
                if items.is_empty() {
                    Literal::None
                } else {
                    Literal::List(items)
                }
            }
            other => other,
        }
    }
}

/// A decoded fixture value, or a snapshot of a runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    /// Decimal digits of an integer outside the `i64` range, with a leading `-` when negative
    BigInt(String),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Set(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
    /// A runtime value with no literal form; never equal to anything
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed literal {text:?}: {message}")]
pub struct LiteralError {
    pub text: String,
    pub message: String,
}

pub fn decode(text: &str) -> Result<Literal, LiteralError> {
    let chars: Vec<char> = text.chars().collect();
    let mut parser = LiteralParser { chars: &chars, pos: 0 };
    let result = parser.parse_value(0).and_then(|value| {
        parser.skip_whitespace();
        if parser.pos < chars.len() {
            Err(format!("unexpected {:?} at offset {}", chars[parser.pos], parser.pos))
        } else {
            Ok(value)
        }
    });
    result.map_err(|message| LiteralError {
        text: text.to_string(),
        message,
    })
}

/// Decode and bring the value into the given variant's canonical shape
pub fn decode_with(text: &str, variant: Variant) -> Result<Literal, LiteralError> {
    Ok(variant.normalize(decode(text)?))
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

struct LiteralParser<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(found) => format!("expected {:?}, found {:?} at offset {}", c, found, self.pos),
                None => format!("expected {:?}, found end of input", c),
            })
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Literal, String> {
        if depth > MAX_LITERAL_DEPTH {
            return Err("nesting too deep".to_string());
        }
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Err("unexpected end of input".to_string());
        };
        match c {
            '[' => {
                self.pos += 1;
                let items = self.parse_items(']', depth)?;
                Ok(Literal::List(items.0))
            }
            '(' => {
                self.pos += 1;
                let (items, trailing_comma) = self.parse_items(')', depth)?;
                if items.len() == 1 && !trailing_comma {
                    return Ok(items.into_iter().next().unwrap_or(Literal::None));
                }
                Ok(Literal::Tuple(items))
            }
            '{' => {
                self.pos += 1;
                self.parse_brace(depth)
            }
            '\'' | '"' => self.parse_strings(),
            '+' | '-' => {
                self.pos += 1;
                self.skip_whitespace();
                let negative = c == '-';
                if self.peek().is_some_and(|next| next.is_ascii_digit() || next == '.') {
                    return self.parse_number(negative);
                }
                let operand = self.parse_value(depth + 1)?;
                apply_sign(negative, operand)
            }
            c if c.is_ascii_digit() || c == '.' => self.parse_number(false),
            c if is_name_start(c) => self.parse_name(),
            other => Err(format!("unexpected {:?} at offset {}", other, self.pos)),
        }
    }

    /// Comma-separated values up to `close`; reports whether the last item had a trailing comma
    fn parse_items(&mut self, close: char, depth: usize) -> Result<(Vec<Literal>, bool), String> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_value(depth + 1)?);
            trailing_comma = self.eat(',');
            if !trailing_comma {
                self.expect(close)?;
                return Ok((items, false));
            }
        }
    }

    fn parse_brace(&mut self, depth: usize) -> Result<Literal, String> {
        if self.eat('}') {
            return Ok(Literal::Dict(Vec::new()));
        }
        let first = self.parse_value(depth + 1)?;
        ensure_hashable(&first)?;
        if self.eat(':') {
            let value = self.parse_value(depth + 1)?;
            let mut pairs = vec![(first, value)];
            while self.eat(',') {
                if self.eat('}') {
                    return Ok(Literal::Dict(dedup_pairs(pairs)));
                }
                let key = self.parse_value(depth + 1)?;
                ensure_hashable(&key)?;
                self.expect(':')?;
                let value = self.parse_value(depth + 1)?;
                pairs.push((key, value));
            }
            self.expect('}')?;
            return Ok(Literal::Dict(dedup_pairs(pairs)));
        }
        let mut items = vec![first];
        while self.eat(',') {
            if self.eat('}') {
                return Ok(Literal::Set(dedup(items)));
            }
            let item = self.parse_value(depth + 1)?;
            ensure_hashable(&item)?;
            items.push(item);
        }
        self.expect('}')?;
        Ok(Literal::Set(dedup(items)))
    }

    fn parse_strings(&mut self) -> Result<Literal, String> {
        let mut text = String::new();
        loop {
            self.skip_whitespace();
            let raw = match self.peek() {
                Some('\'') | Some('"') => false,
                Some('r') | Some('R')
                    if matches!(self.chars.get(self.pos + 1), Some('\'') | Some('"')) =>
                {
                    self.pos += 1;
                    true
                }
                Some('u') | Some('U')
                    if matches!(self.chars.get(self.pos + 1), Some('\'') | Some('"')) =>
                {
                    self.pos += 1;
                    false
                }
                _ => break,
            };
            self.pos = scan_string(self.chars, self.pos, raw, &mut text)?;
        }
        Ok(Literal::Str(text))
    }

    fn parse_number(&mut self, negative: bool) -> Result<Literal, String> {
        let (literal, len) = scan_number(self.chars, self.pos, negative)?;
        self.pos += len;
        if self.peek().is_some_and(is_name_char) {
            return Err("invalid numeric literal".to_string());
        }
        Ok(literal)
    }

    fn parse_name(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        if matches!(self.peek(), Some('\'') | Some('"')) && self.pos - start == 1 {
            self.pos = start;
            return self.parse_strings();
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match name.as_str() {
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "None" => Ok(Literal::None),
            "inf" => Ok(Literal::Float(f64::INFINITY)),
            "nan" => Ok(Literal::Float(f64::NAN)),
            // the empty set has no display form of its own
            "set" => {
                self.expect('(')?;
                self.expect(')')?;
                Ok(Literal::Set(Vec::new()))
            }
            other => Err(format!("names are not literals: {}", other)),
        }
    }
}

fn apply_sign(negative: bool, operand: Literal) -> Result<Literal, String> {
    match operand {
        Literal::Int(value) if negative => Ok(value
            .checked_neg()
            .map(Literal::Int)
            .unwrap_or_else(|| Literal::BigInt(value.unsigned_abs().to_string()))),
        Literal::BigInt(digits) if negative => Ok(match digits.strip_prefix('-') {
            Some(positive) => integer_from_decimal(positive.to_string()),
            None => integer_from_decimal(format!("-{}", digits)),
        }),
        Literal::Float(value) if negative => Ok(Literal::Float(-value)),
        Literal::Int(_) | Literal::BigInt(_) | Literal::Float(_) => Ok(operand),
        _ => Err("unary sign applies only to numbers".to_string()),
    }
}

/// `Int` when the decimal text fits in 64 bits, `BigInt` otherwise
fn integer_from_decimal(text: String) -> Literal {
    match text.parse::<i64>() {
        Ok(value) => Literal::Int(value),
        Err(_) => Literal::BigInt(text),
    }
}

/// Decimal digits of an unsigned integer written in `radix`
fn to_decimal(digits: &str, radix: u32) -> Option<String> {
    // little-endian base 10
    let mut decimal: Vec<u8> = vec![0];
    for c in digits.chars() {
        let mut carry = c.to_digit(radix)?;
        for digit in decimal.iter_mut() {
            let value = u32::from(*digit) * radix + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            decimal.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    while decimal.len() > 1 && decimal.last() == Some(&0) {
        decimal.pop();
    }
    Some(decimal.iter().rev().map(|d| char::from(b'0' + d)).collect())
}

/// Scan a numeric literal at `start`; returns the value and its length in chars
fn scan_number(chars: &[char], start: usize, negative: bool) -> Result<(Literal, usize), String> {
    let mut pos = start;
    let at = |i: usize| chars.get(i).copied();
    let sign = if negative { "-" } else { "" };

    if at(pos) == Some('0') {
        let radix = match at(pos + 1) {
            Some('x') | Some('X') => Some(16),
            Some('o') | Some('O') => Some(8),
            Some('b') | Some('B') => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            pos += 2;
            let digits_start = pos;
            while at(pos).is_some_and(|c| c == '_' || c.is_digit(radix)) {
                pos += 1;
            }
            let digits: String = chars[digits_start..pos].iter().filter(|&&c| c != '_').collect();
            let decimal = to_decimal(&digits, radix)
                .filter(|_| !digits.is_empty())
                .ok_or_else(|| "invalid numeric literal".to_string())?;
            let literal = match decimal.as_str() {
                "0" => Literal::Int(0),
                _ => integer_from_decimal(format!("{}{}", sign, decimal)),
            };
            return Ok((literal, pos - start));
        }
    }

    let mut is_float = false;
    while at(pos).is_some_and(|c| c.is_ascii_digit() || c == '_') {
        pos += 1;
    }
    if at(pos) == Some('.') {
        is_float = true;
        pos += 1;
        while at(pos).is_some_and(|c| c.is_ascii_digit() || c == '_') {
            pos += 1;
        }
    }
    if matches!(at(pos), Some('e') | Some('E')) {
        let mut look = pos + 1;
        if matches!(at(look), Some('+') | Some('-')) {
            look += 1;
        }
        if at(look).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            pos = look;
            while at(pos).is_some_and(|c| c.is_ascii_digit() || c == '_') {
                pos += 1;
            }
        }
    }
    if matches!(at(pos), Some('j') | Some('J')) {
        return Err("complex literals are not supported".to_string());
    }

    let text: String = chars[start..pos].iter().filter(|&&c| c != '_').collect();
    if is_float {
        let value: f64 = text
            .parse()
            .map_err(|_| format!("invalid float literal '{}'", text))?;
        let value = if negative { -value } else { value };
        return Ok((Literal::Float(value), pos - start));
    }
    if text.is_empty() {
        return Err("invalid numeric literal".to_string());
    }
    if text.len() > 1 && text.starts_with('0') {
        if text.chars().any(|c| c != '0') {
            return Err("leading zeros in decimal integer literals are not permitted".to_string());
        }
        return Ok((Literal::Int(0), pos - start));
    }
    Ok((integer_from_decimal(format!("{}{}", sign, text)), pos - start))
}

/// Scan a quoted string whose opening quote is at `start`, appending its value; returns the end offset
fn scan_string(chars: &[char], start: usize, raw: bool, value: &mut String) -> Result<usize, String> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut pos = if triple { start + 3 } else { start + 1 };

    loop {
        let Some(&c) = chars.get(pos) else {
            return Err("unterminated string literal".to_string());
        };
        if c == quote {
            if !triple {
                return Ok(pos + 1);
            }
            if chars.get(pos + 1) == Some(&quote) && chars.get(pos + 2) == Some(&quote) {
                return Ok(pos + 3);
            }
            value.push(c);
            pos += 1;
            continue;
        }
        if c == '\n' && !triple {
            return Err("unterminated string literal".to_string());
        }
        if c != '\\' {
            value.push(c);
            pos += 1;
            continue;
        }

        let Some(&next) = chars.get(pos + 1) else {
            return Err("unterminated string literal".to_string());
        };
        pos += 2;
        if raw {
            value.push('\\');
            value.push(next);
            continue;
        }
        match next {
            '\n' => {}
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0' => value.push('\0'),
            'a' => value.push('\x07'),
            'b' => value.push('\x08'),
            'f' => value.push('\x0c'),
            'v' => value.push('\x0b'),
            '\\' => value.push('\\'),
            '\'' => value.push('\''),
            '"' => value.push('"'),
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.iter().skip(pos).take(width).collect();
                if digits.chars().count() != width || !digits.chars().all(|d| d.is_ascii_hexdigit()) {
                    return Err(format!("truncated \\{} escape", next));
                }
                let code = u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())?;
                let decoded = char::from_u32(code).ok_or_else(|| "invalid unicode escape".to_string())?;
                value.push(decoded);
                pos += width;
            }
            other => {
                value.push('\\');
                value.push(other);
            }
        }
    }
}

fn ensure_hashable(literal: &Literal) -> Result<(), String> {
    match literal {
        Literal::List(_) | Literal::Dict(_) | Literal::Set(_) => {
            Err("unhashable value used as dict key or set element".to_string())
        }
        Literal::Tuple(items) => items.iter().try_for_each(ensure_hashable),
        _ => Ok(()),
    }
}

fn dedup(items: Vec<Literal>) -> Vec<Literal> {
    let mut out: Vec<Literal> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|existing| existing.equals(&item)) {
            out.push(item);
        }
    }
    out
}

/// Later duplicate keys overwrite earlier values but keep the first position
fn dedup_pairs(pairs: Vec<(Literal, Literal)>) -> Vec<(Literal, Literal)> {
    let mut out: Vec<(Literal, Literal)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match out.iter_mut().find(|(existing, _)| existing.equals(&key)) {
            Some(slot) => slot.1 = value,
            None => out.push((key, value)),
        }
    }
    out
}

/// Shortest round-tripping float text, laid out the way Python prints floats
fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let scientific = format!("{:e}", x);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if (-4..16).contains(&exponent) {
        if exponent >= 0 {
            let int_len = exponent as usize + 1;
            if digits.len() > int_len {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            } else {
                out.push_str(&digits);
                out.push_str(&"0".repeat(int_len - digits.len()));
                out.push_str(".0");
            }
        } else {
            out.push_str("0.");
            out.push_str(&"0".repeat((-exponent - 1) as usize));
            out.push_str(&digits);
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        out.push_str(&format!("e{}{:02}", sign, exponent.abs()));
    }
    out
}

/// Python string repr: single quotes unless only double quotes avoid escaping
fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl Literal {
    fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Bool(b) => Some(*b as i64 as f64),
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Bool(b) => Some(*b as i64),
            Literal::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Structural equality deciding pass / fail.
    ///
    /// Numbers compare across bool, int and float. A list never equals a tuple
    /// and neither equals a scalar. Sets and dicts ignore order.
    pub fn equals(&self, other: &Literal) -> bool {
        if let (Some(a), Some(b)) = (self.as_int(), other.as_int()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        let seq_eq =
            |a: &[Literal], b: &[Literal]| a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y));
        match (self, other) {
            (Literal::None, Literal::None) => true,
            (Literal::BigInt(a), Literal::BigInt(b)) => a == b,
            // an integral float prints its exact value with no fraction digits
            (Literal::BigInt(digits), Literal::Float(f)) | (Literal::Float(f), Literal::BigInt(digits)) => {
                f.is_finite() && f.fract() == 0.0 && format!("{:.0}", f) == *digits
            }
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::List(a), Literal::List(b)) => seq_eq(a, b),
            (Literal::Tuple(a), Literal::Tuple(b)) => seq_eq(a, b),
            (Literal::Set(a), Literal::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.equals(y)))
            }
            (Literal::Dict(a), Literal::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter()
                            .any(|(other_k, other_v)| k.equals(other_k) && v.equals(other_v))
                    })
            }
            _ => false,
        }
    }

    pub fn repr(&self) -> String {
        let join = |items: &[Literal]| items.iter().map(Literal::repr).collect::<Vec<_>>().join(", ");
        match self {
            Literal::None => "None".to_string(),
            Literal::Bool(true) => "True".to_string(),
            Literal::Bool(false) => "False".to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::BigInt(digits) => digits.clone(),
            Literal::Float(f) => float_repr(*f),
            Literal::Str(s) => str_repr(s),
            Literal::List(items) => format!("[{}]", join(items)),
            Literal::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Literal::Tuple(items) => format!("({})", join(items)),
            Literal::Set(items) if items.is_empty() => "set()".to_string(),
            Literal::Set(items) => format!("{{{}}}", join(items)),
            Literal::Dict(pairs) => {
                let body = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{}}}", body)
            }
            Literal::Opaque(text) => text.clone(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}
