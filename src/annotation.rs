//! Gold-annotation literal parsing and participant-response normalization.
//!
//! Datasets encode gold labels as a Python-style list-of-tuples literal such
//! as `"[(0,3,'ORG'), (7,12,'PER')]"`. Participant endpoints are free to
//! answer in any of a few accepted JSON shapes. Both are reduced here to the
//! canonical [`Span`] list the scorer consumes.
//!
//! > ⚠️ The literal parser is hand-rolled and intentionally minimal: it
//! > understands integers, quoted strings and tuple/list nesting one level
//! > deep. Anything else makes the whole literal parse to an empty list,
//! > which is also what a malformed gold row deserves.

use serde_json::Value;

use crate::model::Span;

/// Parses a list-of-triples literal (`"[(0,3,'ORG')]"`) into canonical spans.
///
/// Tuples that are not `(int, int, string)` — wrong arity, wrong element
/// types, a negative start, or inverted (`end <= start`) — are dropped while
/// their valid siblings survive. Any syntax error yields an empty list rather
/// than an error: a gold row that cannot be parsed contributes no spans.
pub fn parse_annotation_literal(literal: &str) -> Vec<Span> {
    let mut parser = LiteralParser::new(literal);
    parser.parse().unwrap_or_default()
}

struct LiteralParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

enum Item {
    Int(i64),
    Str(String),
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn parse(&mut self) -> Option<Vec<Span>> {
        self.skip_ws();
        self.expect('[')?;
        let mut spans = Vec::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some(']') => {
                    self.chars.next();
                    break;
                }
                Some('(') | Some('[') => {
                    if let Some(span) = self.parse_triple()? {
                        spans.push(span);
                    }
                    self.skip_ws();
                    if self.chars.peek() == Some(&',') {
                        self.chars.next();
                    }
                }
                _ => return None,
            }
        }
        self.skip_ws();
        if self.chars.next().is_some() {
            // trailing garbage after the closing bracket
            return None;
        }
        Some(spans)
    }

    /// Parses one tuple. Returns `Some(None)` for a well-formed tuple that is
    /// not a valid `(int, int, string)` triple (wrong arity, wrong element
    /// types, negative or inverted), `None` for a syntax error.
    fn parse_triple(&mut self) -> Option<Option<Span>> {
        let open = self.chars.next()?;
        let close = if open == '(' { ')' } else { ']' };

        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.chars.peek() == Some(&close) {
                self.chars.next();
                break;
            }
            items.push(self.parse_item()?);
            self.skip_ws();
            if self.chars.peek() == Some(&',') {
                self.chars.next();
            }
        }

        let (start, end, label) = match items.as_slice() {
            [Item::Int(start), Item::Int(end), Item::Str(label)] => (*start, *end, label.as_str()),
            _ => return Some(None),
        };
        if start < 0 || end <= start {
            return Some(None);
        }
        Some(Some(Span::new(start as usize, end as usize, label)))
    }

    fn parse_item(&mut self) -> Option<Item> {
        self.skip_ws();
        match self.chars.peek()? {
            '\'' | '"' => self.parse_string().map(Item::Str),
            '-' => self.parse_int().map(Item::Int),
            c if c.is_ascii_digit() => self.parse_int().map(Item::Int),
            _ => None,
        }
    }

    fn parse_int(&mut self) -> Option<i64> {
        self.skip_ws();
        let mut text = String::new();
        if self.chars.peek() == Some(&'-') {
            text.push(self.chars.next()?);
        }
        while let Some(c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(self.chars.next()?);
            } else {
                break;
            }
        }
        text.parse().ok()
    }

    fn parse_string(&mut self) -> Option<String> {
        self.skip_ws();
        let quote = self.chars.next()?;
        if quote != '\'' && quote != '"' {
            return None;
        }
        let mut text = String::new();
        loop {
            let c = self.chars.next()?;
            if c == quote {
                break;
            }
            text.push(c);
        }
        Some(text)
    }

    fn expect(&mut self, wanted: char) -> Option<()> {
        self.skip_ws();
        (self.chars.next()? == wanted).then_some(())
    }

    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }
}

/// Normalizes a participant's JSON response body into canonical spans.
///
/// Accepted shapes:
/// - `{"spans": [{"start_index": 0, "end_index": 3, "entity": "ORG"}, ...]}`
/// - `{"annotation": "[(0,3,'ORG')]"}` or `{"annotation": [[0,3,"ORG"], ...]}`
/// - a bare list of either item shape above
///
/// Items within a recognized list that do not match are skipped. A body that
/// matches none of the shapes returns `None`, which the worker records as a
/// failed sample.
pub fn normalize_prediction(body: &Value) -> Option<Vec<Span>> {
    match body {
        Value::Object(map) => {
            if let Some(spans) = map.get("spans") {
                let items = spans.as_array().cloned().unwrap_or_default();
                Some(items.iter().filter_map(span_from_object).collect())
            } else if let Some(annotation) = map.get("annotation") {
                match annotation {
                    Value::String(literal) => Some(parse_annotation_literal(literal)),
                    Value::Array(items) => {
                        Some(items.iter().filter_map(span_from_triple).collect())
                    }
                    _ => None,
                }
            } else {
                None
            }
        }
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| span_from_object(item).or_else(|| span_from_triple(item)))
                .collect(),
        ),
        _ => None,
    }
}

fn span_from_object(item: &Value) -> Option<Span> {
    let map = item.as_object()?;
    let start = map.get("start_index")?.as_u64()?;
    let end = map.get("end_index")?.as_u64()?;
    let label = map.get("entity")?.as_str()?;
    Some(Span::new(start as usize, end as usize, label))
}

fn span_from_triple(item: &Value) -> Option<Span> {
    let triple = item.as_array()?;
    if triple.len() != 3 {
        return None;
    }
    let start = triple[0].as_u64()?;
    let end = triple[1].as_u64()?;
    let label = triple[2].as_str()?;
    Some(Span::new(start as usize, end as usize, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_single_triple() {
        let spans = parse_annotation_literal("[(0,3,'ORG')]");
        assert_eq!(spans, vec![Span::new(0, 3, "ORG")]);
    }

    #[test]
    fn parses_multiple_triples_with_spacing() {
        let spans = parse_annotation_literal("[ (0, 3, 'ORG') , (7, 12, \"PER\") ]");
        assert_eq!(spans, vec![Span::new(0, 3, "ORG"), Span::new(7, 12, "PER")]);
    }

    #[test]
    fn parses_list_style_triples() {
        let spans = parse_annotation_literal("[[0,3,'ORG']]");
        assert_eq!(spans, vec![Span::new(0, 3, "ORG")]);
    }

    #[test]
    fn drops_inverted_and_negative_spans() {
        assert!(parse_annotation_literal("[(5,5,'ORG')]").is_empty());
        assert!(parse_annotation_literal("[(7,3,'ORG')]").is_empty());
        assert!(parse_annotation_literal("[(-1,3,'ORG')]").is_empty());
        // valid triples around an invalid one survive
        let spans = parse_annotation_literal("[(0,3,'A'),(9,4,'B'),(5,8,'C')]");
        assert_eq!(spans, vec![Span::new(0, 3, "A"), Span::new(5, 8, "C")]);
    }

    #[test]
    fn wrong_arity_tuples_are_dropped_not_fatal() {
        assert!(parse_annotation_literal("[(0,3)]").is_empty());
        assert!(parse_annotation_literal("[(0,3,'ORG',9)]").is_empty());
        // the bad tuple is skipped, its siblings survive
        let spans = parse_annotation_literal("[(0,3),(5,8,'ORG')]");
        assert_eq!(spans, vec![Span::new(5, 8, "ORG")]);
        let spans = parse_annotation_literal("[(0,3,'ORG'),(5,'PER',8)]");
        assert_eq!(spans, vec![Span::new(0, 3, "ORG")]);
    }

    #[test]
    fn garbage_parses_to_empty() {
        assert!(parse_annotation_literal("").is_empty());
        assert!(parse_annotation_literal("not a list").is_empty());
        assert!(parse_annotation_literal("[(0,3,'ORG')] trailing").is_empty());
    }

    #[test]
    fn empty_list_is_valid() {
        assert_eq!(parse_annotation_literal("[]"), vec![]);
    }

    #[test]
    fn normalizes_spans_object() {
        let body = json!({"spans": [
            {"start_index": 0, "end_index": 3, "entity": "ORG"},
            {"start_index": "bad", "end_index": 3, "entity": "ORG"},
        ]});
        let spans = normalize_prediction(&body).unwrap();
        assert_eq!(spans, vec![Span::new(0, 3, "ORG")]);
    }

    #[test]
    fn normalizes_annotation_literal_and_list() {
        let body = json!({"annotation": "[(0,3,'ORG')]"});
        assert_eq!(
            normalize_prediction(&body).unwrap(),
            vec![Span::new(0, 3, "ORG")]
        );

        let body = json!({"annotation": [[0, 3, "ORG"], [1, 2]]});
        assert_eq!(
            normalize_prediction(&body).unwrap(),
            vec![Span::new(0, 3, "ORG")]
        );
    }

    #[test]
    fn normalizes_bare_list() {
        let body = json!([
            {"start_index": 0, "end_index": 3, "entity": "ORG"},
            [7, 12, "PER"],
        ]);
        let spans = normalize_prediction(&body).unwrap();
        assert_eq!(spans, vec![Span::new(0, 3, "ORG"), Span::new(7, 12, "PER")]);
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        assert!(normalize_prediction(&json!("just a string")).is_none());
        assert!(normalize_prediction(&json!(42)).is_none());
        assert!(normalize_prediction(&json!({"result": []})).is_none());
        assert!(normalize_prediction(&json!({"annotation": 42})).is_none());
    }
}
