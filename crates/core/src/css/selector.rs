/// Minimal CSS selector matching engine for locating form fields.
/// Supports: tag, *, .class, #id, [attr], [attr=value] (plus ~= ^= $= *=),
/// :has(...), comma-separated lists, and the descendant, child (>),
/// adjacent sibling (+) and general sibling (~) combinators.
use crate::dom::DomNode;
use crate::error::SelectorError;
use std::fmt;
use std::str::FromStr;

/// A comma-separated list of selectors; matches when any member matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    pub selectors: Vec<Selector>,
    source: String,
}

/// A single selector (one part of a comma-separated list).
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub parts: Vec<SelectorPart>,
}

/// A component of a selector chain.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorPart {
    /// Matches a tag name: `td`, `select`, etc.
    Tag(String),
    /// Matches a class: `.foo`
    Class(String),
    /// Matches an ID: `#bar`
    Id(String),
    /// Matches an attribute: `[name]`, `[title="TestVersion"]`
    Attribute(String, Option<(AttrOp, String)>),
    /// Universal selector (*)
    Universal,
    /// `:has(...)`: some element related to this one matches the inner list
    Has(SelectorList),
    Combinator(Combinator),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    Adjacent,
    /// `~`
    Sibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

impl SelectorList {
    /// Parse a selector list such as `td[title="A"] + td input, select.x`.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        parse_list(input, false)
    }

    /// Whether the element at `path` (relative to `root`) matches.
    pub fn matches(&self, root: &DomNode, path: &[usize]) -> bool {
        self.selectors
            .iter()
            .any(|s| s.matches_relative(root, path, None))
    }

    /// Every matching element below `root`, in document order.
    pub fn query(&self, root: &DomNode) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        root.walk_elements(&mut |path, _| {
            if self.matches(root, path) {
                out.push(path.to_vec());
            }
        });
        out
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Quote a value for use inside an attribute selector.
pub fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn parse_list(input: &str, relative: bool) -> Result<SelectorList, SelectorError> {
    let mut selectors = Vec::new();
    for piece in split_top_level(input)? {
        selectors.push(parse_selector(piece, relative)?);
    }
    Ok(SelectorList {
        selectors,
        source: input.trim().to_string(),
    })
}

/// Split on commas that are outside quotes and parentheses.
fn split_top_level(input: &str) -> Result<Vec<&str>, SelectorError> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
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
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::Unbalanced(input.to_string()))?;
            }
            ',' if depth == 0 => {
                pieces.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(SelectorError::Unbalanced(input.to_string()));
    }
    pieces.push(&input[start..]);
    Ok(pieces)
}

/// Parse a single selector string into a Selector.
fn parse_selector(input: &str, relative: bool) -> Result<Selector, SelectorError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SelectorError::Empty);
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '.' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let class_name = read_ident(&mut chars);
                if class_name.is_empty() {
                    return Err(SelectorError::Expected("class name", input.to_string()));
                }
                parts.push(SelectorPart::Class(class_name));
            }
            '#' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let id_name = read_ident(&mut chars);
                if id_name.is_empty() {
                    return Err(SelectorError::Expected("id", input.to_string()));
                }
                parts.push(SelectorPart::Id(id_name));
            }
            '[' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                parts.push(read_attribute(&mut chars, input)?);
            }
            ':' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                let pseudo = read_ident(&mut chars);
                if pseudo != "has" || chars.peek() != Some(&'(') {
                    return Err(SelectorError::Unsupported(format!(":{}", pseudo)));
                }
                chars.next();
                let inner = read_parenthesized(&mut chars, input)?;
                parts.push(SelectorPart::Has(parse_list(&inner, true)?));
            }
            '>' | '+' | '~' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                skip_whitespace(&mut chars);
                let combinator = match ch {
                    '>' => Combinator::Child,
                    '+' => Combinator::Adjacent,
                    _ => Combinator::Sibling,
                };
                push_combinator(&mut parts, combinator, relative, input)?;
            }
            ' ' | '\t' | '\n' | '\r' => {
                flush_tag(&mut current, &mut parts);
                skip_whitespace(&mut chars);
                // Check if next char is an explicit combinator
                if let Some(&next) = chars.peek() {
                    if next != '>' && next != '+' && next != '~' && !parts.is_empty() {
                        parts.push(SelectorPart::Combinator(Combinator::Descendant));
                    }
                }
            }
            '*' => {
                flush_tag(&mut current, &mut parts);
                chars.next();
                parts.push(SelectorPart::Universal);
            }
            c if c.is_alphanumeric() || c == '-' || c == '_' => {
                current.push(c);
                chars.next();
            }
            other => return Err(SelectorError::Unexpected(other, input.to_string())),
        }
    }

    flush_tag(&mut current, &mut parts);

    if matches!(parts.last(), Some(SelectorPart::Combinator(_)) | None) {
        return Err(SelectorError::Expected("compound selector", input.to_string()));
    }
    Ok(Selector { parts })
}

fn push_combinator(
    parts: &mut Vec<SelectorPart>,
    combinator: Combinator,
    relative: bool,
    input: &str,
) -> Result<(), SelectorError> {
    // An explicit combinator replaces the implicit descendant one that whitespace produced
    if let Some(SelectorPart::Combinator(Combinator::Descendant)) = parts.last() {
        parts.pop();
    }
    match parts.last() {
        None if !relative => {
            Err(SelectorError::Expected("compound selector", input.to_string()))
        }
        Some(SelectorPart::Combinator(_)) => {
            Err(SelectorError::Expected("compound selector", input.to_string()))
        }
        _ => {
            parts.push(SelectorPart::Combinator(combinator));
            Ok(())
        }
    }
}

fn flush_tag(current: &mut String, parts: &mut Vec<SelectorPart>) {
    let tag = current.trim().to_string();
    if !tag.is_empty() {
        parts.push(SelectorPart::Tag(tag.to_lowercase()));
        current.clear();
    }
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars>) {
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }
}

/// Read `name`, `name=value` or `name op "value"` up to the closing `]`.
fn read_attribute(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    input: &str,
) -> Result<SelectorPart, SelectorError> {
    skip_whitespace(chars);
    let name = read_ident(chars);
    if name.is_empty() {
        return Err(SelectorError::Expected("attribute name", input.to_string()));
    }
    skip_whitespace(chars);

    let op = match chars.next() {
        Some(']') => return Ok(SelectorPart::Attribute(name, None)),
        Some('=') => AttrOp::Equals,
        Some(c @ ('~' | '^' | '$' | '*')) => {
            if chars.next() != Some('=') {
                return Err(SelectorError::Expected("'='", input.to_string()));
            }
            match c {
                '~' => AttrOp::Includes,
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Substring,
            }
        }
        _ => return Err(SelectorError::Expected("']'", input.to_string())),
    };

    skip_whitespace(chars);
    let mut value = String::new();
    match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => return Err(SelectorError::Unbalanced(input.to_string())),
                    },
                    Some(c) if c == quote => break,
                    Some(c) => value.push(c),
                    None => return Err(SelectorError::Unbalanced(input.to_string())),
                }
            }
        }
        _ => {
            while let Some(&vc) = chars.peek() {
                if vc == ']' || vc.is_whitespace() {
                    break;
                }
                value.push(vc);
                chars.next();
            }
        }
    }
    skip_whitespace(chars);
    if chars.next() != Some(']') {
        return Err(SelectorError::Expected("']'", input.to_string()));
    }
    Ok(SelectorPart::Attribute(name, Some((op, value))))
}

/// Read up to the matching `)`, honoring nested parentheses and quotes.
fn read_parenthesized(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    input: &str,
) -> Result<String, SelectorError> {
    let mut inner = String::new();
    let mut depth = 1;
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            inner.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    inner.push(next);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(inner);
                }
            }
            _ => {}
        }
        inner.push(c);
    }
    Err(SelectorError::Unbalanced(input.to_string()))
}

/// One compound selector plus the combinator linking it to the compound on its left.
struct Segment<'a> {
    compound: Vec<&'a SelectorPart>,
    combinator: Option<Combinator>,
}

impl Selector {
    fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::new();
        let mut pending: Option<Combinator> = None;
        let mut compound = Vec::new();

        for part in &self.parts {
            match part {
                SelectorPart::Combinator(c) => {
                    if !compound.is_empty() {
                        segments.push(Segment {
                            compound: std::mem::take(&mut compound),
                            combinator: pending,
                        });
                    }
                    pending = Some(*c);
                }
                _ => compound.push(part),
            }
        }
        if !compound.is_empty() {
            segments.push(Segment {
                compound,
                combinator: pending,
            });
        }
        segments
    }

    /// Match against the element at `path`. With an `anchor`, the selector is
    /// relative (as inside `:has()`) and its leftmost compound must relate to it.
    fn matches_relative(&self, root: &DomNode, path: &[usize], anchor: Option<&[usize]>) -> bool {
        let segments = self.segments();
        if segments.is_empty() {
            return false;
        }
        match_from(&segments, segments.len() - 1, root, path, anchor)
    }
}

fn match_from(
    segments: &[Segment<'_>],
    idx: usize,
    root: &DomNode,
    path: &[usize],
    anchor: Option<&[usize]>,
) -> bool {
    let node = match root.node_at(path) {
        Some(n) if n.is_element() => n,
        _ => return false,
    };
    if !compound_matches(&segments[idx].compound, root, path, node) {
        return false;
    }

    let combinator = segments[idx].combinator;
    if idx == 0 {
        return match anchor {
            None => true,
            Some(anchor) => related(
                combinator.unwrap_or(Combinator::Descendant),
                root,
                anchor,
                path,
            ),
        };
    }

    let combinator = combinator.unwrap_or(Combinator::Descendant);
    candidates(combinator, root, path)
        .iter()
        .any(|candidate| match_from(segments, idx - 1, root, candidate, anchor))
}

/// Elements that can stand on the left of `combinator` when `path` is on its right.
fn candidates(combinator: Combinator, root: &DomNode, path: &[usize]) -> Vec<Vec<usize>> {
    match combinator {
        Combinator::Child => parent_path(path).map(|p| vec![p.to_vec()]).unwrap_or_default(),
        Combinator::Descendant => {
            let mut out = Vec::new();
            let mut current = parent_path(path);
            while let Some(p) = current {
                out.push(p.to_vec());
                current = parent_path(p);
            }
            out
        }
        Combinator::Adjacent => previous_siblings(root, path).into_iter().take(1).collect(),
        Combinator::Sibling => previous_siblings(root, path),
    }
}

/// Whether `left <combinator> right` holds.
fn related(combinator: Combinator, root: &DomNode, left: &[usize], right: &[usize]) -> bool {
    candidates(combinator, root, right)
        .iter()
        .any(|c| c.as_slice() == left)
}

fn parent_path(path: &[usize]) -> Option<&[usize]> {
    if path.is_empty() {
        None
    } else {
        Some(&path[..path.len() - 1])
    }
}

/// Preceding element siblings, nearest first.
fn previous_siblings(root: &DomNode, path: &[usize]) -> Vec<Vec<usize>> {
    let (Some(parent_path), Some(&last)) = (parent_path(path), path.last()) else {
        return Vec::new();
    };
    let Some(parent) = root.node_at(parent_path) else {
        return Vec::new();
    };
    (0..last)
        .rev()
        .filter(|&i| parent.children.get(i).is_some_and(DomNode::is_element))
        .map(|i| {
            let mut sibling = parent_path.to_vec();
            sibling.push(i);
            sibling
        })
        .collect()
}

fn compound_matches(
    compound: &[&SelectorPart],
    root: &DomNode,
    path: &[usize],
    node: &DomNode,
) -> bool {
    compound.iter().all(|part| match part {
        SelectorPart::Tag(t) => node.tag.eq_ignore_ascii_case(t),
        SelectorPart::Class(c) => node.classes().any(|cl| cl == c),
        SelectorPart::Id(i) => node.get_attr("id") == Some(i.as_str()),
        SelectorPart::Attribute(name, expected) => match (node.get_attr(name), expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some((op, value))) => attr_matches(*op, actual, value),
        },
        SelectorPart::Has(list) => has_match(list, root, path),
        SelectorPart::Universal => true,
        SelectorPart::Combinator(_) => true, // handled by segments
    })
}

fn attr_matches(op: AttrOp, actual: &str, value: &str) -> bool {
    match op {
        AttrOp::Equals => actual == value,
        AttrOp::Includes => actual.split_whitespace().any(|w| w == value),
        AttrOp::Prefix => !value.is_empty() && actual.starts_with(value),
        AttrOp::Suffix => !value.is_empty() && actual.ends_with(value),
        AttrOp::Substring => !value.is_empty() && actual.contains(value),
    }
}

fn has_match(list: &SelectorList, root: &DomNode, anchor: &[usize]) -> bool {
    let mut found = false;
    root.walk_elements(&mut |candidate, _| {
        if !found {
            found = list
                .selectors
                .iter()
                .any(|s| s.matches_relative(root, candidate, Some(anchor)));
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adjacent_combinator_with_spaces() {
        let list = SelectorList::parse(r#"td[title="A"] + td input.x"#).unwrap();
        let parts = &list.selectors[0].parts;
        assert_eq!(parts[0], SelectorPart::Tag("td".into()));
        assert_eq!(
            parts[1],
            SelectorPart::Attribute("title".into(), Some((AttrOp::Equals, "A".into())))
        );
        assert_eq!(parts[2], SelectorPart::Combinator(Combinator::Adjacent));
        assert_eq!(parts[4], SelectorPart::Combinator(Combinator::Descendant));
        assert_eq!(parts.len(), 7);
    }

    #[test]
    fn quoted_value_round_trips_through_parser() {
        let sel = format!("[value={}]", quote_value(r#"cmd "x" /c"#));
        let list = SelectorList::parse(&sel).unwrap();
        assert_eq!(
            list.selectors[0].parts[0],
            SelectorPart::Attribute("value".into(), Some((AttrOp::Equals, r#"cmd "x" /c"#.into())))
        );
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("td +").is_err());
        assert!(SelectorList::parse("> td").is_err());
        assert!(SelectorList::parse("td:hover").is_err());
        assert!(SelectorList::parse("[title=\"x]").is_err());
        assert!(SelectorList::parse("div:has(span").is_err());
    }
}
