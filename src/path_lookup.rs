use serde_yaml_ng::Value;

/// One step of a path expression.
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Splits `image.repository`, `images[0].tag`, `images.0.tag` or
/// `labels['app.kubernetes.io/version']` into segments.
///
/// Purely numeric unquoted segments are treated as sequence indices, but still fall
/// back to a mapping key lookup when applied to a mapping. Quoted bracket keys are
/// always keys and may contain dots.
fn parse(path: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(next) = rest.strip_prefix('.') {
            rest = next;
        } else if let Some(inner) = rest.strip_prefix('[') {
            match inner.chars().next().filter(|c| *c == '\'' || *c == '"') {
                Some(quote) => {
                    let body = &inner[1..];
                    let Some(end) = body.find(quote) else {
                        segments.push(Segment::Key(body));
                        break;
                    };
                    segments.push(Segment::Key(&body[..end]));
                    let after = &body[end + 1..];
                    rest = after.strip_prefix(']').unwrap_or(after);
                }
                None => {
                    let Some(end) = inner.find(']') else {
                        push_token(&mut segments, inner);
                        break;
                    };
                    push_token(&mut segments, &inner[..end]);
                    rest = &inner[end + 1..];
                }
            }
        } else {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            push_token(&mut segments, &rest[..end]);
            rest = &rest[end..];
        }
    }
    segments
}

fn push_token<'a>(segments: &mut Vec<Segment<'a>>, token: &'a str) {
    if token.is_empty() {
        return;
    }
    match token.parse::<usize>() {
        Ok(index) => segments.push(Segment::Index(index)),
        Err(_) => segments.push(Segment::Key(token)),
    }
}

fn step<'v>(value: &'v Value, segment: &Segment<'_>) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Tagged(tagged), _) => step(&tagged.value, segment),
        (Value::Mapping(_), Segment::Key(key)) => value.get(*key),
        (Value::Mapping(_), Segment::Index(index)) => value
            .get(index.to_string().as_str())
            .or_else(|| value.get(*index)),
        (Value::Sequence(seq), Segment::Index(index)) => seq.get(*index),
        _ => None,
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Looks up `path` in `tree` and renders the scalar found there.
///
/// Returns `default` when the path does not resolve, or resolves to `null` or to a
/// mapping/sequence.
pub fn lookup(tree: &Value, path: &str, default: Option<String>) -> Option<String> {
    let mut current = tree;
    for segment in parse(path) {
        match step(current, &segment) {
            Some(next) => current = next,
            None => return default,
        }
    }
    scalar_to_string(current).or(default)
}
