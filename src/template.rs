//! Mustache-style templates for derived fields.
//!
//! Supports variables (`{{name}}`, `{{{name}}}`, `{{& name}}`), dotted names,
//! the implicit iterator `{{.}}`, sections, inverted sections and comments.
//! Partials and delimiter changes are rejected when compiling.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed tag at offset {0}")]
    UnclosedTag(usize),
    #[error("empty tag at offset {0}")]
    EmptyTag(usize),
    #[error("invalid name {0:?}")]
    InvalidName(String),
    #[error("unexpected close of section {0:?}")]
    UnexpectedClose(String),
    #[error("section {expected:?} closed by {found:?}")]
    MismatchedClose { expected: String, found: String },
    #[error("unclosed section {0:?}")]
    UnclosedSection(String),
    #[error("unsupported tag {0:?}")]
    Unsupported(String),
}

/// A data context that names are resolved against
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Map(&'a Map<String, Value>),
    Value(&'a Value),
}

impl<'a> Scope<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        match *self {
            Scope::Map(map) => map.get(key),
            Scope::Value(Value::Object(map)) => map.get(key),
            Scope::Value(_) => None,
        }
    }

    fn is_truthy(&self) -> bool {
        match *self {
            Scope::Map(_) => true,
            Scope::Value(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
                Value::String(s) => !s.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(_) => true,
            },
        }
    }

    fn write_text(&self, out: &mut String, escape: bool) {
        let text = match *self {
            Scope::Map(map) => serde_json::to_string(map).unwrap_or_default(),
            Scope::Value(Value::Null) => return,
            Scope::Value(Value::String(s)) => {
                push_text(out, s, escape);
                return;
            }
            Scope::Value(other) => other.to_string(),
        };
        push_text(out, &text, escape);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Name {
    Implicit,
    Path(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Variable {
        name: Name,
        escape: bool,
    },
    Section {
        name: Name,
        inverted: bool,
        children: Vec<Node>,
    },
}

struct OpenSection {
    raw: String,
    name: Name,
    inverted: bool,
    children: Vec<Node>,
}

/// A compiled template, reusable across records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut root: Vec<Node> = Vec::new();
        let mut open: Vec<OpenSection> = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                current(&mut open, &mut root).push(Node::Text(rest[..start].to_string()));
            }
            let tag_offset = offset + start;
            let after = &rest[start + 2..];

            let consumed = if let Some(inner) = after.strip_prefix('{') {
                let end = inner
                    .find("}}}")
                    .ok_or(TemplateError::UnclosedTag(tag_offset))?;
                let name = inner[..end].trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyTag(tag_offset));
                }
                current(&mut open, &mut root).push(Node::Variable {
                    name: parse_name(name)?,
                    escape: false,
                });
                2 + 1 + end + 3
            } else {
                let end = after
                    .find("}}")
                    .ok_or(TemplateError::UnclosedTag(tag_offset))?;
                Self::compile_tag(after[..end].trim(), tag_offset, &mut open, &mut root)?;
                2 + end + 2
            };

            rest = &rest[start + consumed..];
            offset += start + consumed;
        }

        if !rest.is_empty() {
            current(&mut open, &mut root).push(Node::Text(rest.to_string()));
        }
        if let Some(section) = open.pop() {
            return Err(TemplateError::UnclosedSection(section.raw));
        }

        Ok(Self { nodes: root })
    }

    fn compile_tag(
        tag: &str,
        tag_offset: usize,
        open: &mut Vec<OpenSection>,
        root: &mut Vec<Node>,
    ) -> Result<(), TemplateError> {
        let Some(sigil) = tag.chars().next() else {
            return Err(TemplateError::EmptyTag(tag_offset));
        };
        let body = tag[sigil.len_utf8()..].trim();

        match sigil {
            '!' => {}
            '>' | '=' | '<' | '$' => return Err(TemplateError::Unsupported(tag.to_string())),
            '#' | '^' | '/' | '&' if body.is_empty() => {
                return Err(TemplateError::EmptyTag(tag_offset));
            }
            '#' | '^' => open.push(OpenSection {
                raw: body.to_string(),
                name: parse_name(body)?,
                inverted: sigil == '^',
                children: Vec::new(),
            }),
            '/' => {
                let section = open
                    .pop()
                    .ok_or_else(|| TemplateError::UnexpectedClose(body.to_string()))?;
                if section.raw != body {
                    return Err(TemplateError::MismatchedClose {
                        expected: section.raw,
                        found: body.to_string(),
                    });
                }
                current(open, root).push(Node::Section {
                    name: section.name,
                    inverted: section.inverted,
                    children: section.children,
                });
            }
            '&' => current(open, root).push(Node::Variable {
                name: parse_name(body)?,
                escape: false,
            }),
            _ => current(open, root).push(Node::Variable {
                name: parse_name(tag)?,
                escape: true,
            }),
        }
        Ok(())
    }

    /// Render against a scope chain; the first scope holding a name wins.
    ///
    /// Missing names render as the empty string.
    pub fn render(&self, scopes: &[Scope<'_>]) -> String {
        // Innermost scope lives at the end of the chain.
        let mut chain: Vec<Scope<'_>> = scopes.iter().rev().copied().collect();
        let mut out = String::new();
        render_nodes(&self.nodes, &mut chain, &mut out);
        out
    }
}

fn current<'s>(open: &'s mut [OpenSection], root: &'s mut Vec<Node>) -> &'s mut Vec<Node> {
    match open.last_mut() {
        Some(section) => &mut section.children,
        None => root,
    }
}

fn parse_name(raw: &str) -> Result<Name, TemplateError> {
    if raw == "." {
        return Ok(Name::Implicit);
    }
    let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
    let valid = segments
        .iter()
        .all(|s| !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '{' || c == '}'));
    if !valid {
        return Err(TemplateError::InvalidName(raw.to_string()));
    }
    Ok(Name::Path(segments))
}

fn lookup<'a>(chain: &[Scope<'a>], name: &Name) -> Option<Scope<'a>> {
    let segments = match name {
        Name::Implicit => return chain.last().copied(),
        Name::Path(segments) => segments,
    };
    let (first, rest) = segments.split_first()?;

    // Once the first segment resolves, the rest must resolve inside it.
    let mut value = chain.iter().rev().find_map(|scope| scope.get(first))?;
    for segment in rest {
        value = Scope::Value(value).get(segment)?;
    }
    Some(Scope::Value(value))
}

fn render_nodes<'a>(nodes: &[Node], chain: &mut Vec<Scope<'a>>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => {
                if let Some(value) = lookup(chain, name) {
                    value.write_text(out, *escape);
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(chain, name);
                let truthy = value.map(|v| v.is_truthy()).unwrap_or(false);
                if *inverted {
                    if !truthy {
                        render_nodes(children, chain, out);
                    }
                    continue;
                }
                match value {
                    Some(Scope::Value(Value::Array(items))) if truthy => {
                        for item in items {
                            chain.push(Scope::Value(item));
                            render_nodes(children, chain, out);
                            chain.pop();
                        }
                    }
                    Some(scope) if truthy => {
                        chain.push(scope);
                        render_nodes(children, chain, out);
                        chain.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn push_text(out: &mut String, text: &str, escape: bool) {
    if !escape {
        out.push_str(text);
        return;
    }
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '\0' => out.push('\u{FFFD}'),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn render(source: &str, payload: Value) -> String {
        let payload = object(payload);
        Template::compile(source)
            .unwrap()
            .render(&[Scope::Map(&payload)])
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("no tags here", json!({})), "no tags here");
    }

    #[test]
    fn test_variables_and_types() {
        let payload = json!({"s": "str", "n": 42, "f": 1.5, "b": true, "z": null, "a": [1, 2]});
        assert_eq!(
            render("{{s}} {{n}} {{f}} {{b}} [{{z}}] {{{a}}}", payload),
            "str 42 1.5 true [] [1,2]"
        );
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        assert_eq!(render("a{{missing}}b", json!({})), "ab");
        assert_eq!(render("{{missing.deep}}", json!({})), "");
    }

    #[test]
    fn test_html_escaping() {
        let payload = json!({"v": "<a href=\"x\">&'</a>"});
        assert_eq!(
            render("{{v}}", payload.clone()),
            "&lt;a href=&#34;x&#34;&gt;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(render("{{{v}}}", payload.clone()), "<a href=\"x\">&'</a>");
        assert_eq!(render("{{& v}}", payload), "<a href=\"x\">&'</a>");
    }

    #[test]
    fn test_dotted_names() {
        let payload = json!({"http": {"request": {"path": "/api"}}});
        assert_eq!(render("{{http.request.path}}", payload), "/api");
    }

    #[test]
    fn test_dotted_name_does_not_fall_back() {
        let payload = object(json!({"a": {"x": 1}}));
        let builtins = object(json!({"a": {"b": "outer"}}));
        let template = Template::compile("[{{a.b}}]").unwrap();
        assert_eq!(
            template.render(&[Scope::Map(&payload), Scope::Map(&builtins)]),
            "[]"
        );
    }

    #[test]
    fn test_first_scope_wins() {
        let payload = object(json!({"message": "from payload"}));
        let builtins = object(json!({"message": "builtin", "id": "42"}));
        let template = Template::compile("{{message}}/{{id}}").unwrap();
        assert_eq!(
            template.render(&[Scope::Map(&payload), Scope::Map(&builtins)]),
            "from payload/42"
        );
    }

    #[test]
    fn test_sections() {
        let payload = json!({"items": [{"n": 1}, {"n": 2}], "user": {"name": "bob"}, "on": true, "off": false});
        assert_eq!(render("{{#items}}<{{n}}>{{/items}}", payload.clone()), "<1><2>");
        assert_eq!(render("{{#user}}{{name}}{{/user}}", payload.clone()), "bob");
        assert_eq!(render("{{#on}}yes{{/on}}{{#off}}no{{/off}}", payload.clone()), "yes");
        assert_eq!(render("{{^off}}inverted{{/off}}", payload.clone()), "inverted");
        assert_eq!(render("{{^items}}empty{{/items}}", payload), "");
    }

    #[test]
    fn test_implicit_iterator() {
        assert_eq!(render("{{#tags}}{{.}},{{/tags}}", json!({"tags": ["a", "b"]})), "a,b,");
    }

    #[test]
    fn test_section_can_see_outer_scope() {
        let payload = json!({"svc": "api", "calls": [{"code": 200}]});
        assert_eq!(render("{{#calls}}{{svc}}:{{code}}{{/calls}}", payload), "api:200");
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(render("a{{! ignore me }}b", json!({})), "ab");
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(
            Template::compile("{{unclosed"),
            Err(TemplateError::UnclosedTag(0))
        );
        assert_eq!(Template::compile("x {{ }}"), Err(TemplateError::EmptyTag(2)));
        assert_eq!(
            Template::compile("{{#a}}text"),
            Err(TemplateError::UnclosedSection("a".to_string()))
        );
        assert_eq!(
            Template::compile("{{/a}}"),
            Err(TemplateError::UnexpectedClose("a".to_string()))
        );
        assert_eq!(
            Template::compile("{{#a}}{{/b}}"),
            Err(TemplateError::MismatchedClose {
                expected: "a".to_string(),
                found: "b".to_string()
            })
        );
        assert!(matches!(
            Template::compile("{{> partial}}"),
            Err(TemplateError::Unsupported(_))
        ));
        assert!(matches!(
            Template::compile("{{a..b}}"),
            Err(TemplateError::InvalidName(_))
        ));
        assert!(matches!(
            Template::compile("{{{raw}}"),
            Err(TemplateError::UnclosedTag(0))
        ));
    }
}
