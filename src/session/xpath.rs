//! The XPath subset the in-memory session answers: absolute child steps
//! (`/cib/configuration`), descendant steps (`//node_state`), `*` and
//! attribute equality predicates (`[@uname='n1']`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::decode::{Element, Token, XmlStream};
use crate::error::{CibError, CibResult};

static STEP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(//?)([A-Za-z_*][\w.:*-]*)").expect("valid step regex"));
static PREDICATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\[@([\w.:-]+)\s*=\s*(?:'([^']*)'|"([^"]*)")\]"#).expect("valid predicate regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    descendant: bool,
    name: String,
    predicates: Vec<(String, String)>,
}

impl Step {
    fn accepts(&self, element: &Element) -> bool {
        (self.name == "*" || self.name == element.name)
            && self
                .predicates
                .iter()
                .all(|(name, value)| element.attr(name) == Some(value.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XPath {
    steps: Vec<Step>,
}

impl XPath {
    pub fn parse(path: &str) -> CibResult<Self> {
        let invalid = |reason: &str| CibError::Decode(format!("unsupported xpath '{path}': {reason}"));
        let mut rest = path.trim();
        let mut steps = Vec::new();
        while !rest.is_empty() {
            let captures = STEP_RE
                .captures(rest)
                .ok_or_else(|| invalid("expected '/' or '//' followed by a name"))?;
            let mut step = Step {
                descendant: &captures[1] == "//",
                name: captures[2].to_string(),
                predicates: Vec::new(),
            };
            rest = &rest[captures[0].len()..];
            while let Some(predicate) = PREDICATE_RE.captures(rest) {
                let value = predicate.get(2).or_else(|| predicate.get(3)).map_or("", |m| m.as_str());
                step.predicates.push((predicate[1].to_string(), value.to_string()));
                rest = &rest[predicate[0].len()..];
            }
            if rest.starts_with('[') {
                return Err(invalid("only [@name='value'] predicates are supported"));
            }
            steps.push(step);
        }
        if steps.is_empty() {
            return Err(invalid("empty path"));
        }
        Ok(Self { steps })
    }

    /// True if the element at the end of `path` (root first) is selected.
    fn matches(&self, path: &[&Element]) -> bool {
        matches_steps(&self.steps, path)
    }

    /// Every selected subtree in document order. A match is not searched for
    /// further matches inside it.
    pub fn select(&self, source: &str, no_children: bool) -> CibResult<Vec<String>> {
        let mut stream = XmlStream::new(source);
        let mut open: Vec<Element> = Vec::new();
        let mut found = Vec::new();
        loop {
            match stream.next()? {
                Token::Start(element) => {
                    let selected = {
                        let mut path: Vec<&Element> = open.iter().collect();
                        path.push(&element);
                        self.matches(&path)
                    };
                    if selected {
                        if no_children {
                            found.push(stream.self_closed(&element));
                            stream.skip(&element)?;
                        } else {
                            found.push(stream.capture(&element)?.to_string());
                        }
                    } else if !element.empty {
                        open.push(element);
                    }
                }
                Token::End => {
                    open.pop();
                }
                Token::Eof => return Ok(found),
            }
        }
    }
}

fn matches_steps(steps: &[Step], path: &[&Element]) -> bool {
    let (Some((step, earlier_steps)), Some((element, ancestors))) = (steps.split_last(), path.split_last())
    else {
        return false;
    };
    if !step.accepts(element) {
        return false;
    }
    match (earlier_steps.is_empty(), step.descendant) {
        (true, true) => true,
        (true, false) => ancestors.is_empty(),
        (false, false) => matches_steps(earlier_steps, ancestors),
        (false, true) => (1..=ancestors.len()).any(|len| matches_steps(earlier_steps, &ancestors[..len])),
    }
}
