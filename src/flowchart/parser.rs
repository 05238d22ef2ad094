//! Parser for the flowchart.js description language.
//!
//! Two statement forms are recognised, one per line:
//!
//! ```text
//! id=>type: label|flowstate:>url[target]
//! a->b(right)->c
//! cond(yes)->a
//! ```
//!
//! Blank lines and lines starting with `'` are ignored.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::DiagramError;
use super::types::{Branch, Connection, Diagram, Direction, Link, Symbol, SymbolKind};

static RE_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\s=()>-][^\s=()>]*)\s*=>\s*([A-Za-z]+)\s*(?::\s?(.*))?$")
        .expect("symbol regex is valid")
});
static RE_ENDPOINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\s()]+)\s*(?:\(([^)]*)\))?$")
        .expect("endpoint regex is valid")
});
static RE_LINK_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)\[([^\]]*)\]$").expect("link regex is valid")
});
static RE_FLOWSTATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][\w-]*$").expect("flowstate regex is valid")
});

/// Parse flowchart source text into a [`Diagram`].
///
/// # Errors
///
/// Returns the first [`DiagramError`] found, with its one-based line number.
pub fn parse_flowchart(source: &str) -> Result<Diagram, DiagramError> {
    let mut symbols: Vec<Symbol> = Vec::new();
    let mut defined: HashMap<String, usize> = HashMap::new();
    let mut connections: Vec<Connection> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('\'') {
            continue;
        }

        if line.contains("=>") {
            let symbol = parse_symbol(line, line_no)?;
            if let Some(first) = defined.get(&symbol.id) {
                return Err(DiagramError::DuplicateSymbol {
                    line: line_no,
                    id: symbol.id,
                    first: *first,
                });
            }
            defined.insert(symbol.id.clone(), line_no);
            symbols.push(symbol);
        } else if line.contains("->") {
            connections.extend(parse_connection_chain(line, line_no)?);
        } else {
            return Err(DiagramError::UnrecognizedLine {
                line: line_no,
                text: line.to_string(),
            });
        }
    }

    if symbols.is_empty() {
        return Err(DiagramError::NoSymbols);
    }

    let diagram = Diagram::new(symbols, connections);
    validate_connections(&diagram)?;
    Ok(diagram)
}

fn parse_symbol(line: &str, line_no: usize) -> Result<Symbol, DiagramError> {
    if line.starts_with("=>") {
        return Err(DiagramError::EmptyId { line: line_no });
    }
    let Some(caps) = RE_SYMBOL.captures(line) else {
        return Err(DiagramError::UnrecognizedLine {
            line: line_no,
            text: line.to_string(),
        });
    };
    let id = caps[1].to_string();
    let keyword = &caps[2];
    let kind = SymbolKind::from_keyword(keyword).ok_or_else(|| DiagramError::UnknownSymbolType {
        line: line_no,
        kind: keyword.to_string(),
    })?;

    let rest = caps.get(3).map_or("", |m| m.as_str()).trim();
    let (text, link) = match rest.split_once(":>") {
        Some((text, link)) => (text, Some(parse_link(link.trim()))),
        None => (rest, None),
    };
    let (label, flowstate) = match text.rsplit_once('|') {
        Some((label, state)) if RE_FLOWSTATE.is_match(state.trim()) => {
            (label.trim(), Some(state.trim().to_string()))
        }
        _ => (text.trim(), None),
    };
    let label = if label.is_empty() { id.clone() } else { label.to_string() };

    Ok(Symbol {
        id,
        kind,
        label,
        flowstate,
        link,
        line: line_no,
    })
}

fn parse_link(raw: &str) -> Link {
    RE_LINK_TARGET.captures(raw).map_or_else(
        || Link {
            url: raw.to_string(),
            target: None,
        },
        |caps| Link {
            url: caps[1].trim().to_string(),
            target: Some(caps[2].trim().to_string()).filter(|t| !t.is_empty()),
        },
    )
}

struct Endpoint {
    id: String,
    branch: Option<Branch>,
    direction: Option<Direction>,
}

fn parse_connection_chain(line: &str, line_no: usize) -> Result<Vec<Connection>, DiagramError> {
    let endpoints = line
        .split("->")
        .map(|segment| parse_endpoint(segment.trim(), line_no))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(endpoints
        .windows(2)
        .map(|pair| Connection {
            from: pair[0].id.clone(),
            to: pair[1].id.clone(),
            branch: pair[0].branch,
            direction: pair[0].direction,
            line: line_no,
        })
        .collect())
}

fn parse_endpoint(segment: &str, line_no: usize) -> Result<Endpoint, DiagramError> {
    if segment.is_empty() {
        return Err(DiagramError::DanglingConnection { line: line_no });
    }
    let Some(caps) = RE_ENDPOINT.captures(segment) else {
        return Err(DiagramError::UnrecognizedLine {
            line: line_no,
            text: segment.to_string(),
        });
    };

    let mut endpoint = Endpoint {
        id: caps[1].to_string(),
        branch: None,
        direction: None,
    };
    let annotations = caps.get(2).map_or("", |m| m.as_str());
    for token in annotations
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        if let Some(branch) = Branch::from_keyword(token) {
            endpoint.branch = Some(branch);
        } else if let Some(direction) = Direction::from_keyword(token) {
            endpoint.direction = Some(direction);
        } else {
            return Err(DiagramError::InvalidAnnotation {
                line: line_no,
                annotation: token.to_string(),
            });
        }
    }
    Ok(endpoint)
}

fn validate_connections(diagram: &Diagram) -> Result<(), DiagramError> {
    for connection in diagram.connections() {
        let Some(source) = diagram.symbol(&connection.from) else {
            return Err(DiagramError::UndefinedSymbol {
                line: connection.line,
                id: connection.from.clone(),
            });
        };
        if diagram.symbol(&connection.to).is_none() {
            return Err(DiagramError::UndefinedSymbol {
                line: connection.line,
                id: connection.to.clone(),
            });
        }
        match connection.branch {
            Some(branch) if branch.owner() != source.kind => {
                return Err(DiagramError::InvalidAnnotation {
                    line: connection.line,
                    annotation: branch.keyword().to_string(),
                });
            }
            None if source.kind == SymbolKind::Condition => {
                return Err(DiagramError::MissingBranch {
                    line: connection.line,
                    id: source.id.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_start_end() {
        let diagram = parse_flowchart("st=>start: Start\ne=>end: End\nst->e").unwrap();
        assert_eq!(diagram.symbols().len(), 2);
        assert_eq!(diagram.symbols()[0].kind, SymbolKind::Start);
        assert_eq!(diagram.symbols()[0].label, "Start");
        assert_eq!(diagram.symbols()[1].kind, SymbolKind::End);
        assert_eq!(diagram.connections().len(), 1);
        assert_eq!(diagram.connections()[0].from, "st");
        assert_eq!(diagram.connections()[0].to, "e");
    }

    #[test]
    fn test_parse_condition_branches_and_chain() {
        let src = "\
st=>start: Start
op=>operation: Work
cond=>condition: Done?
e=>end: End
st->op->cond
cond(yes)->e
cond(no, right)->op";
        let diagram = parse_flowchart(src).unwrap();
        let conns = diagram.connections();
        assert_eq!(conns.len(), 4);
        assert_eq!((conns[0].from.as_str(), conns[0].to.as_str()), ("st", "op"));
        assert_eq!((conns[1].from.as_str(), conns[1].to.as_str()), ("op", "cond"));
        assert_eq!(conns[2].branch, Some(Branch::Yes));
        assert_eq!(conns[3].branch, Some(Branch::No));
        assert_eq!(conns[3].direction, Some(Direction::Right));
    }

    #[test]
    fn test_parse_flowstate_and_link() {
        let src = "st=>start: Start|past:>http://www.google.com[blank]\ne=>end: End|current\nst->e";
        let diagram = parse_flowchart(src).unwrap();
        let start = &diagram.symbols()[0];
        assert_eq!(start.label, "Start");
        assert_eq!(start.flowstate.as_deref(), Some("past"));
        let link = start.link.as_ref().unwrap();
        assert_eq!(link.url, "http://www.google.com");
        assert_eq!(link.target.as_deref(), Some("blank"));
        assert_eq!(diagram.symbols()[1].flowstate.as_deref(), Some("current"));
    }

    #[test]
    fn test_label_with_arrow_text_is_a_symbol() {
        let diagram = parse_flowchart("op=>operation: a->b").unwrap();
        assert_eq!(diagram.symbols()[0].label, "a->b");
        assert!(diagram.connections().is_empty());
    }

    #[test]
    fn test_missing_label_defaults_to_id() {
        let diagram = parse_flowchart("e=>end").unwrap();
        assert_eq!(diagram.symbols()[0].label, "e");
    }

    #[test]
    fn test_comments_and_blank_lines_are_ignored() {
        let src = "' a comment\n\nst=>start: Start\n   \ne=>end: End\nst->e\n";
        let diagram = parse_flowchart(src).unwrap();
        assert_eq!(diagram.symbols().len(), 2);
    }

    #[test]
    fn test_dangling_connection_is_an_error() {
        let err = parse_flowchart("st=>start: Start\nst->").unwrap_err();
        assert_eq!(err, DiagramError::DanglingConnection { line: 2 });
    }

    #[test]
    fn test_undefined_symbol_is_an_error() {
        let err = parse_flowchart("st=>start: Start\nst->nowhere").unwrap_err();
        assert_eq!(
            err,
            DiagramError::UndefinedSymbol {
                line: 2,
                id: "nowhere".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_symbol_type_is_an_error() {
        let err = parse_flowchart("x=>decision: Maybe").unwrap_err();
        assert_eq!(
            err,
            DiagramError::UnknownSymbolType {
                line: 1,
                kind: "decision".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_symbol_is_an_error() {
        let err = parse_flowchart("a=>start: A\na=>end: B").unwrap_err();
        assert_eq!(
            err,
            DiagramError::DuplicateSymbol {
                line: 2,
                id: "a".to_string(),
                first: 1
            }
        );
    }

    #[test]
    fn test_condition_without_branch_is_an_error() {
        let err = parse_flowchart("c=>condition: Ok?\ne=>end: End\nc->e").unwrap_err();
        assert_eq!(
            err,
            DiagramError::MissingBranch {
                line: 3,
                id: "c".to_string()
            }
        );
    }

    #[test]
    fn test_branch_on_wrong_symbol_is_an_error() {
        let err = parse_flowchart("o=>operation: Go\ne=>end: End\no(yes)->e").unwrap_err();
        assert!(matches!(err, DiagramError::InvalidAnnotation { line: 3, .. }));
    }

    #[test]
    fn test_unknown_annotation_is_an_error() {
        let err = parse_flowchart("o=>operation: Go\ne=>end: End\no(sideways)->e").unwrap_err();
        assert_eq!(
            err,
            DiagramError::InvalidAnnotation {
                line: 3,
                annotation: "sideways".to_string()
            }
        );
    }

    #[test]
    fn test_symbol_without_id_is_an_error() {
        let err = parse_flowchart("st=>start: Start\n=>end: End").unwrap_err();
        assert_eq!(err, DiagramError::EmptyId { line: 2 });
    }

    #[test]
    fn test_free_text_is_unrecognized() {
        let err = parse_flowchart("hello world").unwrap_err();
        assert!(matches!(err, DiagramError::UnrecognizedLine { line: 1, .. }));
    }

    #[test]
    fn test_only_comments_has_no_symbols() {
        assert_eq!(parse_flowchart("' nothing here").unwrap_err(), DiagramError::NoSymbols);
    }

    #[test]
    fn test_parallel_paths() {
        let src = "\
p=>parallel: Split
a=>operation: A
b=>operation: B
p(path1, bottom)->a
p(path2, right)->b";
        let diagram = parse_flowchart(src).unwrap();
        assert_eq!(diagram.connections()[0].branch, Some(Branch::Path1));
        assert_eq!(diagram.connections()[1].direction, Some(Direction::Right));
    }
}
