//! Flowchart model shared by the parser, layout and SVG renderer.

use std::fmt;

use serde::Serialize;

/// The symbol categories understood by the flowchart DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Start,
    End,
    Operation,
    #[serde(rename = "inputoutput")]
    InputOutput,
    Subroutine,
    Condition,
    Parallel,
}

impl SymbolKind {
    pub const ALL: [Self; 7] = [
        Self::Start,
        Self::End,
        Self::Operation,
        Self::InputOutput,
        Self::Subroutine,
        Self::Condition,
        Self::Parallel,
    ];

    /// Parse the keyword used after `=>` in a symbol definition.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == keyword)
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Operation => "operation",
            Self::InputOutput => "inputoutput",
            Self::Subroutine => "subroutine",
            Self::Condition => "condition",
            Self::Parallel => "parallel",
        }
    }

    /// Whether this symbol is drawn in the accent color (terminals of the flow).
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Start | Self::End)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Branch annotation on a connection leaving a condition or parallel symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Yes,
    No,
    Path1,
    Path2,
    Path3,
}

impl Branch {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "path1" => Some(Self::Path1),
            "path2" => Some(Self::Path2),
            "path3" => Some(Self::Path3),
            _ => None,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Path1 => "path1",
            Self::Path2 => "path2",
            Self::Path3 => "path3",
        }
    }

    /// The symbol kind this branch is valid on.
    pub const fn owner(self) -> SymbolKind {
        match self {
            Self::Yes | Self::No => SymbolKind::Condition,
            Self::Path1 | Self::Path2 | Self::Path3 => SymbolKind::Parallel,
        }
    }

    /// Side a branch leaves its symbol from when no direction is given.
    pub const fn default_direction(self) -> Direction {
        match self {
            Self::Yes | Self::Path1 => Direction::Bottom,
            Self::No | Self::Path2 => Direction::Right,
            Self::Path3 => Direction::Top,
        }
    }
}

/// Side of a symbol a connection leaves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Top,
    Bottom,
    Left,
    Right,
}

impl Direction {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Grid offset `(columns, rows)` of the neighbouring cell on this side.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Top => (0, -1),
            Self::Bottom => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// Hyperlink attached to a symbol with the `:>url[target]` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub id: String,
    pub kind: SymbolKind,
    pub label: String,
    /// Name of a flowstate style (`|past`, `|current`, ...).
    pub flowstate: Option<String>,
    pub link: Option<Link>,
    /// One-based source line of the definition.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: String,
    pub to: String,
    pub branch: Option<Branch>,
    pub direction: Option<Direction>,
    /// One-based source line of the connection statement.
    pub line: usize,
}

impl Connection {
    /// Side of the source symbol this connection leaves from.
    pub fn exit_direction(&self) -> Direction {
        self.direction
            .or_else(|| self.branch.map(Branch::default_direction))
            .unwrap_or(Direction::Bottom)
    }
}

/// A parsed flowchart: symbols in definition order plus their connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagram {
    symbols: Vec<Symbol>,
    connections: Vec<Connection>,
}

impl Diagram {
    pub(crate) const fn new(symbols: Vec<Symbol>, connections: Vec<Connection>) -> Self {
        Self {
            symbols,
            connections,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.id == id)
    }

    pub fn symbol_index(&self, id: &str) -> Option<usize> {
        self.symbols.iter().position(|symbol| symbol.id == id)
    }

    /// The symbol the flow begins at: the first `start`, else the first symbol.
    pub fn root(&self) -> Option<usize> {
        self.symbols
            .iter()
            .position(|symbol| symbol.kind == SymbolKind::Start)
            .or_else(|| (!self.symbols.is_empty()).then_some(0))
    }

    /// Indices of connections leaving `id`, in declaration order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = (usize, &'a Connection)> {
        self.connections
            .iter()
            .enumerate()
            .filter(move |(_, connection)| connection.from == id)
    }
}
