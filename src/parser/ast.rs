/// Identifies an expression node within a single parse. The scope analyzer
/// keys its scope records by node id, so ids must be unique per tree.
pub type NodeId = usize;

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Symbol(String),
    List(Vec<Expr>),
}

impl Expr {
    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::List(children) => Some(children),
            _ => None,
        }
    }

    /// A tagged list is a list whose head is the given symbol, e.g.
    /// `(var x 1)` is tagged `var`.
    pub fn is_tagged(&self, tag: &str) -> bool {
        match self.as_list() {
            Some([head, ..]) => head.as_symbol() == Some(tag),
            _ => false,
        }
    }
}
