//! Boolean expression tree rendered into a SQL `WHERE` clause.

/// A boolean SQL expression.
///
/// Rendering is fully parenthesised: a leaf renders as `(text)`, a binary
/// node as `(left OP right)` and a negation as `NOT ` followed by its operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Leaf(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn leaf(text: impl Into<String>) -> Self {
        Expr::Leaf(text.into())
    }

    /// `column op literal`.
    pub fn compare(column: &str, op: &str, literal: &str) -> Self {
        Expr::Leaf(format!("{} {} {}", column, op, literal))
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Left-nested conjunction; `None` for an empty input.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Left-nested disjunction; `None` for an empty input.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::or)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Expr::Leaf(text) => {
                out.push('(');
                out.push_str(text);
                out.push(')');
            }
            Expr::Not(inner) => {
                out.push_str("NOT ");
                inner.render_into(out);
            }
            Expr::And(left, right) => binary(out, left, "AND", right),
            Expr::Or(left, right) => binary(out, left, "OR", right),
        }
    }
}

fn binary(out: &mut String, left: &Expr, op: &str, right: &Expr) {
    out.push('(');
    left.render_into(out);
    out.push(' ');
    out.push_str(op);
    out.push(' ');
    right.render_into(out);
    out.push(')');
}
