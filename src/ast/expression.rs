use ahash::AHashMap;
use std::collections::BTreeSet;
use std::fmt;

/// The Abstract Syntax Tree of a parsed arithmetic formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // Arithmetic
    Sum(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Negate(Box<Expression>),

    // Leaf nodes
    Literal(f64),
    Variable(String),
}

impl Expression {
    /// Collects the names of all variables the expression reads.
    pub fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expression::Variable(name) => {
                names.insert(name.as_str());
            }
            Expression::Sum(l, r)
            | Expression::Subtract(l, r)
            | Expression::Multiply(l, r)
            | Expression::Divide(l, r) => {
                l.collect_variables(names);
                r.collect_variables(names);
            }
            Expression::Negate(v) => v.collect_variables(names),
            Expression::Literal(_) => {}
        }
    }

    /// Depth of the tree, counting leaves as 1.
    pub fn depth(&self) -> usize {
        match self {
            Expression::Sum(l, r)
            | Expression::Subtract(l, r)
            | Expression::Multiply(l, r)
            | Expression::Divide(l, r) => 1 + l.depth().max(r.depth()),
            Expression::Negate(v) => 1 + v.depth(),
            Expression::Literal(_) | Expression::Variable(_) => 1,
        }
    }
}

/// A wrapper to display an expression as a tree, with variables replaced by
/// the labels they were generated from (e.g. `[Step1.price]`).
pub struct DisplayExpression<'a> {
    pub expr: &'a Expression,
    pub labels: &'a AHashMap<String, String>,
}

impl<'a> fmt::Display for DisplayExpression<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_as_tree(self.expr, f, "", true)
    }
}

impl<'a> DisplayExpression<'a> {
    fn fmt_as_tree(
        &self,
        expr: &Expression,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        write!(f, "{}{}", prefix, node_marker)?;

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

        match expr {
            Expression::Literal(n) => writeln!(f, "Literal: {}", n)?,
            Expression::Variable(name) => match self.labels.get(name) {
                Some(label) => writeln!(f, "Reference: {}", label)?,
                None => writeln!(f, "Variable: {}", name)?,
            },
            Expression::Negate(v) => {
                writeln!(f, "Negate (-)")?;
                self.fmt_as_tree(v, f, &child_prefix, true)?;
            }
            Expression::Sum(l, r) => self.fmt_binary(f, "Sum (+)", l, r, &child_prefix)?,
            Expression::Subtract(l, r) => {
                self.fmt_binary(f, "Subtract (-)", l, r, &child_prefix)?
            }
            Expression::Multiply(l, r) => {
                self.fmt_binary(f, "Multiply (*)", l, r, &child_prefix)?
            }
            Expression::Divide(l, r) => self.fmt_binary(f, "Divide (/)", l, r, &child_prefix)?,
        }
        Ok(())
    }

    fn fmt_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        name: &str,
        l: &Expression,
        r: &Expression,
        prefix: &str,
    ) -> fmt::Result {
        writeln!(f, "{}", name)?;
        self.fmt_as_tree(l, f, prefix, false)?;
        self.fmt_as_tree(r, f, prefix, true)?;
        Ok(())
    }
}
