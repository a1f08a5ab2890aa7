//! Storage-independent expression trees for filtering items.

mod json;
mod search;

pub use search::{Direction, Search, Sort, DEFAULT_SLICE, UNBOUNDED};

use crate::error::MShopError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Comparison operators. `==`/`!=` against a value set act as one-of / none-of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    OneOf,
    /// Substring match (`~=`).
    Contains,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::OneOf => "in",
            Operator::Contains => "~=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = MShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "<" => Operator::Less,
            "<=" => Operator::LessEqual,
            ">" => Operator::Greater,
            ">=" => Operator::GreaterEqual,
            "in" => Operator::OneOf,
            "~=" => Operator::Contains,
            _ => return Err(MShopError::MalformedCriteria(format!("unknown operator: {}", s))),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
    Not,
}

impl FromStr for Combinator {
    type Err = MShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "&&" => Ok(Combinator::And),
            "||" => Ok(Combinator::Or),
            "!" => Ok(Combinator::Not),
            _ => Err(MShopError::MalformedCriteria(format!("unknown combinator: {}", s))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub op: Operator,
    pub code: String,
    pub value: Value,
}

/// A validated boolean node; only constructible through [`Criteria::combine`].
#[derive(Clone, Debug, PartialEq)]
pub struct Combination {
    op: Combinator,
    children: Vec<Criteria>,
}

impl Combination {
    pub fn op(&self) -> Combinator {
        self.op
    }

    pub fn children(&self) -> &[Criteria] {
        &self.children
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Criteria {
    Compare(Comparison),
    Combine(Combination),
}

impl Criteria {
    pub fn compare(op: Operator, code: impl Into<String>, value: impl Into<Value>) -> Criteria {
        Criteria::Compare(Comparison {
            op,
            code: code.into(),
            value: value.into(),
        })
    }

    /// NOT takes exactly one child, AND/OR at least one.
    pub fn combine(op: Combinator, children: Vec<Criteria>) -> Result<Criteria, MShopError> {
        match op {
            Combinator::Not if children.len() != 1 => Err(MShopError::MalformedCriteria(format!(
                "NOT takes exactly one child, got {}",
                children.len()
            ))),
            Combinator::And | Combinator::Or if children.is_empty() => Err(
                MShopError::MalformedCriteria("AND/OR need at least one child".into()),
            ),
            _ => Ok(Criteria::Combine(Combination { op, children })),
        }
    }

    pub fn and(children: Vec<Criteria>) -> Result<Criteria, MShopError> {
        Criteria::combine(Combinator::And, children)
    }

    pub fn or(children: Vec<Criteria>) -> Result<Criteria, MShopError> {
        Criteria::combine(Combinator::Or, children)
    }

    pub fn not(child: Criteria) -> Criteria {
        Criteria::Combine(Combination {
            op: Combinator::Not,
            children: vec![child],
        })
    }

    /// Parses the admin grid condition format, e.g.
    /// `{"&&": [{"==": {"product.code": "abc"}}, {"!": {">": {"product.status": 0}}}]}`.
    pub fn from_json(value: &Value) -> Result<Criteria, MShopError> {
        json::parse(value)
    }

    /// Attribute codes referenced by the tree, first-seen order, duplicates kept out.
    pub fn codes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.visit(&mut |cmp| {
            if !out.contains(&cmp.code.as_str()) {
                out.push(cmp.code.as_str());
            }
        });
        out
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Comparison)) {
        match self {
            Criteria::Compare(cmp) => f(cmp),
            Criteria::Combine(comb) => {
                for child in &comb.children {
                    child.visit(&mut *f);
                }
            }
        }
    }
}
