use super::{Combinator, Criteria, Operator};
use crate::error::MShopError;
use serde_json::{Map, Value};

pub(super) fn parse(value: &Value) -> Result<Criteria, MShopError> {
    let obj = single_key_object(value)?;
    let (key, inner) = obj.iter().next().ok_or_else(|| malformed("empty condition object"))?;

    if let Ok(op) = key.parse::<Combinator>() {
        let children = match (op, inner) {
            (_, Value::Array(items)) => items.iter().map(parse).collect::<Result<Vec<_>, _>>()?,
            (Combinator::Not, Value::Object(_)) => vec![parse(inner)?],
            _ => return Err(malformed(&format!("'{}' expects a list of conditions", key))),
        };
        return Criteria::combine(op, children);
    }

    let op: Operator = key.parse()?;
    let fields = inner
        .as_object()
        .ok_or_else(|| malformed(&format!("'{}' expects an object of code/value pairs", key)))?;
    let mut compares: Vec<Criteria> = fields
        .iter()
        .map(|(code, v)| Criteria::compare(op, code.clone(), v.clone()))
        .collect();
    if compares.len() == 1 {
        return Ok(compares.remove(0));
    }
    Criteria::and(compares)
}

fn single_key_object(value: &Value) -> Result<&Map<String, Value>, MShopError> {
    match value {
        Value::Object(obj) if obj.len() == 1 => Ok(obj),
        _ => Err(malformed("condition must be an object with exactly one operator key")),
    }
}

fn malformed(msg: &str) -> MShopError {
    MShopError::MalformedCriteria(msg.to_string())
}
