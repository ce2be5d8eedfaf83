//! Compiler for the legacy filter syntax of vector-tile styles.
//!
//! ```text
//! ["==", key, value]   ["!=", key, value]   ["<" | "<=" | ">" | ">=", key, value]
//! ["in", key, v...]    ["!in", key, v...]   ["has", key]   ["!has", key]
//! ["all", f...]        ["any", f...]        ["none", f...]
//! ```
//!
//! `$type`, `$id` and `$layer` address the feature itself instead of a property.

use formats::feature::TileFeature;
use foundation::ids::FeatureId;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKey {
    Type,
    Id,
    Layer,
    Property(String),
}

impl FilterKey {
    fn parse(value: &Value) -> Result<Self, String> {
        let key = value
            .as_str()
            .ok_or_else(|| format!("filter key must be a string, got {value}"))?;
        Ok(match key {
            "$type" => FilterKey::Type,
            "$id" => FilterKey::Id,
            "$layer" => FilterKey::Layer,
            other => FilterKey::Property(other.to_string()),
        })
    }

    fn lookup(&self, feature: &TileFeature) -> Option<Value> {
        match self {
            FilterKey::Type => Some(Value::from(feature.kind.name())),
            FilterKey::Id => Some(match &feature.id {
                FeatureId::Int(n) => Value::from(*n),
                FeatureId::Str(s) => Value::from(s.as_str()),
            }),
            FilterKey::Layer => Some(Value::from(feature.layer.as_str())),
            FilterKey::Property(name) => feature.properties.get(name).cloned(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Compiled per-feature predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Always(bool),
    Compare {
        key: FilterKey,
        op: CompareOp,
        value: Value,
    },
    In {
        key: FilterKey,
        values: Vec<Value>,
        negate: bool,
    },
    Has {
        key: FilterKey,
        negate: bool,
    },
    All(Vec<Filter>),
    Any(Vec<Filter>),
    None(Vec<Filter>),
}

impl Filter {
    /// Compiles a filter definition. `null` and `true` match everything.
    pub fn compile(def: &Value) -> Result<Filter, String> {
        let arr = match def {
            Value::Null => return Ok(Filter::Always(true)),
            Value::Bool(b) => return Ok(Filter::Always(*b)),
            Value::Array(arr) => arr,
            other => return Err(format!("filter must be an array, got {other}")),
        };
        let op = arr
            .first()
            .and_then(|v| v.as_str())
            .ok_or("filter must start with an operator".to_string())?;
        let args = &arr[1..];

        let compare = |op: CompareOp| -> Result<Filter, String> {
            let [key, value] = args else {
                return Err(format!("comparison expects [op, key, value], got {} args", args.len()));
            };
            Ok(Filter::Compare {
                key: FilterKey::parse(key)?,
                op,
                value: value.clone(),
            })
        };
        let set = |negate: bool| -> Result<Filter, String> {
            let (key, values) = args
                .split_first()
                .ok_or("membership filter expects a key".to_string())?;
            Ok(Filter::In {
                key: FilterKey::parse(key)?,
                values: values.to_vec(),
                negate,
            })
        };
        let has = |negate: bool| -> Result<Filter, String> {
            let [key] = args else {
                return Err("has expects exactly one key".to_string());
            };
            Ok(Filter::Has {
                key: FilterKey::parse(key)?,
                negate,
            })
        };
        let children = || args.iter().map(Filter::compile).collect::<Result<Vec<_>, _>>();

        match op {
            "==" => compare(CompareOp::Eq),
            "!=" => compare(CompareOp::Ne),
            "<" => compare(CompareOp::Lt),
            "<=" => compare(CompareOp::Le),
            ">" => compare(CompareOp::Gt),
            ">=" => compare(CompareOp::Ge),
            "in" => set(false),
            "!in" => set(true),
            "has" => has(false),
            "!has" => has(true),
            "all" => Ok(Filter::All(children()?)),
            "any" => Ok(Filter::Any(children()?)),
            "none" => Ok(Filter::None(children()?)),
            other => Err(format!("unknown filter operator: {other}")),
        }
    }

    pub fn matches(&self, feature: &TileFeature) -> bool {
        match self {
            Filter::Always(b) => *b,
            Filter::Compare { key, op, value } => {
                let actual = key.lookup(feature);
                match op {
                    CompareOp::Eq => actual.is_some_and(|a| values_equal(&a, value)),
                    CompareOp::Ne => !actual.is_some_and(|a| values_equal(&a, value)),
                    _ => actual.is_some_and(|a| ordered(&a, value, *op)),
                }
            }
            Filter::In {
                key,
                values,
                negate,
            } => {
                let found = key
                    .lookup(feature)
                    .is_some_and(|a| values.iter().any(|v| values_equal(&a, v)));
                found != *negate
            }
            Filter::Has { key, negate } => key.lookup(feature).is_some() != *negate,
            Filter::All(fs) => fs.iter().all(|f| f.matches(feature)),
            Filter::Any(fs) => fs.iter().any(|f| f.matches(feature)),
            Filter::None(fs) => !fs.iter().any(|f| f.matches(feature)),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

// Ordering only applies between two numbers or two strings.
fn ordered(a: &Value, b: &Value, op: CompareOp) -> bool {
    let ord = match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    };
    let Some(ord) = ord else {
        return false;
    };
    match op {
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Le => ord.is_le(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::Ge => ord.is_ge(),
        CompareOp::Eq | CompareOp::Ne => unreachable!("equality handled by caller"),
    }
}
