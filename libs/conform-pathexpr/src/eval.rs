//! Tree-walking evaluator.

use regex::Regex;
use serde_json::Value;

use crate::ast::{BinOp, Expr, Literal};
use crate::error::{Error, Result};
use crate::value::{self, Collection};

pub fn eval(expr: &Expr, focus: &Collection) -> Result<Collection> {
    match expr {
        Expr::Literal(lit) => Ok(eval_literal(lit)),
        Expr::This => Ok(focus.clone()),
        Expr::Path(base, name) => {
            let base = eval(base, focus)?;
            Ok(eval_path(&base, name))
        }
        Expr::Index(base, idx) => {
            let base = eval(base, focus)?;
            Ok(eval_index(&base, *idx))
        }
        Expr::Call(base, name, args) => {
            let base = eval(base, focus)?;
            eval_call(&base, name, args, focus)
        }
        Expr::BinOp(lhs, op, rhs) => eval_binop(lhs, *op, rhs, focus),
    }
}

fn eval_literal(lit: &Literal) -> Collection {
    match lit {
        Literal::Bool(b) => value::of(Value::Bool(*b)),
        Literal::Int(n) => value::of(Value::from(*n)),
        Literal::Decimal(d) => value::of(
            serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        ),
        Literal::Str(s) => value::of(Value::String(s.clone())),
        Literal::Empty => value::empty(),
    }
}

fn eval_path(base: &Collection, name: &str) -> Collection {
    let mut out = Vec::new();
    for item in base {
        if let Value::Object(map) = item {
            match map.get(name) {
                Some(Value::Array(items)) => out.extend(items.iter().cloned()),
                Some(other) => out.push(other.clone()),
                None => {}
            }
        }
    }
    out
}

fn eval_index(base: &Collection, idx: i64) -> Collection {
    if idx < 0 {
        return value::empty();
    }
    match base.get(idx as usize) {
        Some(v) => value::of(v.clone()),
        None => value::empty(),
    }
}

fn eval_call(base: &Collection, name: &str, args: &[Expr], outer_focus: &Collection) -> Result<Collection> {
    match name {
        "exists" => {
            if args.is_empty() {
                Ok(value::of(Value::Bool(!base.is_empty())))
            } else {
                check_arity(name, args, 1)?;
                let filtered = filter_where(base, &args[0])?;
                Ok(value::of(Value::Bool(!filtered.is_empty())))
            }
        }
        "empty" => {
            check_arity(name, args, 0)?;
            Ok(value::of(Value::Bool(base.is_empty())))
        }
        "count" => {
            check_arity(name, args, 0)?;
            Ok(value::of(Value::from(base.len() as i64)))
        }
        "where" => {
            check_arity(name, args, 1)?;
            filter_where(base, &args[0])
        }
        "all" => {
            check_arity(name, args, 1)?;
            for item in base {
                let result = eval(&args[0], &value::of(item.clone()))?;
                if !value::truthy(&result) {
                    return Ok(value::of(Value::Bool(false)));
                }
            }
            Ok(value::of(Value::Bool(true)))
        }
        "length" => {
            check_arity(name, args, 0)?;
            match base.as_slice() {
                [Value::String(s)] => Ok(value::of(Value::from(s.chars().count() as i64))),
                _ => Ok(value::empty()),
            }
        }
        "matches" => {
            check_arity(name, args, 1)?;
            let pattern = literal_string_arg(&args[0])?;
            let re = Regex::new(&pattern).map_err(|e| Error::EvalError(e.to_string()))?;
            match base.as_slice() {
                [Value::String(s)] => Ok(value::of(Value::Bool(re.is_match(s)))),
                _ => Ok(value::empty()),
            }
        }
        "startsWith" => {
            check_arity(name, args, 1)?;
            let prefix = literal_string_arg(&args[0])?;
            match base.as_slice() {
                [Value::String(s)] => Ok(value::of(Value::Bool(s.starts_with(&prefix)))),
                _ => Ok(value::empty()),
            }
        }
        "not" => {
            check_arity(name, args, 0)?;
            Ok(value::of(Value::Bool(!value::truthy(base))))
        }
        "ofType" => {
            check_arity(name, args, 1)?;
            let type_name = literal_ident_arg(&args[0])?;
            Ok(base
                .iter()
                .filter(|v| matches_kind(v, &type_name))
                .cloned()
                .collect())
        }
        "extension" => {
            check_arity(name, args, 1)?;
            let url = literal_string_arg(&args[0])?;
            let mut out = Vec::new();
            for item in base {
                if let Value::Object(map) = item {
                    if let Some(Value::Array(exts)) = map.get("extension") {
                        for ext in exts {
                            if ext.get("url").and_then(Value::as_str) == Some(url.as_str()) {
                                out.push(ext.clone());
                            }
                        }
                    }
                }
            }
            Ok(out)
        }
        other => {
            let _ = outer_focus;
            Err(Error::UnknownFunction(other.to_string()))
        }
    }
}

fn filter_where(base: &Collection, criteria: &Expr) -> Result<Collection> {
    let mut out = Vec::new();
    for item in base {
        let result = eval(criteria, &value::of(item.clone()))?;
        if value::truthy(&result) {
            out.push(item.clone());
        }
    }
    Ok(out)
}

fn check_arity(name: &str, args: &[Expr], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::ArityMismatch(name.to_string(), expected, args.len()))
    }
}

fn literal_string_arg(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Literal(Literal::Str(s)) => Ok(s.clone()),
        _ => Err(Error::EvalError(
            "expected a string literal argument".to_string(),
        )),
    }
}

fn literal_ident_arg(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Path(base, name) if matches!(**base, Expr::This) => Ok(name.clone()),
        Expr::Literal(Literal::Str(s)) => Ok(s.clone()),
        _ => Err(Error::EvalError(
            "expected a type name argument".to_string(),
        )),
    }
}

fn matches_kind(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" | "code" | "id" | "uri" | "url" | "canonical" | "oid" | "uuid" | "markdown"
        | "base64Binary" | "dateTime" | "date" | "time" | "instant" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" | "decimal" | "positiveInt" | "unsignedInt" => value.is_number(),
        _ => value.is_object(),
    }
}

fn eval_binop(lhs: &Expr, op: BinOp, rhs: &Expr, focus: &Collection) -> Result<Collection> {
    match op {
        BinOp::And => {
            let l = eval(lhs, focus)?;
            if !value::truthy(&l) {
                return Ok(value::of(Value::Bool(false)));
            }
            let r = eval(rhs, focus)?;
            Ok(value::of(Value::Bool(value::truthy(&r))))
        }
        BinOp::Or => {
            let l = eval(lhs, focus)?;
            if value::truthy(&l) {
                return Ok(value::of(Value::Bool(true)));
            }
            let r = eval(rhs, focus)?;
            Ok(value::of(Value::Bool(value::truthy(&r))))
        }
        BinOp::Implies => {
            let l = eval(lhs, focus)?;
            if !value::truthy(&l) {
                return Ok(value::of(Value::Bool(true)));
            }
            let r = eval(rhs, focus)?;
            Ok(value::of(Value::Bool(value::truthy(&r))))
        }
        BinOp::Union => {
            let mut l = eval(lhs, focus)?;
            let r = eval(rhs, focus)?;
            for item in r {
                if !l.contains(&item) {
                    l.push(item);
                }
            }
            Ok(l)
        }
        BinOp::Eq | BinOp::Neq => {
            let l = eval(lhs, focus)?;
            let r = eval(rhs, focus)?;
            let is_eq = l == r;
            Ok(value::of(Value::Bool(if op == BinOp::Eq {
                is_eq
            } else {
                !is_eq
            })))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let l = eval(lhs, focus)?;
            let r = eval(rhs, focus)?;
            match (l.as_slice(), r.as_slice()) {
                ([a], [b]) => {
                    let ordering = compare_scalars(a, b)
                        .ok_or_else(|| Error::EvalError("incomparable operands".to_string()))?;
                    let result = match op {
                        BinOp::Lt => ordering.is_lt(),
                        BinOp::Le => ordering.is_le(),
                        BinOp::Gt => ordering.is_gt(),
                        BinOp::Ge => ordering.is_ge(),
                        _ => unreachable!(),
                    };
                    Ok(value::of(Value::Bool(result)))
                }
                _ => Ok(value::empty()),
            }
        }
    }
}

fn compare_scalars(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn focus(json: &str) -> Collection {
        value::of(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn exists_on_missing_field_is_false() {
        let expr = parse("telecom.exists()").unwrap();
        let result = eval(&expr, &focus(r#"{"name":"x"}"#)).unwrap();
        assert_eq!(result, value::of(Value::Bool(false)));
    }

    #[test]
    fn where_filters_collection() {
        let expr = parse("contact.where(active = true).exists()").unwrap();
        let result = eval(
            &expr,
            &focus(r#"{"contact":[{"active":true},{"active":false}]}"#),
        )
        .unwrap();
        assert_eq!(result, value::of(Value::Bool(true)));
    }

    #[test]
    fn implies_short_circuits_true_on_false_antecedent() {
        let expr = parse("false implies name.exists()").unwrap();
        let result = eval(&expr, &focus(r#"{}"#)).unwrap();
        assert_eq!(result, value::of(Value::Bool(true)));
    }

    #[test]
    fn matches_applies_regex() {
        let expr = parse("code.matches('^[A-Z]+$')").unwrap();
        let result = eval(&expr, &focus(r#"{"code":"ABC"}"#)).unwrap();
        assert_eq!(result, value::of(Value::Bool(true)));
    }
}
