//! Canonical JSON serialization.
//!
//! Keys are sorted by code point, separators are `", "` and `": "`, and
//! everything outside ASCII is written as `\uXXXX`. Integers keep every
//! source digit; floats use the shortest round-trip digits in `repr` layout
//! (`1e-05`, `1e+16`, `100000.0`). This is the byte layout of
//! `json.dumps(value, sort_keys=True)`, so snapshots written by older ingest
//! jobs keep the same fingerprint.

use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt::Write;

use crate::error::{MirrorError, Result};
use crate::sync::fingerprint::FingerprintAlgorithm;

/// Serialize a JSON value canonically.
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(&mut out, value);
    out.into_bytes()
}

/// Serialize any serde value canonically.
pub fn canonical_json_of<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)
        .map_err(|e| MirrorError::ContentReadFailure(format!("failed to serialize: {}", e)))?;
    Ok(canonical_json(&value))
}

/// Parse JSON bytes and re-serialize them canonically.
pub fn canonicalize(bytes: &[u8]) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| MirrorError::ContentReadFailure(format!("invalid JSON: {}", e)))?;
    Ok(canonical_json(&value))
}

/// Fingerprint a JSON payload after canonicalization.
pub fn fingerprint_json(bytes: &[u8], algorithm: FingerprintAlgorithm) -> Result<String> {
    Ok(algorithm.fingerprint(&canonicalize(bytes)?))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort explicitly: serde_json may be built with preserve_order.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &Number) {
    let text = n.to_string();
    if !text.contains(['.', 'e', 'E']) {
        // `-0` reads back as the integer zero
        out.push_str(if text == "-0" { "0" } else { text.as_str() });
        return;
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => write_float(out, f),
        _ if text.starts_with('-') => out.push_str("-Infinity"),
        _ => out.push_str("Infinity"),
    }
}

/// Positional notation while the decimal point falls in `-4 < decpt <= 16`,
/// otherwise `d.ddde+XX` with at least two exponent digits.
fn write_float(out: &mut String, f: f64) {
    let sci = format!("{:e}", f);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let decpt = exp + 1;

    out.push_str(sign);
    if -4 < decpt && decpt <= 16 {
        if decpt <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-decpt) as usize));
            out.push_str(&digits);
        } else if decpt as usize >= digits.len() {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take(decpt as usize - digits.len()));
            out.push_str(".0");
        } else {
            let (int, frac) = digits.split_at(decpt as usize);
            out.push_str(int);
            out.push('.');
            out.push_str(frac);
        }
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let _ = write!(out, "e{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs());
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
