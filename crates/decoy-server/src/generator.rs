//! Fake-data expansion for response templates.
//!
//! A template is plain JSON describing the shape of the response. Two
//! constructs make it generative:
//!
//! # Key rules (`"name|rule": value`)
//!
//! - `"age|20-30": 0` - random integer in the range
//! - `"price|10-20.2": 1.0` - random float, two decimals (`.dmin-dmax` picks
//!   a decimal count from a range)
//! - `"id|+1": 100` - arithmetic sequence across the elements of the nearest
//!   repeated array (100, 101, 102, ...)
//! - `"stars|3": "*"` / `"s|2-4": "ab"` - repeat a string
//! - `"list|3": [ {...} ]` / `"list|2-5": [ {...} ]` - repeat array elements
//! - `"color|1": ["red", "green", "blue"]` - pick one element
//! - any rule on a bool - random bool
//!
//! The rule is stripped from the output key. Unrecognized rules leave the
//! value as written.
//!
//! # Placeholders (`@name` inside string values)
//!
//! `@guid`/`@uuid`, `@integer(min,max)`, `@natural(min,max)`,
//! `@float(min,max)`, `@boolean`, `@string(len)`, `@word`, `@title`,
//! `@sentence`, `@paragraph`, `@first`, `@last`, `@name`, `@email`, `@url`,
//! `@domain`, `@ip`, `@city`, `@color`, `@date`, `@time`, `@datetime`,
//! `@now`.
//!
//! A string that is exactly one placeholder expands to a typed JSON value;
//! placeholders embedded in longer strings substitute textually. Unknown
//! placeholders are left verbatim.
//!
//! Expansion is shape-stable: the same template always yields the same key
//! set and value types, only the values change.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use fake::faker::address::en::CityName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, IPv4};
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::Fake;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

static KEY_RULE_REGEX: OnceLock<Regex> = OnceLock::new();
static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

/// Matches `name|+step`, `name|count` and `name|min-max[.dmin[-dmax]]`.
fn key_rule_regex() -> &'static Regex {
    KEY_RULE_REGEX.get_or_init(|| {
        Regex::new(r"^(.+?)\|(?:\+(\d+)|(\d+)(?:-(\d+))?(?:\.(\d+)(?:-(\d+))?)?)$").unwrap()
    })
}

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"@([A-Za-z]+)(?:\(([^)]*)\))?").unwrap())
}

#[derive(Debug, Clone, PartialEq)]
enum KeyRule {
    /// `name|+step`
    Step(i64),
    /// `name|count` or `name|min-max`, optionally with a decimals range.
    Count {
        min: u64,
        max: u64,
        decimals: Option<(u32, u32)>,
    },
}

/// Expand a template into response data.
pub fn expand(template: &Value) -> Value {
    expand_value(template, 0)
}

/// `seq` is the element index within the nearest enclosing repeated array,
/// consumed by `|+step` rules.
fn expand_value(value: &Value, seq: usize) -> Value {
    match value {
        Value::Object(map) => expand_object(map, seq),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| expand_value(item, seq)).collect())
        }
        Value::String(s) => expand_string(s),
        other => other.clone(),
    }
}

fn expand_object(map: &Map<String, Value>, seq: usize) -> Value {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        match parse_key_rule(key) {
            Some((name, rule)) => {
                out.insert(name, apply_rule(&rule, value, seq));
            }
            None => {
                out.insert(key.clone(), expand_value(value, seq));
            }
        }
    }
    Value::Object(out)
}

fn parse_key_rule(key: &str) -> Option<(String, KeyRule)> {
    let caps = key_rule_regex().captures(key)?;
    let name = caps[1].to_string();

    if let Some(step) = caps.get(2) {
        let step = step.as_str().parse().ok()?;
        return Some((name, KeyRule::Step(step)));
    }

    let min: u64 = caps.get(3)?.as_str().parse().ok()?;
    let max: u64 = match caps.get(4) {
        Some(m) => m.as_str().parse().ok()?,
        None => min,
    };
    let decimals = match (caps.get(5), caps.get(6)) {
        (Some(dmin), Some(dmax)) => Some((dmin.as_str().parse().ok()?, dmax.as_str().parse().ok()?)),
        (Some(dmin), None) => {
            let d = dmin.as_str().parse().ok()?;
            Some((d, d))
        }
        _ => None,
    };

    Some((
        name,
        KeyRule::Count {
            min: min.min(max),
            max: min.max(max),
            decimals,
        },
    ))
}

fn apply_rule(rule: &KeyRule, value: &Value, seq: usize) -> Value {
    let mut rng = rand::thread_rng();
    match (rule, value) {
        (KeyRule::Step(step), Value::Number(n)) if n.is_i64() => {
            let start = n.as_i64().unwrap_or(0);
            Value::Number(Number::from(
                start.saturating_add(step.saturating_mul(seq as i64)),
            ))
        }
        (KeyRule::Count { min, max, decimals }, Value::Number(n)) => {
            if decimals.is_some() || !n.is_i64() {
                let (dmin, dmax) = decimals.unwrap_or((2, 2));
                random_float(*min, *max, dmin, dmax)
            } else {
                Value::Number(Number::from(rng.gen_range(*min..=*max)))
            }
        }
        (KeyRule::Count { min, max, .. }, Value::String(s)) => {
            let count = rng.gen_range(*min..=*max) as usize;
            Value::String(s.repeat(count))
        }
        (KeyRule::Count { min: 1, max: 1, .. }, Value::Array(items)) if items.len() > 1 => {
            let pick = rng.gen_range(0..items.len());
            expand_value(&items[pick], seq)
        }
        (KeyRule::Count { min, max, .. }, Value::Array(items)) if !items.is_empty() => {
            let count = rng.gen_range(*min..=*max) as usize;
            let out = (0..count)
                .map(|i| expand_value(&items[i % items.len()], i))
                .collect();
            Value::Array(out)
        }
        (_, Value::Bool(_)) => Value::Bool(rng.gen_bool(0.5)),
        _ => expand_value(value, seq),
    }
}

fn random_float(min: u64, max: u64, dmin: u32, dmax: u32) -> Value {
    let mut rng = rand::thread_rng();
    let digits = rng.gen_range(dmin.min(dmax)..=dmin.max(dmax)).min(9);
    let scale = 10f64.powi(digits as i32);
    let raw = rng.gen_range(min..=max) as f64 + rng.gen_range(0.0..1.0);
    let rounded = (raw * scale).round() / scale;
    Number::from_f64(rounded)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn expand_string(s: &str) -> Value {
    // A lone placeholder yields a typed value, not a string.
    if let Some(caps) = placeholder_regex().captures(s) {
        if caps.get(0).map(|m| m.as_str()) == Some(s) {
            if let Some(value) = placeholder_value(&caps[1], caps.get(2).map(|m| m.as_str())) {
                return value;
            }
        }
    }

    let replaced = placeholder_regex().replace_all(s, |caps: &regex::Captures| {
        match placeholder_value(&caps[1], caps.get(2).map(|m| m.as_str())) {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        }
    });
    Value::String(replaced.into_owned())
}

fn placeholder_value(name: &str, args: Option<&str>) -> Option<Value> {
    let mut rng = rand::thread_rng();
    let value = match name.to_ascii_lowercase().as_str() {
        "guid" | "uuid" => Value::String(Uuid::new_v4().to_string()),
        "integer" => {
            let (min, max) = parse_range(args, 0, 10_000);
            Value::Number(Number::from(rng.gen_range(min..=max)))
        }
        "natural" => {
            let (min, max) = parse_range(args, 0, 10_000);
            Value::Number(Number::from(rng.gen_range(min.max(0)..=max.max(0))))
        }
        "float" => {
            let (min, max) = parse_range(args, 0, 100);
            random_float(min.max(0) as u64, max.max(0) as u64, 2, 2)
        }
        "boolean" => Value::Bool(rng.gen_bool(0.5)),
        "string" => {
            let (min, max) = parse_range(args, 5, 10);
            let len = rng.gen_range(min.max(1)..=max.max(1)) as usize;
            let text: String = rng
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            Value::String(text)
        }
        "word" => Value::String(Word().fake()),
        "title" => {
            let words: Vec<String> = Words(2..4).fake();
            let title: Vec<String> = words.iter().map(|w| capitalize(w)).collect();
            Value::String(title.join(" "))
        }
        "sentence" => Value::String(Sentence(4..10).fake()),
        "paragraph" => Value::String(Paragraph(2..4).fake()),
        "first" => Value::String(FirstName().fake()),
        "last" => Value::String(LastName().fake()),
        "name" => Value::String(Name().fake()),
        "email" => Value::String(SafeEmail().fake()),
        "domain" => {
            let word: String = Word().fake();
            let suffix: String = DomainSuffix().fake();
            Value::String(format!("{word}.{suffix}"))
        }
        "url" => {
            let word: String = Word().fake();
            let suffix: String = DomainSuffix().fake();
            let path: String = Word().fake();
            Value::String(format!("https://www.{word}.{suffix}/{path}"))
        }
        "ip" => Value::String(IPv4().fake()),
        "city" => Value::String(CityName().fake()),
        "color" => Value::String(format!("#{:06x}", rng.gen_range(0..0x100_0000))),
        "date" => Value::String(random_past_datetime().format("%Y-%m-%d").to_string()),
        "time" => Value::String(random_past_datetime().format("%H:%M:%S").to_string()),
        "datetime" => {
            Value::String(random_past_datetime().format("%Y-%m-%d %H:%M:%S").to_string())
        }
        "now" => Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        _ => return None,
    };
    Some(value)
}

/// Up to ten years back from now.
fn random_past_datetime() -> chrono::DateTime<Utc> {
    let offset = rand::thread_rng().gen_range(0..=315_360_000i64);
    Utc::now() - Duration::seconds(offset)
}

fn parse_range(args: Option<&str>, default_min: i64, default_max: i64) -> (i64, i64) {
    let parsed: Vec<i64> = args
        .unwrap_or("")
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    let (min, max) = match parsed.as_slice() {
        [] => (default_min, default_max),
        [len] => (*len, *len),
        [min, max, ..] => (*min, *max),
    };
    (min.min(max), min.max(max))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
