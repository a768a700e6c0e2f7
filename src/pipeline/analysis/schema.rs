//! Canonical report schema.
//!
//! One definition serves both sides of the contract: it is sent to the
//! reasoning service as the declared response schema, and the validator walks
//! raw responses against it. Fields listed in `required` must be present;
//! other fields are fillable and default to an empty value when absent.

use std::sync::LazyLock;

use serde_json::{json, Map, Value};

/// Top-level sections every report carries.
pub const TOP_LEVEL_SECTIONS: [&str; 8] = [
    "task",
    "signals",
    "risk_assessment",
    "scenario",
    "mgtc_analysis",
    "international_coordination",
    "recommended_actions",
    "briefings",
];

pub const SIGNAL_TYPES: &[&str] = &["clinical", "animal", "environmental", "social", "lab", "rumor"];
pub const LEVELS: &[&str] = &["low", "medium", "high"];
pub const PRIORITIES: &[&str] = &["immediate", "short_term", "medium_term"];

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn string_enum(values: &[&str]) -> Value {
    json!({ "type": "STRING", "enum": values })
}

fn string_array() -> Value {
    json!({ "type": "ARRAY", "items": string() })
}

fn array(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

fn object(properties: Vec<(&str, Value)>, required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    json!({ "type": "OBJECT", "properties": props, "required": required })
}

fn cost() -> Value {
    object(
        vec![
            ("score", json!({ "type": "NUMBER", "minimum": 0, "maximum": 10 })),
            ("summary", string()),
        ],
        &["score", "summary"],
    )
}

static REPORT_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    let signal = object(
        vec![
            ("type", string_enum(SIGNAL_TYPES)),
            ("source_description", string()),
            ("location", string()),
            ("timeframe", string()),
            ("suspected_condition", string()),
            ("signal_strength", string_enum(LEVELS)),
            ("reasoning", string()),
        ],
        &["type", "source_description", "signal_strength", "reasoning"],
    );

    let risk_assessment = object(
        vec![
            ("overall_risk_level", string_enum(LEVELS)),
            ("likely_pathogen_class", string()),
            ("key_uncertainties", string_array()),
            ("justification", string()),
        ],
        &["overall_risk_level", "likely_pathogen_class", "key_uncertainties", "justification"],
    );

    let scenario = object(
        vec![
            ("time_horizon_days", json!({ "type": "INTEGER", "minimum": 0 })),
            ("best_case", string()),
            ("worst_case", string()),
            ("most_likely_course", string()),
            ("critical_triggers", string_array()),
        ],
        &["time_horizon_days", "best_case", "worst_case", "most_likely_course", "critical_triggers"],
    );

    let mgtc = object(
        vec![
            ("information_cost", cost()),
            ("bargaining_cost", cost()),
            ("enforcement_cost", cost()),
            ("top_governance_risks", string_array()),
            ("opportunities_for_improvement", string_array()),
        ],
        &[
            "information_cost",
            "bargaining_cost",
            "enforcement_cost",
            "top_governance_risks",
            "opportunities_for_improvement",
        ],
    );

    let coordination = object(
        vec![
            ("key_actors", string_array()),
            ("coordination_challenges", string_array()),
            ("opportunities", string_array()),
        ],
        &["key_actors", "coordination_challenges", "opportunities"],
    );

    let action = object(
        vec![
            ("priority", string_enum(PRIORITIES)),
            ("domain", string()),
            ("action", string()),
            ("rationale", string()),
        ],
        &["priority", "domain", "action", "rationale"],
    );

    let briefings = object(
        vec![
            ("minister_brief", string()),
            ("public_message", string()),
            ("partner_note", string()),
        ],
        &[],
    );

    object(
        vec![
            ("task", string()),
            ("signals", array(signal)),
            ("risk_assessment", risk_assessment),
            ("scenario", scenario),
            ("mgtc_analysis", mgtc),
            ("international_coordination", coordination),
            ("recommended_actions", array(action)),
            ("briefings", briefings),
        ],
        &TOP_LEVEL_SECTIONS,
    )
});

/// The response schema declared to the reasoning service.
pub fn report_schema() -> &'static Value {
    &REPORT_SCHEMA
}

/// Walk `value` against `schema`, filling absent fillable fields with empty
/// values and normalizing integral floats. Returns a description of the first
/// mismatch, prefixed with its JSON path.
pub fn conform(value: &mut Value, schema: &Value, path: &str) -> Result<(), String> {
    let kind = schema.get("type").and_then(Value::as_str).unwrap_or("");
    match kind {
        "OBJECT" => conform_object(value, schema, path),
        "ARRAY" => {
            let items = value
                .as_array_mut()
                .ok_or_else(|| format!("`{path}` must be an array"))?;
            let item_schema = schema.get("items").unwrap_or(&Value::Null);
            for (i, item) in items.iter_mut().enumerate() {
                conform(item, item_schema, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        "STRING" => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("`{path}` must be a string"))?;
            if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
                if !allowed.iter().any(|a| a.as_str() == Some(s)) {
                    let names: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
                    return Err(format!(
                        "`{path}` must be one of {} (got \"{s}\")",
                        names.join(", ")
                    ));
                }
            }
            Ok(())
        }
        "NUMBER" => {
            let n = value
                .as_f64()
                .ok_or_else(|| format!("`{path}` must be a number"))?;
            check_bounds(n, schema, path)
        }
        "INTEGER" => {
            let n = value
                .as_f64()
                .filter(|n| n.fract() == 0.0)
                .ok_or_else(|| format!("`{path}` must be an integer"))?;
            check_bounds(n, schema, path)?;
            if !value.is_i64() && !value.is_u64() {
                *value = json!(n as i64);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn conform_object(value: &mut Value, schema: &Value, path: &str) -> Result<(), String> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| format!("`{}` must be an object", display_path(path)))?;

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, prop_schema) in properties {
        let field_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        let present = obj.get(key).is_some_and(|v| !v.is_null());
        if !present {
            if required.contains(&key.as_str()) {
                return Err(format!("missing required field `{field_path}`"));
            }
            obj.insert(key.clone(), empty_value(prop_schema));
        }
        if let Some(field) = obj.get_mut(key) {
            conform(field, prop_schema, &field_path)?;
        }
    }
    Ok(())
}

fn check_bounds(n: f64, schema: &Value, path: &str) -> Result<(), String> {
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if n < min {
            return Err(format!("`{path}` must be >= {min} (got {n})"));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if n > max {
            return Err(format!("`{path}` must be <= {max} (got {n})"));
        }
    }
    Ok(())
}

/// Empty value for a fillable field.
fn empty_value(schema: &Value) -> Value {
    match schema.get("type").and_then(Value::as_str).unwrap_or("") {
        "ARRAY" => json!([]),
        "OBJECT" => json!({}),
        "NUMBER" | "INTEGER" => json!(0),
        _ => json!(""),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "response"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_every_top_level_section() {
        let required: Vec<&str> = report_schema()["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, TOP_LEVEL_SECTIONS.to_vec());
        for section in TOP_LEVEL_SECTIONS {
            assert!(report_schema()["properties"].get(section).is_some(), "{section}");
        }
    }

    #[test]
    fn briefing_fields_are_optional() {
        let briefings = &report_schema()["properties"]["briefings"];
        assert_eq!(briefings["required"], json!([]));
        assert_eq!(briefings["properties"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn signal_required_fields() {
        let signal = &report_schema()["properties"]["signals"]["items"];
        assert_eq!(
            signal["required"],
            json!(["type", "source_description", "signal_strength", "reasoning"])
        );
    }

    #[test]
    fn fills_absent_optional_fields() {
        let schema = object(vec![("a", string()), ("b", string_array())], &[]);
        let mut value = json!({});
        conform(&mut value, &schema, "").unwrap();
        assert_eq!(value, json!({ "a": "", "b": [] }));
    }

    #[test]
    fn null_optional_field_becomes_empty() {
        let schema = object(vec![("a", string())], &[]);
        let mut value = json!({ "a": null });
        conform(&mut value, &schema, "").unwrap();
        assert_eq!(value, json!({ "a": "" }));
    }

    #[test]
    fn missing_required_field_reports_path() {
        let schema = object(vec![("inner", object(vec![("x", string())], &["x"]))], &["inner"]);
        let mut value = json!({ "inner": {} });
        let err = conform(&mut value, &schema, "").unwrap_err();
        assert_eq!(err, "missing required field `inner.x`");
    }

    #[test]
    fn enum_violation_not_coerced() {
        let schema = string_enum(LEVELS);
        let mut value = json!("severe");
        let err = conform(&mut value, &schema, "risk").unwrap_err();
        assert!(err.contains("must be one of low, medium, high"));
        assert_eq!(value, json!("severe"));
    }

    #[test]
    fn score_bounds_enforced() {
        let mut too_high = json!({ "score": 11, "summary": "x" });
        assert!(conform(&mut too_high, &cost(), "c").is_err());
        let mut negative = json!({ "score": -0.5, "summary": "x" });
        assert!(conform(&mut negative, &cost(), "c").is_err());
        let mut ok = json!({ "score": 7.5, "summary": "x" });
        assert!(conform(&mut ok, &cost(), "c").is_ok());
    }

    #[test]
    fn integral_float_normalized_to_integer() {
        let schema = json!({ "type": "INTEGER", "minimum": 0 });
        let mut value = json!(30.0);
        conform(&mut value, &schema, "days").unwrap();
        assert!(value.is_i64());
        assert_eq!(value, json!(30));

        let mut fractional = json!(2.5);
        assert!(conform(&mut fractional, &schema, "days").is_err());
    }

    #[test]
    fn wrong_type_rejected() {
        let mut value = json!("not an array");
        let err = conform(&mut value, &string_array(), "list").unwrap_err();
        assert_eq!(err, "`list` must be an array");
    }

    #[test]
    fn non_object_root_rejected() {
        let mut value = json!([1, 2]);
        let err = conform(&mut value, report_schema(), "").unwrap_err();
        assert_eq!(err, "`response` must be an object");
    }
}
