use serde_json::Value;

/// Pulls `reason` and `message` out of an API error body.
pub fn get_error(val: &Value) -> (Option<String>, Option<String>) {
    let field = |name: &str| val.get(name).and_then(Value::as_str).map(str::to_string);
    (field("reason"), field("message"))
}
