///
/// Type translation strategies.
///
/// The bridge never interprets declared types itself; it hands each
/// non-null cell and its declared type to the handle's translator and
/// stores whatever comes back.
///

use sqlbridge_core::Value;

pub trait TypeTranslator: Send + Sync {
    fn translate(&self, declared_type: &str, value: Value) -> Value;
}

impl<F> TypeTranslator for F
where
    F: Fn(&str, Value) -> Value + Send + Sync,
{
    fn translate(&self, declared_type: &str, value: Value) -> Value {
        self(declared_type, value)
    }
}

/// Translator following the engine's column affinity rules.
///
/// Text that does not parse as the target type is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranslator;

impl TypeTranslator for DefaultTranslator {
    fn translate(&self, declared_type: &str, value: Value) -> Value {
        let Value::Text(text) = &value else {
            return value;
        };
        let declared = declared_type.to_ascii_uppercase();

        let translated = if declared.contains("INT") {
            text.trim().parse::<i64>().ok().map(Value::Integer)
        } else if declared.contains("BOOL") {
            parse_bool(text).map(Value::Bool)
        } else if ["REAL", "FLOA", "DOUB"].iter().any(|t| declared.contains(t)) {
            text.trim().parse::<f64>().ok().map(Value::Float)
        } else if declared.contains("NUMERIC") || declared.contains("DECIMAL") {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| trimmed.parse::<f64>().map(Value::Float))
                .ok()
        } else {
            None
        };

        translated.unwrap_or(value)
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}
