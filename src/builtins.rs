//! Builtin types of the XAML language namespace.
//!
//! Primitives carry a [`PrimitiveConverter`] acting as both value serializer
//! and type converter, so `1` becomes `x:Int32` initialized from `"1"`.

use crate::convert::{
    ConvertError, ConvertResult, NameService, TypeConverter, ValueSerializer,
};
use crate::schema::{MemberBuilder, ParameterInfo, SchemaContext, TypeBuilder, XamlTypeName, XAML_NAMESPACE};
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use std::rc::Rc;

/// Which primitive a [`PrimitiveConverter`] handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Boolean,
    Char,
    Int32,
    Int64,
    Double,
    DateTime,
    BigInteger,
}

impl PrimitiveKind {
    const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::String,
        PrimitiveKind::Boolean,
        PrimitiveKind::Char,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Double,
        PrimitiveKind::DateTime,
        PrimitiveKind::BigInteger,
    ];

    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::String => "String",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::DateTime => "DateTime",
            PrimitiveKind::BigInteger => "BigInteger",
        }
    }
}

/// Invariant-culture conversion for one primitive kind.
#[derive(Clone, Copy, Debug)]
pub struct PrimitiveConverter {
    kind: PrimitiveKind,
}

impl PrimitiveConverter {
    #[must_use]
    pub const fn new(kind: PrimitiveKind) -> Self {
        PrimitiveConverter { kind }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self.kind, value),
            (PrimitiveKind::String, Value::String(_))
                | (PrimitiveKind::Boolean, Value::Bool(_))
                | (PrimitiveKind::Char, Value::Char(_))
                | (PrimitiveKind::Int32, Value::Int32(_))
                | (PrimitiveKind::Int64, Value::Int64(_))
                | (PrimitiveKind::Double, Value::Double(_))
                | (PrimitiveKind::DateTime, Value::DateTime(_))
                | (PrimitiveKind::BigInteger, Value::BigInt(_))
        )
    }

    fn format(&self, value: &Value) -> ConvertResult<String> {
        let text = match value {
            Value::String(s) if self.kind == PrimitiveKind::String => s.clone(),
            Value::Bool(b) if self.kind == PrimitiveKind::Boolean => {
                if *b { "True" } else { "False" }.to_string()
            }
            Value::Char(c) if self.kind == PrimitiveKind::Char => c.to_string(),
            Value::Int32(i) if self.kind == PrimitiveKind::Int32 => i.to_string(),
            Value::Int64(i) if self.kind == PrimitiveKind::Int64 => i.to_string(),
            Value::Double(d) if self.kind == PrimitiveKind::Double => format_double(*d),
            Value::DateTime(dt) if self.kind == PrimitiveKind::DateTime => {
                dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            }
            Value::BigInt(bi) if self.kind == PrimitiveKind::BigInteger => bi.to_string(),
            other => {
                return Err(ConvertError::recoverable(format!(
                    "{} converter cannot format {}",
                    self.kind.type_name(),
                    other.kind_name()
                )))
            }
        };
        Ok(text)
    }

    fn parse(&self, text: &str) -> ConvertResult<Value> {
        let bad = |e: &dyn std::fmt::Display| {
            ConvertError::recoverable(format!(
                "'{}' is not a valid {}: {}",
                text,
                self.kind.type_name(),
                e
            ))
        };
        let value = match self.kind {
            PrimitiveKind::String => Value::String(text.to_string()),
            PrimitiveKind::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(bad(&"expected True or False")),
            },
            PrimitiveKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(bad(&"expected exactly one character")),
                }
            }
            PrimitiveKind::Int32 => Value::Int32(text.trim().parse().map_err(|e| bad(&e))?),
            PrimitiveKind::Int64 => Value::Int64(text.trim().parse().map_err(|e| bad(&e))?),
            PrimitiveKind::Double => Value::Double(parse_double(text.trim()).ok_or_else(|| bad(&"not a number"))?),
            PrimitiveKind::DateTime => Value::DateTime(
                DateTime::parse_from_rfc3339(text.trim())
                    .map_err(|e| bad(&e))?
                    .with_timezone(&Utc),
            ),
            PrimitiveKind::BigInteger => {
                Value::BigInt(text.trim().parse::<BigInt>().map_err(|e| bad(&e))?)
            }
        };
        Ok(value)
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "Infinity".to_string()
    } else if d == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        d.to_string()
    }
}

fn parse_double(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}

impl ValueSerializer for PrimitiveConverter {
    fn can_convert_to_string(&self, value: &Value, _names: &mut dyn NameService) -> bool {
        self.accepts(value)
    }

    fn convert_to_string(
        &self,
        value: &Value,
        _names: &mut dyn NameService,
    ) -> ConvertResult<String> {
        self.format(value)
    }

    fn can_convert_from_string(&self, _text: &str) -> bool {
        true
    }

    fn convert_from_string(&self, text: &str) -> ConvertResult<Value> {
        self.parse(text)
    }
}

impl TypeConverter for PrimitiveConverter {
    fn can_convert_to_string(&self, value: &Value) -> bool {
        self.accepts(value)
    }

    fn convert_to_string(
        &self,
        value: &Value,
        _names: &mut dyn NameService,
    ) -> ConvertResult<String> {
        self.format(value)
    }

    fn can_convert_from_string(&self) -> bool {
        true
    }

    fn convert_from_string(&self, text: &str) -> ConvertResult<Value> {
        self.parse(text)
    }
}

pub(crate) fn register_builtins(schema: &mut SchemaContext) {
    let build = TypeBuilder::build_unchecked;
    let string = || XamlTypeName::xaml("String");

    schema.register(build(TypeBuilder::new(XAML_NAMESPACE, "Object")));

    for kind in PrimitiveKind::ALL {
        let converter = Rc::new(PrimitiveConverter::new(kind));
        schema.register(build(
            TypeBuilder::new(XAML_NAMESPACE, kind.type_name())
                .type_converter(converter.clone())
                .value_serializer(converter),
        ));
    }

    schema.register(build(
        TypeBuilder::new(XAML_NAMESPACE, "Null").markup_extension(),
    ));
    schema.register(build(
        TypeBuilder::new(XAML_NAMESPACE, "Type")
            .markup_extension()
            .constructor(vec![ParameterInfo::new("typeName", string())])
            .member(MemberBuilder::new("TypeName", string()).constructor_argument("typeName")),
    ));
    schema.register(build(
        TypeBuilder::new(XAML_NAMESPACE, "Reference")
            .markup_extension()
            .constructor(vec![ParameterInfo::new("name", string())])
            .member(MemberBuilder::new("Name", string()).constructor_argument("name")),
    ));
    schema.register(build(
        TypeBuilder::new(XAML_NAMESPACE, "Array")
            .markup_extension()
            .member(MemberBuilder::new("Type", XamlTypeName::xaml("Type")))
            .member(MemberBuilder::new("Items", XamlTypeName::xaml("Object")).read_only())
            .content_property("Items"),
    ));
    schema.register(build(
        TypeBuilder::new(XAML_NAMESPACE, "XData")
            .member(MemberBuilder::new("Text", string()))
            .content_property("Text"),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::NoNames;

    #[test]
    fn test_int32_round_trip() {
        let conv = PrimitiveConverter::new(PrimitiveKind::Int32);
        let text = TypeConverter::convert_to_string(&conv, &Value::Int32(-42), &mut NoNames).unwrap();
        assert_eq!(text, "-42");
        assert_eq!(TypeConverter::convert_from_string(&conv, &text).unwrap(), Value::Int32(-42));
    }

    #[test]
    fn test_converter_rejects_other_kinds() {
        let conv = PrimitiveConverter::new(PrimitiveKind::Double);
        assert!(!TypeConverter::can_convert_to_string(&conv, &Value::Int32(1)));
        assert!(TypeConverter::can_convert_to_string(&conv, &Value::Double(1.5)));
    }

    #[test]
    fn test_special_doubles() {
        let conv = PrimitiveConverter::new(PrimitiveKind::Double);
        let text = conv.format(&Value::Double(f64::NEG_INFINITY)).unwrap();
        assert_eq!(text, "-Infinity");
        assert_eq!(conv.parse("Infinity").unwrap(), Value::Double(f64::INFINITY));
    }

    #[test]
    fn test_booleans_use_invariant_casing() {
        let conv = PrimitiveConverter::new(PrimitiveKind::Boolean);
        assert_eq!(conv.format(&Value::Bool(true)).unwrap(), "True");
        assert_eq!(conv.parse("false").unwrap(), Value::Bool(false));
        assert!(conv.parse("yes").is_err());
    }

    #[test]
    fn test_datetime_round_trip() {
        let conv = PrimitiveConverter::new(PrimitiveKind::DateTime);
        let dt = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let text = conv.format(&Value::DateTime(dt)).unwrap();
        assert_eq!(text, "2024-01-15T10:30:00Z");
        assert_eq!(conv.parse(&text).unwrap(), Value::DateTime(dt));
    }

    #[test]
    fn test_bigint_round_trip() {
        let conv = PrimitiveConverter::new(PrimitiveKind::BigInteger);
        let big: BigInt = "123456789012345678901234567890".parse().unwrap();
        let text = conv.format(&Value::BigInt(big.clone())).unwrap();
        assert_eq!(conv.parse(&text).unwrap(), Value::BigInt(big));
    }
}
