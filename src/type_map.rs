// Mapping from abstract parameter types to native bind-type codes.

use crate::native::NativeType;
use crate::types::{Param, ParamType, Value};

/// Native type for a typed parameter, decided by its tag alone.
#[must_use]
pub fn native_type(param: &Param) -> NativeType {
    native_type_for_tag(param.param_type())
}

#[must_use]
pub fn native_type_for_tag(tag: ParamType) -> NativeType {
    match tag {
        ParamType::Integer => NativeType::Int,
        ParamType::Boolean => NativeType::Bol,
        // floats travel as text and are converted by the engine
        ParamType::Float | ParamType::String => NativeType::Chr,
        ParamType::Text => NativeType::Clob,
        ParamType::Blob => NativeType::Blob,
        ParamType::Binary => NativeType::Bin,
    }
}

/// Native type inferred for an untyped value.
#[must_use]
pub fn infer_native_type(value: &Value) -> NativeType {
    match value {
        Value::Bool(_) => NativeType::Bol,
        Value::Int(_) => NativeType::Int,
        _ => NativeType::Chr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LobData;

    #[test]
    fn maps_every_tag() {
        let expected = [
            (ParamType::Integer, NativeType::Int),
            (ParamType::Boolean, NativeType::Bol),
            (ParamType::Float, NativeType::Chr),
            (ParamType::String, NativeType::Chr),
            (ParamType::Text, NativeType::Clob),
            (ParamType::Blob, NativeType::Blob),
            (ParamType::Binary, NativeType::Bin),
        ];
        for (tag, native) in expected {
            assert_eq!(native_type_for_tag(tag), native, "{tag:?}");
        }
    }

    #[test]
    fn infers_raw_values() {
        assert_eq!(infer_native_type(&Value::Bool(true)), NativeType::Bol);
        assert_eq!(infer_native_type(&Value::Int(3)), NativeType::Int);
        assert_eq!(infer_native_type(&Value::Float(1.5)), NativeType::Chr);
        assert_eq!(infer_native_type(&Value::Text("x".into())), NativeType::Chr);
        assert_eq!(infer_native_type(&Value::Null), NativeType::Chr);
    }

    #[test]
    fn tag_wins_over_value_shape() {
        // a string-typed param holding an integer still binds as CHR
        let param = Param::new(ParamType::String, 42);
        assert_eq!(native_type(&param), NativeType::Chr);
        let lob = Param::text_lob(LobData::text("abc"));
        assert_eq!(native_type(&lob), NativeType::Clob);
    }

    #[test]
    fn native_codes() {
        assert_eq!(NativeType::Chr.code(), 1);
        assert_eq!(NativeType::Int.code(), 3);
        assert_eq!(NativeType::Bin.code(), 23);
        assert_eq!(NativeType::Clob.code(), 112);
        assert_eq!(NativeType::Blob.code(), 113);
        assert_eq!(NativeType::Bol.code(), 252);
    }
}
