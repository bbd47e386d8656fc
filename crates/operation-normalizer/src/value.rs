use graphql_parser::query::{Number, Value};

pub(super) fn hide_arguments<'a>(arguments: &mut [(&'a str, Value<'a, &'a str>)]) {
    arguments.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (_, argument) in arguments {
        hide(argument);
    }
}

pub(super) fn hide<'a>(value: &mut Value<'a, &'a str>) {
    match value {
        Value::String(value) => {
            *value = String::new();
        }
        // Printed as `0` rather than `0.0`, the same as integers.
        Value::Float(_) => {
            *value = Value::Int(Number::from(0));
        }
        Value::Int(value) => {
            *value = Number::from(0);
        }
        Value::List(list) => {
            list.clear();
        }
        Value::Object(map) => {
            map.clear();
        }
        Value::Variable(_) | Value::Boolean(_) | Value::Null | Value::Enum(_) => (),
    }
}
