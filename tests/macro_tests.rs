use xaml_stream::{dyn_object, DynObject, Value, XamlTypeName};

fn object(value: &Value) -> &DynObject {
    value.as_instance().unwrap().downcast_ref::<DynObject>().unwrap()
}

#[test]
fn test_dyn_object_macro_type_name() {
    let value = dyn_object!("urn:app", "Box");
    assert_eq!(object(&value).type_name(), &XamlTypeName::new("urn:app", "Box"));
}

#[test]
fn test_dyn_object_macro_scalars() {
    let value = dyn_object!("urn:app", "Box", {
        "Width": 4,
        "Ratio": 0.5,
        "Visible": true,
        "Title": "hello world",
        "Initial": 'h',
    });
    let object = object(&value);
    assert_eq!(object.get("Width"), Some(Value::Int32(4)));
    assert_eq!(object.get("Ratio"), Some(Value::Double(0.5)));
    assert_eq!(object.get("Visible"), Some(Value::Bool(true)));
    assert_eq!(object.get("Title"), Some(Value::String("hello world".to_string())));
    assert_eq!(object.get("Initial"), Some(Value::Char('h')));
    assert_eq!(object.get("Missing"), None);
}

#[test]
fn test_dyn_object_macro_null_and_type_members() {
    let value = dyn_object!("urn:app", "Box", {
        "Tag": Value::Null,
        "Kind": XamlTypeName::xaml("Int32"),
    });
    let object = object(&value);
    assert_eq!(object.get("Tag"), Some(Value::Null));
    assert_eq!(object.get("Kind"), Some(Value::Type(XamlTypeName::xaml("Int32"))));
}

#[test]
fn test_dyn_object_macro_items() {
    let value = dyn_object!("urn:app", "IntList", {}, [1, 2, 3,]);
    assert_eq!(
        object(&value).items(),
        vec![Value::from(1), Value::from(2), Value::from(3)]
    );
}

#[test]
fn test_dyn_object_macro_nesting() {
    let value = dyn_object!("urn:app", "Panel", { "Title": "outer" }, [
        dyn_object!("urn:app", "Box", { "Width": 1 }),
        dyn_object!("urn:app", "Panel", {}, [dyn_object!("urn:app", "Box")]),
    ]);
    let items = object(&value).items();
    assert_eq!(items.len(), 2);
    assert_eq!(object(&items[0]).get("Width"), Some(Value::from(1)));
    assert_eq!(object(&items[1]).items().len(), 1);
}

#[test]
fn test_dyn_object_macro_creates_distinct_instances() {
    let first = dyn_object!("urn:app", "Box");
    let second = dyn_object!("urn:app", "Box");
    assert_ne!(first, second);
    assert_eq!(first, first.clone());
}
