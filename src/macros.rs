/// Builds a [`DynObject`](crate::DynObject) value.
///
/// Members go in braces as `"Name": value`, collection items in an optional
/// trailing bracket list. Values are anything that converts into
/// [`Value`](crate::Value).
///
/// # Examples
///
/// ```rust
/// use xaml_stream::{dyn_object, DynObject, Value};
///
/// let list = dyn_object!("urn:app", "IntList", { "Capacity": 3 }, [1, 2, 3]);
/// let object = list.as_instance().unwrap().downcast_ref::<DynObject>().unwrap();
/// assert_eq!(object.get("Capacity"), Some(Value::from(3)));
/// assert_eq!(object.items().len(), 3);
/// ```
#[macro_export]
macro_rules! dyn_object {
    ($namespace:expr, $name:expr) => {
        $crate::dyn_object!($namespace, $name, {})
    };

    ($namespace:expr, $name:expr, { $($member:literal : $value:expr),* $(,)? } $(, [ $($item:expr),* $(,)? ])?) => {{
        let object = $crate::DynObject::new($crate::XamlTypeName::new($namespace, $name));
        $(
            object.set($member, $value);
        )*
        $($(
            object.push($item);
        )*)?
        object.into_value()
    }};
}

#[cfg(test)]
mod tests {
    use crate::{DynObject, Value, XamlTypeName};

    fn object(value: &Value) -> &DynObject {
        value.as_instance().unwrap().downcast_ref::<DynObject>().unwrap()
    }

    #[test]
    fn test_dyn_object_bare() {
        let value = dyn_object!("urn:app", "Box");
        let object = object(&value);
        assert_eq!(object.type_name(), &XamlTypeName::new("urn:app", "Box"));
        assert!(object.members().is_empty());
    }

    #[test]
    fn test_dyn_object_members() {
        let value = dyn_object!("urn:app", "Box", { "Width": 4, "Title": "hi", });
        let object = object(&value);
        assert_eq!(object.get("Width"), Some(Value::Int32(4)));
        assert_eq!(object.get("Title"), Some(Value::String("hi".to_string())));
    }

    #[test]
    fn test_dyn_object_nested_items() {
        let value = dyn_object!("urn:app", "Panel", {}, [
            dyn_object!("urn:app", "Box", { "Width": 1 }),
            Value::Null,
        ]);
        let items = object(&value).items();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_object());
        assert!(items[1].is_null());
    }
}
