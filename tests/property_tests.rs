//! Property-based tests for the stream guarantees: round trips, balanced
//! nesting and determinism across generated graphs.

use proptest::prelude::*;
use xaml_stream::{
    from_nodes, to_node_string, to_nodes, DynObject, DynRuntime, MemberBuilder, Node, NodeType,
    SchemaContext, TypeBuilder, Value, XamlTypeName,
};

fn schema() -> SchemaContext {
    let mut schema = SchemaContext::new();
    schema.register(
        TypeBuilder::new("urn:app", "IntList")
            .collection()
            .item_type(XamlTypeName::xaml("Int32"))
            .member(MemberBuilder::new("Capacity", XamlTypeName::xaml("Int32")))
            .build()
            .unwrap(),
    );
    schema.register(
        TypeBuilder::new("urn:app", "Panel")
            .collection()
            .item_type(XamlTypeName::xaml("Object"))
            .build()
            .unwrap(),
    );
    schema
}

fn roundtrip(value: &Value) -> bool {
    let schema = SchemaContext::new();
    let runtime = DynRuntime::new();
    match to_nodes(value, &schema, &runtime) {
        Ok(nodes) => match from_nodes(nodes, &schema, &runtime) {
            Ok(back) => back == *value,
            Err(e) => {
                eprintln!("Write failed: {}", e);
                false
            }
        },
        Err(e) => {
            eprintln!("Read failed: {}", e);
            false
        }
    }
}

fn is_balanced(nodes: &[Node]) -> bool {
    let mut depth = 0i64;
    for node in nodes {
        match node.node_type() {
            NodeType::StartObject | NodeType::GetObject | NodeType::StartMember => depth += 1,
            NodeType::EndObject | NodeType::EndMember => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

fn primitive() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn panel(items: Vec<Value>) -> Value {
    DynObject::new(XamlTypeName::new("urn:app", "Panel"))
        .with_items(items)
        .into_value()
}

proptest! {
    #[test]
    fn prop_i32(n in any::<i32>()) {
        prop_assert!(roundtrip(&Value::from(n)));
    }

    #[test]
    fn prop_i64(n in any::<i64>()) {
        prop_assert!(roundtrip(&Value::from(n)));
    }

    #[test]
    fn prop_finite_f64(d in any::<f64>().prop_filter("finite", |d| d.is_finite())) {
        prop_assert!(roundtrip(&Value::from(d)));
    }

    #[test]
    fn prop_bool(b in any::<bool>()) {
        prop_assert!(roundtrip(&Value::from(b)));
    }

    #[test]
    fn prop_char(c in any::<char>()) {
        prop_assert!(roundtrip(&Value::from(c)));
    }

    #[test]
    fn prop_string(s in any::<String>()) {
        prop_assert!(roundtrip(&Value::from(s)));
    }

    #[test]
    fn prop_int_list(items in prop::collection::vec(any::<i32>(), 0..20), capacity in 0i32..64) {
        let schema = schema();
        let runtime = DynRuntime::new();
        let list = DynObject::new(XamlTypeName::new("urn:app", "IntList"))
            .with_member("Capacity", capacity)
            .with_items(items.clone())
            .into_value();

        let nodes = to_nodes(&list, &schema, &runtime).unwrap();
        prop_assert!(is_balanced(&nodes));
        let back = from_nodes(nodes, &schema, &runtime).unwrap();
        let object = back.as_instance().unwrap().downcast_ref::<DynObject>().unwrap();
        let expected: Vec<Value> = items.into_iter().map(Value::from).collect();
        prop_assert_eq!(object.items(), expected);
        prop_assert_eq!(object.get("Capacity"), Some(Value::from(capacity)));
    }

    #[test]
    fn prop_nested_panels_are_balanced_and_stable(
        groups in prop::collection::vec(prop::collection::vec(primitive(), 0..5), 0..5)
    ) {
        let schema = schema();
        let runtime = DynRuntime::new();
        let root = panel(groups.into_iter().map(panel).collect());

        let nodes = to_nodes(&root, &schema, &runtime).unwrap();
        prop_assert!(is_balanced(&nodes));
        let first = to_node_string(&root, &schema, &runtime).unwrap();
        let second = to_node_string(&root, &schema, &runtime).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_declarations_come_first(items in prop::collection::vec(primitive(), 0..8)) {
        let schema = schema();
        let runtime = DynRuntime::new();
        let nodes = to_nodes(&panel(items), &schema, &runtime).unwrap();
        let first_other = nodes
            .iter()
            .position(|n| n.node_type() != NodeType::NamespaceDeclaration)
            .unwrap_or(nodes.len());
        prop_assert!(nodes[first_other..]
            .iter()
            .all(|n| n.node_type() != NodeType::NamespaceDeclaration));
    }

    #[test]
    fn prop_shared_item_written_once(copies in 2usize..6) {
        let schema = schema();
        let runtime = DynRuntime::new();
        let shared = DynObject::new(XamlTypeName::new("urn:app", "Panel")).into_value();
        let root = panel(vec![shared; copies]);

        let nodes = to_nodes(&root, &schema, &runtime).unwrap();
        let reference = schema.xaml_type("Reference").unwrap();
        let references = nodes.iter().filter(|n| n.xaml_type() == Some(&reference)).count();
        prop_assert_eq!(references, copies - 1);

        let back = from_nodes(nodes, &schema, &runtime).unwrap();
        let items = back.as_instance().unwrap().downcast_ref::<DynObject>().unwrap().items();
        prop_assert!(items.windows(2).all(|w| w[0] == w[1]));
    }
}
