use std::thread;
use std::time::{Duration, Instant};

use graphbase::query::filter::{and, equal, greater, is_null, or, regex};
use graphbase::query::sort::{asc, desc};
use graphbase::query::{properties, EntityQuery, PropertyProjection, Value};
use graphbase::storage::EntityStream;
use graphbase::{
    ErrorKind, GraphConfiguration, GraphService, GraphbaseConfig, Node, Relationship, Result,
};

fn service_with_people() -> GraphService {
    let mut config = GraphbaseConfig::default();
    config.store.splits = 8;
    config.store.scan_batch_size = 2;
    let service = GraphService::in_memory(&config).unwrap();
    service
        .create_graph(&GraphConfiguration::new("people"))
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !service.graph_exists("people") {
        assert!(Instant::now() < deadline, "catalog never caught up");
        thread::sleep(Duration::from_millis(5));
    }

    let rows: [(&str, &str, i64, i64); 4] = [
        ("A", "Person", 3, 1),
        ("B", "Person", 5, 5),
        ("C", "Robot", 1, 3),
        ("D", "Person", 3, 3),
    ];
    for (id, node_type, prop1, prop2) in rows {
        service
            .add_node(
                "people",
                &Node::new(
                    id,
                    node_type,
                    properties([
                        ("prop1", Value::Int(prop1)),
                        ("prop2", Value::Int(prop2)),
                        ("serial", Value::from(format!("{id}-1234567890"))),
                    ]),
                ),
            )
            .unwrap();
    }
    service
        .add_node(
            "people",
            &Node::new("E", "Person", properties([("prop2", Value::Int(9))])),
        )
        .unwrap();
    service
}

fn node_ids(stream: EntityStream<Node>) -> Result<Vec<String>> {
    stream.map(|node| node.map(|n| n.id)).collect()
}

#[test]
fn sort_chain_orders_across_regions() -> Result<()> {
    let service = service_with_people();
    let query = EntityQuery::new()
        .filter(graphbase::query::filter::is_not_null("prop1"))
        .sort(asc("prop1"))
        .sort(desc("prop2"));
    let ids = node_ids(service.get_nodes("people", &query)?)?;
    assert_eq!(ids, ["C", "D", "A", "B"]);
    Ok(())
}

#[test]
fn missing_sort_key_sorts_first_in_both_directions() -> Result<()> {
    let service = service_with_people();
    let ascending = EntityQuery::new().sort(asc("prop1"));
    let ascending = node_ids(service.get_nodes("people", &ascending)?)?;
    let descending = EntityQuery::new().sort(desc("prop1"));
    let descending = node_ids(service.get_nodes("people", &descending)?)?;
    assert_eq!(ascending.first().map(String::as_str), Some("E"));
    assert_eq!(descending.first().map(String::as_str), Some("E"));
    assert_eq!(descending[1], "B");
    Ok(())
}

#[test]
fn filters_compose() -> Result<()> {
    let service = service_with_people();
    let query = EntityQuery::new().filter(and(
        equal("prop1", 3),
        regex("serial", "[A-D]-[0-9]+"),
    ));
    let mut ids = node_ids(service.get_nodes("people", &query)?)?;
    ids.sort();
    assert_eq!(ids, ["A", "D"]);

    let query = EntityQuery::new().filter(or(greater("prop2", 4), is_null("prop1")));
    let mut ids = node_ids(service.get_nodes("people", &query)?)?;
    ids.sort();
    assert_eq!(ids, ["B", "E"]);
    Ok(())
}

#[test]
fn type_allow_list_and_projection() -> Result<()> {
    let service = service_with_people();
    let query = EntityQuery::new()
        .types(["Robot"])
        .projection(PropertyProjection::with_properties(["prop1"]));
    let nodes: Vec<Node> = service
        .get_nodes("people", &query)?
        .collect::<Result<_>>()?;
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].node_type, "Robot");
    assert_eq!(nodes[0].properties, properties([("prop1", Value::Int(1))]));

    // Keys only needed for filtering and sorting are dropped from the output.
    let query = EntityQuery::new()
        .filter(equal("prop1", 3))
        .sort(desc("prop2"))
        .projection(PropertyProjection::none());
    let nodes: Vec<Node> = service
        .get_nodes("people", &query)?
        .collect::<Result<_>>()?;
    assert_eq!(
        nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
        ["D", "A"]
    );
    assert!(nodes.iter().all(|n| n.properties.is_empty()));
    Ok(())
}

#[test]
fn query_from_json() -> Result<()> {
    let service = service_with_people();
    let query: EntityQuery = serde_json::from_str(
        r#"{
            "types": ["Person"],
            "filter": {
                "kind": "compare",
                "propertyKey": "prop1",
                "operator": "GREATER_OR_EQUAL",
                "value": 3
            },
            "sorts": [{"propertyKey": "prop2", "direction": "ASC"}],
            "projection": {"type": "PARTIAL", "propertyKeys": ["prop2"]}
        }"#,
    )?;
    let nodes: Vec<Node> = service
        .get_nodes("people", &query)?
        .collect::<Result<_>>()?;
    assert_eq!(
        nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
        ["A", "D", "B"]
    );
    assert_eq!(nodes[0].properties, properties([("prop2", Value::Int(1))]));
    Ok(())
}

#[test]
fn relationship_scans_gate_on_type() -> Result<()> {
    let service = service_with_people();
    for (out, rel_type, inn, weight) in [
        ("A", "KNOWS", "B", 1),
        ("A", "LIKES", "B", 2),
        ("C", "KNOWS", "D", 3),
        ("D", "BUILT", "C", 4),
    ] {
        service.add_relationship(
            "people",
            &Relationship::new(out, rel_type, inn, properties([("weight", weight)])),
        )?;
    }
    let query = EntityQuery::new().types(["KNOWS"]).sort(desc("weight"));
    let rels: Vec<Relationship> = service
        .get_relationships("people", &query)?
        .collect::<Result<_>>()?;
    assert_eq!(
        rels.iter()
            .map(|r| r.id().to_string())
            .collect::<Vec<_>>(),
        ["(C)-[KNOWS]->(D)", "(A)-[KNOWS]->(B)"]
    );

    let all: Vec<Relationship> = service
        .get_relationships("people", &EntityQuery::new())?
        .collect::<Result<_>>()?;
    assert_eq!(all.len(), 4);
    Ok(())
}

#[test]
fn bad_queries_are_invalid_arguments() -> Result<()> {
    let service = service_with_people();
    let err = service
        .get_nodes("people", &EntityQuery::new().filter(regex("serial", "(")))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    service.add_node(
        "people",
        &Node::new("F", "Person", properties([("prop1", Value::from("three"))])),
    )?;
    let result: Result<Vec<Node>> = service
        .get_nodes("people", &EntityQuery::new().filter(greater("prop1", 2)))?
        .collect();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);

    // Sorting mixed kinds stays total instead of failing.
    let query = EntityQuery::new().sort(asc("prop1"));
    let sorted = node_ids(service.get_nodes("people", &query)?)?;
    assert_eq!(sorted.last().map(String::as_str), Some("F"));
    Ok(())
}

#[test]
fn mixed_numbers_beyond_float_precision_sort_exactly() -> Result<()> {
    let service = service_with_people();
    service.create_graph(&GraphConfiguration::new("wide"))?;
    let deadline = Instant::now() + Duration::from_secs(5);
    while !service.graph_exists("wide") {
        assert!(Instant::now() < deadline, "catalog never caught up");
        thread::sleep(Duration::from_millis(5));
    }

    // 2^53 and its integer neighbours all round to the same f64.
    let base: i64 = 1 << 53;
    for offset in -4..=4 {
        let id = format!("i{offset:+}");
        let node = Node::new(id, "N", properties([("k", Value::Int(base + offset))]));
        service.add_node("wide", &node)?;
    }
    for (id, k) in [("f0", base as f64), ("f2", (base + 2) as f64)] {
        service.add_node("wide", &Node::new(id, "N", properties([("k", Value::Float(k))])))?;
    }

    let query = EntityQuery::new().sort(asc("k"));
    let nodes: Vec<Node> = service.get_nodes("wide", &query)?.collect::<Result<_>>()?;
    let ints: Vec<i64> = nodes
        .iter()
        .filter_map(|n| match n.properties.get("k") {
            Some(Value::Int(k)) => Some(*k),
            _ => None,
        })
        .collect();
    assert_eq!(ints, (-4..=4).map(|o| base + o).collect::<Vec<_>>());

    let position = |id: &str| nodes.iter().position(|n| n.id == id).unwrap();
    assert!(position("i-1") < position("f0"));
    assert!(position("f0") < position("i+1"));
    assert!(position("i+1") < position("f2"));
    assert!(position("f2") < position("i+3"));
    Ok(())
}
