use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use graphbase::catalog::{CatalogOptions, MemCoordinator, RetryNTimes};
use graphbase::kv::{Compression, MemStore, TableName};
use graphbase::query::{properties, PropertyProjection, Value};
use graphbase::storage::StorageOptions;
use graphbase::{
    ErrorKind, GraphConfiguration, GraphError, GraphService, Mutation, Node, Relationship,
    RelationshipId, Result,
};

struct Harness {
    store: MemStore,
    coordinator: MemCoordinator,
    service: GraphService,
}

fn harness() -> Harness {
    let store = MemStore::new();
    let coordinator = MemCoordinator::new();
    let service = GraphService::open(
        StorageOptions::new(Arc::new(store.clone())).splits(4),
        CatalogOptions::new(Arc::new(coordinator.clone()))
            .retry(RetryNTimes::new(3, Duration::from_millis(1))),
    )
    .unwrap();
    Harness {
        store,
        coordinator,
        service,
    }
}

fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn with_graph(graph_id: &str) -> Harness {
    let h = harness();
    h.service
        .create_graph(&GraphConfiguration::new(graph_id))
        .unwrap();
    assert!(eventually(|| h.service.graph_exists(graph_id)));
    h
}

#[test]
fn graph_lifecycle() -> Result<()> {
    let h = harness();
    let config = GraphConfiguration::new("social");
    h.service.create_graph(&config)?;
    assert!(eventually(|| h.service.get_graph_configuration("social")
        == Some(config.clone())));

    let node_table = TableName::new("graphbase", "social_node");
    let descriptor = h.store.descriptor(&node_table).unwrap();
    assert_eq!(descriptor.compression, Compression::Lz4);
    assert_eq!(descriptor.max_versions, u32::MAX);
    assert!(descriptor.keep_deleted_cells);
    assert_eq!(h.store.regions(&node_table), Some(4));

    let err = h.service.create_graph(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    h.service.drop_graph("social")?;
    assert!(eventually(|| !h.service.graph_exists("social")));
    assert!(h.store.descriptor(&node_table).is_none());
    assert!(matches!(
        h.service.drop_graph("social"),
        Err(GraphError::GraphNotFound(_))
    ));
    Ok(())
}

#[test]
fn invalid_graph_ids_are_rejected() {
    let h = harness();
    for id in ["", "a/b"] {
        let err = h
            .service
            .create_graph(&GraphConfiguration::new(id))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

#[test]
fn node_lifecycle() -> Result<()> {
    let h = with_graph("g");
    let node = Node::new("n1", "Person", properties([("name", Value::from("ada"))]));
    h.service.add_node("g", &node)?;
    assert!(matches!(
        h.service.add_node("g", &node),
        Err(GraphError::NodeAlreadyExists(ref id)) if id == "n1"
    ));
    assert!(h.service.node_exists("g", "n1")?);

    h.service.update_node(
        "g",
        "n1",
        &Mutation::new().set("age", 36).delete("name"),
    )?;
    let read = h
        .service
        .get_node("g", "n1", &PropertyProjection::all())?
        .unwrap();
    assert_eq!(read.node_type, "Person");
    assert_eq!(read.properties.get("age"), Some(&Value::Int(36)));
    assert!(!read.properties.contains_key("name"));
    assert!(read.properties.contains_key("_added_at"));

    let bare = h
        .service
        .get_node("g", "n1", &PropertyProjection::none())?
        .unwrap();
    assert!(bare.properties.is_empty());

    h.service.delete_node("g", "n1")?;
    assert!(!h.service.node_exists("g", "n1")?);
    assert!(h.service.get_node("g", "n1", &PropertyProjection::all())?.is_none());
    assert!(matches!(
        h.service.delete_node("g", "n1"),
        Err(GraphError::NodeNotFound(_))
    ));
    assert!(matches!(
        h.service.update_node("g", "n1", &Mutation::new().set("x", 1)),
        Err(GraphError::NodeNotFound(_))
    ));
    assert!(matches!(
        h.service.delete_node("g", "never"),
        Err(GraphError::NodeNotFound(_))
    ));
    Ok(())
}

#[test]
fn recreated_node_keeps_no_stale_properties() -> Result<()> {
    let h = with_graph("g");
    h.service.add_node(
        "g",
        &Node::new("n1", "T", properties([("old", Value::Int(1))])),
    )?;
    h.service.delete_node("g", "n1")?;
    h.service.add_node("g", &Node::new("n1", "U", properties::<&str, Value, _>([])))?;
    let read = h
        .service
        .get_node("g", "n1", &PropertyProjection::all())?
        .unwrap();
    assert_eq!(read.node_type, "U");
    assert!(!read.properties.contains_key("old"));
    Ok(())
}

#[test]
fn relationship_lifecycle() -> Result<()> {
    let h = with_graph("g");
    let rel = Relationship::new(
        "alice",
        "KNOWS",
        "bob",
        properties([("since", Value::Int(2019))]),
    );
    let id = rel.id();
    // Endpoints are not required to exist.
    h.service.add_relationship("g", &rel)?;
    assert!(matches!(
        h.service.add_relationship("g", &rel),
        Err(GraphError::RelationshipAlreadyExists(_))
    ));
    assert!(h.service.relationship_exists("g", &id)?);
    assert!(!h
        .service
        .relationship_exists("g", &RelationshipId::new("alice", "LIKES", "bob"))?);

    h.service
        .update_relationship("g", &id, &Mutation::new().set("weight", 0.5))?;
    let read = h
        .service
        .get_relationship("g", &id, &PropertyProjection::with_properties(["weight"]))?
        .unwrap();
    assert_eq!(read.id(), id);
    assert_eq!(read.properties.len(), 1);
    assert_eq!(read.properties.get("weight"), Some(&Value::Float(0.5)));

    h.service.delete_relationship("g", &id)?;
    assert!(!h.service.relationship_exists("g", &id)?);
    assert!(matches!(
        h.service.delete_relationship("g", &id),
        Err(GraphError::RelationshipNotFound(_))
    ));
    Ok(())
}

#[test]
fn relationship_ids_with_nul_are_rejected() {
    let h = with_graph("g");
    let rel = Relationship::new("a\0b", "KNOWS", "c", properties::<&str, Value, _>([]));
    let err = h.service.add_relationship("g", &rel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn repair_recreates_missing_tables() -> Result<()> {
    let h = with_graph("g");
    assert!(!h.service.repair_graph("g")?);

    // Simulate a drop that removed the tables but not the catalog entry.
    h.service
        .storage()
        .drop_graph(&GraphConfiguration::new("g"))?;
    assert!(h.service.add_node("g", &Node::new("n", "T", Default::default())).is_err());
    assert!(h.service.repair_graph("g")?);
    h.service
        .add_node("g", &Node::new("n", "T", Default::default()))?;
    Ok(())
}

#[test]
fn catalog_outage_surfaces_as_internal() {
    let h = with_graph("g");
    h.coordinator.close();
    let err = h
        .service
        .create_graph(&GraphConfiguration::new("other"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    // Cached entries keep serving entity calls.
    assert!(h.service.node_exists("g", "n").is_ok());
}

#[test]
fn store_outage_surfaces_as_internal() {
    let h = with_graph("g");
    h.store.set_available(false);
    let err = h.service.node_exists("g", "n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    h.store.set_available(true);
    assert!(!h.service.node_exists("g", "n").unwrap());
}
