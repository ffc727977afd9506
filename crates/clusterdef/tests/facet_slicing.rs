//! Facet addressing: valid indexes, bogus servers and slice resolution

use clusterdef::{ClusterHandle, Engine, EngineConfig, SliceSpec};
use clusterdef_types::Provider;

fn namenode_cluster(engine: &Engine) -> ClusterHandle {
    engine
        .define_cluster(Provider::Static, "test", |cluster| {
            cluster.cloud(|_| {})?;
            cluster.facet("namenode", |facet| {
                facet.instances(5);
                Ok(())
            })?;
            Ok(())
        })
        .unwrap()
}

fn slice(handle: &ClusterHandle, spec: impl Into<SliceSpec>) -> Vec<u32> {
    handle
        .write()
        .slice(Some("namenode"), &spec.into())
        .unwrap()
        .indexes()
}

fn slice_text(handle: &ClusterHandle, text: &str) -> Vec<u32> {
    slice(handle, SliceSpec::parse(text).unwrap())
}

fn add_server(engine: &Engine, index: u32) {
    engine
        .define_cluster(Provider::Static, "test", |cluster| {
            cluster.facet("namenode", |facet| {
                facet.server(index, |_| Ok(()))?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_facet_has_servers() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);
    engine
        .define_cluster(Provider::Static, "test", |cluster| {
            cluster.facet("namenode", |facet| {
                assert_eq!(facet.indexes(), vec![0, 1, 2, 3, 4]);
                assert_eq!(facet.valid_indexes(), vec![0, 1, 2, 3, 4]);
                facet.server(3, |server| {
                    server.named("bob");
                    Ok(())
                })?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let servers = handle.write().servers();
    assert_eq!(servers.len(), 5);
    assert_eq!(
        servers.names(),
        vec![
            "test-namenode-0",
            "test-namenode-1",
            "test-namenode-2",
            "bob",
            "test-namenode-4"
        ]
    );
}

#[test]
fn test_out_of_range_server_is_bogus() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);
    add_server(&engine, 69);

    let cluster = handle.read();
    let id = cluster.server_id("namenode", 69).unwrap();
    assert!(cluster.node(id).unwrap().is_bogus());
    drop(cluster);

    let servers = handle.write().servers();
    let bogus: Vec<u32> = servers
        .iter()
        .filter(|s| s.is_bogus())
        .map(|s| s.facet_index)
        .collect();
    assert_eq!(bogus, vec![69]);

    let summary = handle.read().summary();
    assert_eq!(summary.facets[0].indexes, vec![0, 1, 2, 3, 4, 69]);
    assert_eq!(summary.facets[0].instances, 5);
}

#[test]
fn test_empty_specs_return_everything() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);
    add_server(&engine, 69);

    let all = vec![0, 1, 2, 3, 4, 69];
    assert_eq!(slice_text(&handle, ""), all);
    assert_eq!(slice(&handle, None::<u32>), all);
    assert_eq!(slice(&handle, Vec::<u32>::new()), all);
    assert_eq!(slice(&handle, SliceSpec::default()), all);
    assert_eq!(slice(&handle, vec![1u32, 3]), vec![1, 3]);
}

#[test]
fn test_lists_are_sorted_and_never_create() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);
    add_server(&engine, 69);

    assert_eq!(slice(&handle, vec![3u32, 1, 0]), vec![0, 1, 3]);
    assert_eq!(slice(&handle, vec![3u32, 1, 69, 0]), vec![0, 1, 3, 69]);
    assert_eq!(
        slice(&handle, vec![3u32, 1, 69, 0, 75, 123]),
        vec![0, 1, 3, 69]
    );

    let cluster = handle.read();
    assert!(!cluster.has_server("namenode", 75));
    assert!(cluster.has_server("namenode", 69));
}

#[test]
fn test_text_converts_to_intervals() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);

    assert_eq!(slice_text(&handle, "1"), vec![1]);
    assert_eq!(slice_text(&handle, "5"), Vec::<u32>::new());
    assert_eq!(slice_text(&handle, "1-1"), vec![1]);
    assert_eq!(slice_text(&handle, "0-1"), vec![0, 1]);
    assert_eq!(slice_text(&handle, "0-1,3-4"), vec![0, 1, 3, 4]);
    assert_eq!(slice_text(&handle, "0-1,69"), vec![0, 1]);
    assert_eq!(slice_text(&handle, "0-2,1-3"), vec![0, 1, 2, 3]);
    assert_eq!(slice_text(&handle, "3-1"), Vec::<u32>::new());
    assert_eq!(slice_text(&handle, "2-5"), vec![2, 3, 4]);
    assert_eq!(slice(&handle, 1u32), vec![1]);

    add_server(&engine, 69);
    assert_eq!(slice_text(&handle, "0-1,69"), vec![0, 1, 69]);
}

#[test]
fn test_single_index_creates_bogus_server() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);

    let slice = handle
        .write()
        .slice(Some("namenode"), &SliceSpec::Index(7))
        .unwrap();
    assert_eq!(slice.len(), 1);
    let server = slice.iter().next().unwrap();
    assert_eq!(server.fullname, "test-namenode-7");
    assert_eq!(server.bogosity.as_deref(), Some("index_out_of_range"));
    assert!(handle.read().has_server("namenode", 7));
}

#[test]
fn test_whole_cluster_slice_keeps_facet_order() {
    let engine = Engine::new(EngineConfig::default());
    let handle = engine
        .define_cluster(Provider::Static, "hadoop", |cluster| {
            for (name, count) in [("master", 1), ("worker", 3), ("client", 1)] {
                cluster.facet(name, |facet| {
                    facet.instances(count);
                    Ok(())
                })?;
            }
            Ok(())
        })
        .unwrap();

    let slice = engine.slice("hadoop", None, &SliceSpec::parse("0").unwrap()).unwrap();
    assert_eq!(
        slice.names(),
        vec!["hadoop-master-0", "hadoop-worker-0", "hadoop-client-0"]
    );
    assert_eq!(handle.read().facet_names(), vec!["master", "worker", "client"]);
}

#[test]
fn test_malformed_text_is_rejected() {
    for text in ["a", "1-", "1-2-3", "-3"] {
        assert!(SliceSpec::parse(text).is_err(), "{text}");
    }
}

#[test]
fn test_server_declared_before_instances_is_in_range() {
    let engine = Engine::new(EngineConfig::default());
    let handle = engine
        .define_cluster(Provider::Static, "test", |cluster| {
            cluster.facet("namenode", |facet| {
                facet.server(2, |_| Ok(()))?;
                facet.instances(5);
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let servers = handle
        .write()
        .slice(Some("namenode"), &SliceSpec::Indexes(vec![2]))
        .unwrap();
    let server = servers.iter().next().unwrap();
    assert_eq!(server.facet_index, 2);
    assert_eq!(server.bogosity, None);
    assert!(!server.is_bogus());
}

#[test]
fn test_shrinking_instances_marks_servers_bogus() {
    let engine = Engine::new(EngineConfig::default());
    let handle = namenode_cluster(&engine);
    assert_eq!(slice(&handle, SliceSpec::All), vec![0, 1, 2, 3, 4]);

    engine
        .define_cluster(Provider::Static, "test", |cluster| {
            cluster.facet("namenode", |facet| {
                facet.instances(2);
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let servers = handle
        .write()
        .slice(Some("namenode"), &SliceSpec::Index(4))
        .unwrap();
    let server = servers.iter().next().unwrap();
    assert_eq!(server.bogosity.as_deref(), Some("index_out_of_range"));

    let bogus: Vec<u32> = handle
        .write()
        .servers()
        .iter()
        .filter(|s| s.is_bogus())
        .map(|s| s.facet_index)
        .collect();
    assert_eq!(bogus, vec![2, 3, 4]);
}
