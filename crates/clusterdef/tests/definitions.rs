//! Definition files on the cluster path, and provisioning request import

use clusterdef::{Engine, EngineConfig, NodeId, RoleImplications, SliceSpec};
use clusterdef_types::{ClusterError, Provider};
use std::fs;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

const HADOOP: &str = r#"
name: hadoop
provider: ec2
environment: prod
settings:
  owner: data-eng
cloud:
  flavor: m1.large
  image_name: natty
volumes:
  - name: data
    size_gb: 100
    mount_point: /data
run_list:
  - role: base
  - recipe: cleanup
    placement: last
facets:
  - name: master
    instances: 1
    run_list:
      - role: hadoop_namenode
  - name: worker
    instances: 3
    cloud:
      flavor: m1.xlarge
    volumes:
      - name: data
        size_gb: 500
    run_list:
      - role: hadoop_datanode
    servers:
      - index: 2
        name: worker-special
        settings:
          rack: r7
"#;

const REQUEST: &str = r#"{
    "cluster_definition": {
        "name": "hadoop_cluster_test",
        "distro": "apache",
        "template_id": "centos",
        "groups": [
            {"name": "master", "instance_num": 1,
             "roles": ["hadoop_namenode", "hadoop_jobtracker"]},
            {"name": "worker", "instance_num": 3,
             "roles": ["hadoop_datanode", "hadoop_tasktracker"]},
            {"name": "client", "instance_num": 1,
             "roles": ["hadoop_client", "pig", "hive", "hive_server"]}
        ]
    },
    "cloud_provider": {"name": "static"}
}"#;

fn engine_for(dir: &Path) -> Engine {
    Engine::with_implications(
        EngineConfig::default().with_cluster_path([dir]),
        RoleImplications::standard(),
    )
}

#[test]
fn test_load_cluster_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hadoop.yaml"), HADOOP).unwrap();
    let engine = engine_for(dir.path());

    let handle = engine.load_cluster("hadoop").unwrap();
    let mut cluster = handle.write();
    assert_eq!(cluster.provider(), Provider::Ec2);
    assert_eq!(cluster.facet_names(), vec!["master", "worker"]);
    assert_eq!(cluster.source(), Some(dir.path().join("hadoop.yaml").as_path()));
    // ec2 cloud creation implies ssh
    assert_eq!(
        cluster.run_list(NodeId::ROOT),
        vec!["role[ssh]", "role[base]", "recipe[cleanup]"]
    );

    let workers = cluster
        .slice(Some("worker"), &SliceSpec::All)
        .unwrap();
    assert_eq!(
        workers.names(),
        vec!["hadoop-worker-0", "hadoop-worker-1", "worker-special"]
    );

    let special = workers.iter().last().unwrap();
    assert_eq!(special.attributes["rack"], "r7");
    assert_eq!(special.attributes["owner"], "data-eng");
    assert_eq!(special.attributes["environment"], "prod");
    assert_eq!(special.cloud.flavor.as_deref(), Some("m1.xlarge"));
    assert_eq!(special.cloud.image_name.as_deref(), Some("natty"));
    assert!(special.cloud.security_groups.contains_key("hadoop"));
    assert_eq!(special.volumes["data"].size_gb, Some(500));
    assert_eq!(special.volumes["data"].mount_point.as_deref(), Some("/data"));
    assert_eq!(
        special.run_list,
        vec![
            "role[ssh]",
            "role[base]",
            "recipe[cleanup]",
            "role[hadoop_datanode]"
        ]
    );
}

#[test]
fn test_loaded_cluster_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hadoop.yaml"), HADOOP).unwrap();
    let engine = engine_for(dir.path());

    let first = engine.load_cluster("hadoop").unwrap();
    fs::remove_file(dir.path().join("hadoop.yaml")).unwrap();
    let second = engine.load_cluster("hadoop").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    engine.clear_clusters();
    assert!(matches!(
        engine.load_cluster("hadoop"),
        Err(ClusterError::ClusterNotFound { .. })
    ));
}

#[test]
fn test_file_defining_another_cluster_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("webapp.yaml"), "name: database\n").unwrap();
    let engine = engine_for(dir.path());

    let err = engine.load_cluster("webapp").unwrap_err();
    match err {
        ClusterError::DuplicateClusterDefinition {
            expected, found, ..
        } => {
            assert_eq!(expected, "webapp");
            assert_eq!(found, "database");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.cluster("webapp").is_none());
    assert!(engine.cluster("database").is_none());
}

#[test]
fn test_bad_placement_in_definition() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("web.yaml"),
        "name: web\nrun_list:\n  - role: base\n    placement: middle\n",
    )
    .unwrap();
    let engine = engine_for(dir.path());

    assert!(matches!(
        engine.load_cluster("web"),
        Err(ClusterError::InvalidPlacement(_))
    ));
}

#[test]
fn test_json_definitions_use_default_provider() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("db.json"),
        r#"{"name": "db", "facets": [{"name": "primary", "instances": 2}]}"#,
    )
    .unwrap();
    let engine = Engine::new(
        EngineConfig::default()
            .with_cluster_path([dir.path()])
            .with_default_provider(Provider::Vsphere),
    );

    assert_eq!(engine.available_clusters().unwrap(), vec!["db"]);
    let slice = engine.slice("db", Some("primary"), &SliceSpec::All).unwrap();
    assert_eq!(slice.joined_names(), "db-primary-0, db-primary-1");
    assert_eq!(
        engine.cluster("db").unwrap().read().provider(),
        Provider::Vsphere
    );
}

#[test]
fn test_import_writes_and_loads_definition() {
    let clusters = tempfile::tempdir().unwrap();
    let requests = tempfile::tempdir().unwrap();
    let request = requests.path().join("cluster_definition.json");
    fs::write(&request, REQUEST).unwrap();
    let engine = engine_for(clusters.path());

    let handle = engine.import_definition(&request, false).unwrap();
    assert!(clusters.path().join("hadoop_cluster_test.yaml").is_file());

    let cluster = handle.read();
    assert_eq!(cluster.name(), "hadoop_cluster_test");
    assert_eq!(cluster.provider(), Provider::Static);
    assert_eq!(
        cluster.root().settings().get_str("hadoop_distro"),
        Some("apache")
    );
    let cloud = cluster.root().cloud().unwrap();
    assert_eq!(cloud.flavor.as_deref(), Some("default"));
    assert_eq!(cloud.image_name.as_deref(), Some("centos"));

    let summary = cluster.summary();
    let facets: Vec<(&str, u32)> = summary
        .facets
        .iter()
        .map(|f| (f.name.as_str(), f.instances))
        .collect();
    assert_eq!(facets, vec![("master", 1), ("worker", 3), ("client", 1)]);
    assert_eq!(
        summary.facets[2].run_list,
        vec![
            "role[hadoop_client]",
            "role[pig]",
            "role[hive]",
            "role[hive_server]"
        ]
    );
    drop(cluster);

    assert!(matches!(
        engine.import_definition(&request, false),
        Err(ClusterError::ClusterExists { .. })
    ));
    let reloaded = engine.import_definition(&request, true).unwrap();
    assert!(!std::sync::Arc::ptr_eq(&handle, &reloaded));
}

#[test]
fn test_implications_can_query_engine_while_loading() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("web.yaml"),
        "name: web\nrun_list:\n  - role: audit\n",
    )
    .unwrap();
    fs::write(dir.path().join("db.yaml"), "name: db\n").unwrap();
    let engine = Arc::new(engine_for(dir.path()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    engine.role_implication("audit", move |scope| {
        let engine = scope.engine();
        let mut seen = record.lock().unwrap();
        seen.push(format!("{:?}", engine.cluster_names()));
        seen.push(format!("web defined: {}", engine.cluster("web").is_some()));
        engine.load_cluster("db")?;
        engine.define_cluster(Provider::Static, "audit-log", |_| Ok(()))?;
        seen.push(format!("{:?}", engine.cluster_names()));
        Ok(())
    });

    let (tx, rx) = mpsc::channel();
    let loader = engine.clone();
    std::thread::spawn(move || {
        let _ = tx.send(loader.load_cluster("web").map(|_| ()));
    });
    rx.recv_timeout(Duration::from_secs(10))
        .expect("load_cluster blocked on its own engine")
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "[]".to_string(),
            "web defined: false".to_string(),
            r#"["audit-log", "db"]"#.to_string(),
        ]
    );
    assert_eq!(engine.cluster_names(), vec!["audit-log", "db", "web"]);
    assert!(!format!("{engine:?}").is_empty());
}

#[test]
fn test_failed_load_leaves_no_cluster_behind() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(dir.path());

    assert!(matches!(
        engine.load_cluster("missing"),
        Err(ClusterError::ClusterNotFound { .. })
    ));
    assert!(engine.cluster("missing").is_none());
    assert!(engine.cluster_names().is_empty());

    fs::write(dir.path().join("missing.yaml"), "name: missing\n").unwrap();
    engine.clear_clusters();
    assert_eq!(engine.load_cluster("missing").unwrap().read().name(), "missing");
}
