//! Behavioural tests for the provisioning engine.

use std::sync::Arc;

use metal_sim::models::{
    AssignNetworkParameter, BondingType, ConfigureBondingParameter, EnableServerPortParameter,
    InternetSubnetType, InternetType, ListServersParams, OsInstallParameter, PortMode,
    PowerControlParameter, PowerOperation, PowerState, ReadServerTrafficByPortParams,
    ServerLockStatus, UpdateServerPortParameter,
};
use metal_sim::{Engine, EngineError, ResourceKind, Seed};
use tokio::task::JoinSet;

const NODE1: &str = "100000000001";
const NODE2: &str = "100000000002";
const NODE1_CHANNEL: i64 = 101;
const NODE1_PORT: i64 = 1001;
const DEDICATED_SUBNET: &str = "200000000001";

fn engine() -> Engine {
    Engine::new(Seed::sample()).unwrap()
}

fn install(image: &str) -> OsInstallParameter {
    OsInstallParameter {
        os_image_id: image.to_string(),
    }
}

fn power(operation: PowerOperation) -> PowerControlParameter {
    PowerControlParameter { operation }
}

fn bonding(bonding_type: BondingType, names: Option<&[&str]>) -> ConfigureBondingParameter {
    ConfigureBondingParameter {
        bonding_type,
        port_nicknames: names.map(|n| n.iter().map(ToString::to_string).collect()),
    }
}

fn private_networks(ids: &[&str]) -> AssignNetworkParameter {
    AssignNetworkParameter {
        private_network_ids: Some(ids.iter().map(ToString::to_string).collect()),
        ..Default::default()
    }
}

// =============================================================================
// Record store
// =============================================================================

#[tokio::test]
async fn test_snapshots_are_isolated() {
    let engine = engine();
    let list = engine.list_servers(&ListServersParams::default()).await;
    assert_eq!(list.meta.count, list.servers.len());

    let mut snapshot = engine.read_server(NODE1).await.unwrap();
    assert!(list.servers.contains(&snapshot));

    snapshot.hostname = "tampered".to_string();
    snapshot.ports.clear();
    snapshot.lock_status = Some(ServerLockStatus::Maintenance);

    let fresh = engine.read_server(NODE1).await.unwrap();
    assert_eq!(fresh.hostname, "node-1");
    assert_eq!(fresh.ports.len(), 1);
    assert!(fresh.lock_status.is_none());

    let mut port = engine.read_port(NODE1, NODE1_PORT).await.unwrap();
    port.enabled = false;
    assert!(engine.read_port(NODE1, NODE1_PORT).await.unwrap().enabled);
}

#[tokio::test]
async fn test_not_found_errors() {
    let engine = engine();
    assert_eq!(
        engine.list_os_images("missing").await.unwrap_err(),
        EngineError::not_found(ResourceKind::Server, "missing")
    );
    assert!(matches!(
        engine.read_port(NODE1, 9999).await,
        Err(EngineError::NotFound {
            resource: ResourceKind::Port,
            ..
        })
    ));
    assert!(matches!(
        engine.read_port_channel(NODE1, 9999).await,
        Err(EngineError::NotFound {
            resource: ResourceKind::PortChannel,
            ..
        })
    ));
    assert!(matches!(
        engine
            .read_port_traffic(NODE2, NODE1_PORT, &ReadServerTrafficByPortParams::default())
            .await,
        Err(EngineError::NotFound {
            resource: ResourceKind::Port,
            ..
        })
    ));
}

// =============================================================================
// Background actions
// =============================================================================

#[tokio::test]
async fn test_os_install_locks_then_clears() {
    let engine = engine();
    engine.os_install(NODE1, &install("ubuntu-24.04")).await.unwrap();

    let server = engine.read_server(NODE1).await.unwrap();
    assert_eq!(server.lock_status, Some(ServerLockStatus::OsInstall));

    engine.wait_for_actions().await;
    let server = engine.read_server(NODE1).await.unwrap();
    assert!(server.lock_status.is_none());
    assert_eq!(engine.pending_actions(), 0);
}

#[tokio::test]
async fn test_locked_server_rejects_actions() {
    let engine = engine();
    engine.os_install(NODE1, &install("ubuntu-24.04")).await.unwrap();
    let before = engine.read_server(NODE1).await.unwrap();
    let power_before = engine.read_power_status(NODE1).await.unwrap();

    let err = engine
        .os_install(NODE1, &install("rockylinux-9"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::conflict(ResourceKind::Server, NODE1));

    let err = engine
        .power_control(NODE1, &power(PowerOperation::Off))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");

    assert_eq!(engine.read_server(NODE1).await.unwrap(), before);
    assert_eq!(engine.read_power_status(NODE1).await.unwrap(), power_before);

    // Once the install completes the server accepts actions again.
    engine.wait_for_actions().await;
    engine
        .power_control(NODE1, &power(PowerOperation::Off))
        .await
        .unwrap();
    engine.wait_for_actions().await;
    assert_eq!(
        engine.read_power_status(NODE1).await.unwrap().status,
        PowerState::Off
    );
}

#[tokio::test]
async fn test_power_on_and_reset_settle_on() {
    let engine = engine();

    for operation in [PowerOperation::On, PowerOperation::Reset] {
        let before = engine
            .read_server(NODE2)
            .await
            .unwrap()
            .cached_power_status
            .unwrap();

        engine.power_control(NODE2, &power(operation)).await.unwrap();
        engine.wait_for_actions().await;

        assert_eq!(
            engine.read_power_status(NODE2).await.unwrap().status,
            PowerState::On
        );
        let cached = engine
            .read_server(NODE2)
            .await
            .unwrap()
            .cached_power_status
            .unwrap();
        assert_eq!(cached.status, PowerState::On);
        assert!(cached.stored > before.stored);
    }
}

#[tokio::test]
async fn test_soft_settles_off() {
    let engine = engine();
    engine
        .power_control(NODE1, &power(PowerOperation::Soft))
        .await
        .unwrap();
    engine.wait_for_actions().await;

    let server = engine.read_server(NODE1).await.unwrap();
    assert_eq!(server.cached_power_status.unwrap().status, PowerState::Off);
    assert_eq!(
        engine.read_power_status(NODE1).await.unwrap().status,
        PowerState::Off
    );
}

// =============================================================================
// Port configuration
// =============================================================================

#[tokio::test]
async fn test_lacp_bonding_port_counts() {
    let engine = engine();

    let channel = engine
        .configure_bonding(NODE1, NODE1_CHANNEL, &bonding(BondingType::Lacp, None))
        .await
        .unwrap();
    assert_eq!(channel.ports.len(), 1);
    assert_eq!(channel.bonding_type, BondingType::Lacp);
    assert!(!channel.locked);

    let channel = engine
        .configure_bonding(
            NODE1,
            NODE1_CHANNEL,
            &bonding(BondingType::Lacp, Some(&["uplink"])),
        )
        .await
        .unwrap();
    assert_eq!(channel.ports.len(), 1);
    let port = engine.read_port(NODE1, channel.ports[0]).await.unwrap();
    assert_eq!(port.nickname, "uplink");
    assert_eq!(port.port_channel_id, Some(NODE1_CHANNEL));

    let err = engine
        .configure_bonding(
            NODE1,
            NODE1_CHANNEL,
            &bonding(BondingType::Lacp, Some(&["a", "b"])),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    assert_eq!(
        engine.read_port_channel(NODE1, NODE1_CHANNEL).await.unwrap(),
        channel
    );
}

#[tokio::test]
async fn test_single_bonding_port_counts() {
    let engine = engine();

    let channel = engine
        .configure_bonding(
            NODE1,
            NODE1_CHANNEL,
            &bonding(BondingType::Single, Some(&["left", "right"])),
        )
        .await
        .unwrap();
    assert_eq!(channel.ports.len(), 2);

    let server = engine.read_server(NODE1).await.unwrap();
    let names: Vec<_> = server.ports.iter().map(|p| p.nickname.as_str()).collect();
    assert_eq!(names, ["left", "right"]);
    let ids: Vec<_> = server.ports.iter().map(|p| p.port_id).collect();
    assert_eq!(ids, channel.ports);
    assert!(server.ports.iter().all(|p| p.enabled));

    let err = engine
        .configure_bonding(
            NODE1,
            NODE1_CHANNEL,
            &bonding(BondingType::Single, Some(&["only"])),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}

#[tokio::test]
async fn test_bonding_replaces_ports_with_fresh_ids() {
    let engine = engine();
    let first = engine
        .configure_bonding(NODE1, NODE1_CHANNEL, &bonding(BondingType::Single, None))
        .await
        .unwrap();
    let second = engine
        .configure_bonding(NODE1, NODE1_CHANNEL, &bonding(BondingType::Single, None))
        .await
        .unwrap();

    assert!(first.ports.iter().all(|id| *id > 1003));
    assert!(second.ports.iter().all(|id| !first.ports.contains(id)));
    assert!(engine.read_port(NODE1, first.ports[0]).await.is_err());
    assert!(engine.read_port(NODE1, NODE1_PORT).await.is_err());
}

#[tokio::test]
async fn test_unknown_bonding_type_leaves_no_ports() {
    let engine = engine();
    let channel = engine
        .configure_bonding(NODE1, NODE1_CHANNEL, &bonding(BondingType::Unknown, None))
        .await
        .unwrap();
    assert!(channel.ports.is_empty());
    assert!(engine.read_server(NODE1).await.unwrap().ports.is_empty());
}

#[tokio::test]
async fn test_common_subnet_resets_private_networks() {
    let engine = engine();
    engine
        .assign_network(NODE1, NODE1_PORT, &private_networks(&["300000000001"]))
        .await
        .unwrap();

    let port = engine
        .assign_network(
            NODE1,
            NODE1_PORT,
            &AssignNetworkParameter {
                internet_type: Some(InternetType::CommonSubnet),
                mode: Some(PortMode::Access),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let internet = port.internet.unwrap();
    assert_eq!(internet.subnet_type, InternetSubnetType::CommonSubnet);
    assert_eq!(internet.network_address, "203.0.113.0");
    assert_eq!(internet.prefix_length, 24);
    assert_eq!(port.global_bandwidth_mbps, Some(100));
    assert!(port.private_networks.is_empty());
    assert_eq!(port.local_bandwidth_mbps, None);
    assert_eq!(port.mode, Some(PortMode::Access));
}

#[tokio::test]
async fn test_private_network_bandwidth_is_fixed() {
    let engine = engine();

    let port = engine
        .assign_network(NODE1, NODE1_PORT, &private_networks(&["300000000002"]))
        .await
        .unwrap();
    assert_eq!(port.private_networks.len(), 1);
    assert_eq!(port.local_bandwidth_mbps, Some(1000));
    assert!(port.internet.is_none());

    let port = engine
        .assign_network(
            NODE1,
            NODE1_PORT,
            &private_networks(&["300000000001", "300000000002", "300000000003"]),
        )
        .await
        .unwrap();
    assert_eq!(port.private_networks.len(), 3);
    assert_eq!(port.local_bandwidth_mbps, Some(1000));
    assert_eq!(port.private_networks[2].nickname, "private-network-3");
}

#[tokio::test]
async fn test_unknown_dedicated_subnet_leaves_port_reset() {
    let engine = engine();
    engine
        .assign_network(
            NODE1,
            NODE1_PORT,
            &AssignNetworkParameter {
                internet_type: Some(InternetType::DedicatedSubnet),
                dedicated_subnet_id: Some(DEDICATED_SUBNET.to_string()),
                mode: Some(PortMode::Trunk),
                private_network_ids: Some(vec!["300000000001".to_string()]),
            },
        )
        .await
        .unwrap();

    let err = engine
        .assign_network(
            NODE1,
            NODE1_PORT,
            &AssignNetworkParameter {
                internet_type: Some(InternetType::DedicatedSubnet),
                dedicated_subnet_id: Some("299999999999".to_string()),
                mode: Some(PortMode::Trunk),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    assert!(err.to_string().contains("299999999999"));

    let port = engine.read_port(NODE1, NODE1_PORT).await.unwrap();
    assert!(port.internet.is_none());
    assert!(port.mode.is_none());
    assert!(port.private_networks.is_empty());
    assert_eq!(port.global_bandwidth_mbps, None);
    assert_eq!(port.local_bandwidth_mbps, None);
}

#[tokio::test]
async fn test_rename_and_enable_port() {
    let engine = engine();
    let port = engine
        .update_port(
            NODE1,
            NODE1_PORT,
            &UpdateServerPortParameter {
                nickname: "public".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(port.nickname, "public");

    let port = engine
        .enable_port(NODE1, NODE1_PORT, &EnableServerPortParameter { enable: false })
        .await
        .unwrap();
    assert!(!port.enabled);

    let stored = engine.read_port(NODE1, NODE1_PORT).await.unwrap();
    assert_eq!(stored.nickname, "public");
    assert!(!stored.enabled);
    let server = engine.read_server(NODE1).await.unwrap();
    assert_eq!(server.ports[0], stored);
}

#[tokio::test]
async fn test_traffic_graph_is_fixed() {
    let graph = engine()
        .read_port_traffic(NODE1, NODE1_PORT, &ReadServerTrafficByPortParams::default())
        .await
        .unwrap();
    for series in [&graph.receive, &graph.transmit] {
        assert_eq!(series.len(), 2);
        assert!((series[0].value - 1.0).abs() < f64::EPSILON);
        assert!((series[1].value - 2.0).abs() < f64::EPSILON);
        assert!(series[1].timestamp < series[0].timestamp);
    }
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_assignment() {
    let engine = Arc::new(engine());
    let mut set = JoinSet::new();

    let writer = Arc::clone(&engine);
    set.spawn(async move {
        for i in 0..200 {
            let params = if i % 2 == 0 {
                AssignNetworkParameter {
                    internet_type: Some(InternetType::CommonSubnet),
                    ..Default::default()
                }
            } else {
                AssignNetworkParameter {
                    internet_type: Some(InternetType::DedicatedSubnet),
                    dedicated_subnet_id: Some(DEDICATED_SUBNET.to_string()),
                    private_network_ids: Some(vec!["300000000001".to_string()]),
                    ..Default::default()
                }
            };
            writer
                .assign_network(NODE1, NODE1_PORT, &params)
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }
    });

    for _ in 0..4 {
        let reader = Arc::clone(&engine);
        set.spawn(async move {
            for _ in 0..200 {
                let port = reader.read_port(NODE1, NODE1_PORT).await.unwrap();
                match port.internet.as_ref().map(|i| i.subnet_type) {
                    Some(InternetSubnetType::CommonSubnet) => {
                        assert_eq!(port.global_bandwidth_mbps, Some(100));
                        assert!(port.private_networks.is_empty());
                        assert_eq!(port.local_bandwidth_mbps, None);
                    }
                    Some(InternetSubnetType::DedicatedSubnet) => {
                        assert_eq!(port.global_bandwidth_mbps, Some(500));
                        assert_eq!(port.private_networks.len(), 1);
                        assert_eq!(port.local_bandwidth_mbps, Some(1000));
                    }
                    None => {
                        assert_eq!(port.global_bandwidth_mbps, None);
                        assert!(port.private_networks.is_empty());
                    }
                }
                tokio::task::yield_now().await;
            }
        });
    }

    while let Some(result) = set.join_next().await {
        result.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_power_status_settles_atomically() {
    let engine = engine();
    let mut set = JoinSet::new();

    for i in 0..50 {
        let operation = if i % 2 == 0 {
            PowerOperation::On
        } else {
            PowerOperation::Off
        };
        engine.power_control(NODE2, &power(operation)).await.unwrap();

        let reader = engine.clone();
        set.spawn(async move {
            let store = reader.shared().await;
            let record = store.server(NODE2).unwrap();
            assert_eq!(
                Some(record.power_status.status),
                record.server.cached_power_status.as_ref().map(|c| c.status)
            );
        });
    }

    while let Some(result) = set.join_next().await {
        result.unwrap();
    }
    engine.wait_for_actions().await;
}

#[tokio::test]
async fn test_unknown_mode_is_rejected() {
    let engine = engine();
    engine
        .assign_network(NODE1, NODE1_PORT, &private_networks(&["300000000001"]))
        .await
        .unwrap();

    let err = engine
        .assign_network(
            NODE1,
            NODE1_PORT,
            &AssignNetworkParameter {
                mode: Some(PortMode::Unknown),
                private_network_ids: Some(vec!["300000000002".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::invalid(ResourceKind::Port, NODE1_PORT, "invalid mode")
    );

    let port = engine.read_port(NODE1, NODE1_PORT).await.unwrap();
    assert!(port.mode.is_none());
    assert!(port.private_networks.is_empty());
    assert_eq!(port.local_bandwidth_mbps, None);
}
