use std::sync::Arc;

use nomad::{
    NomadErr,
    cluster::{Cluster, LocalState},
    storage::{COLUMN_HOME, ColumnSegment, ShardSnapshot},
    tokens::{LoadBalancer, TokenQueue},
};

struct Group {
    clusters: Vec<Cluster>,
    queues: Vec<TokenQueue>,
    segment: Arc<ColumnSegment>,
}

async fn group(world: usize, items: usize, width: usize) -> Group {
    let segment = Arc::new(ColumnSegment::zeroed(items, width));
    let mut states = Vec::new();
    let mut queues = Vec::new();

    for rank in 0..world {
        let hosted = (rank == COLUMN_HOME).then(|| Arc::clone(&segment));
        let (state, queue) = LocalState::new(rank, world, hosted);
        states.push(state);
        queues.push(queue);
    }

    let clusters = Cluster::local(states).await.unwrap();

    Group {
        clusters,
        queues,
        segment,
    }
}

async fn shutdown(clusters: Vec<Cluster>) {
    let tasks: Vec<_> = clusters
        .into_iter()
        .map(|cluster| tokio::spawn(cluster.shutdown()))
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_put_is_visible_to_everyone() {
    let Group {
        clusters, segment, ..
    } = group(3, 4, 2).await;

    let far = clusters[2].segment(COLUMN_HOME).unwrap().resolve().await.unwrap();
    assert_eq!(far.len(), 8);

    far.put(5, 2.5).await.unwrap();
    far.write(0, &[1., -1.]).await.unwrap();

    assert_eq!(segment.get(5).unwrap(), 2.5);

    let near = clusters[0].segment(COLUMN_HOME).unwrap().resolve().await.unwrap();
    let mut out = [0.; 2];
    near.read(0, &mut out).await.unwrap();
    assert_eq!(out, [1., -1.]);

    let other = clusters[1].segment(COLUMN_HOME).unwrap().resolve().await.unwrap();
    assert_eq!(other.get(5).await.unwrap(), 2.5);

    shutdown(clusters).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn segment_without_host_fails_to_resolve() {
    let Group { clusters, .. } = group(2, 2, 1).await;

    let err = clusters[0].segment(1).unwrap().resolve().await.unwrap_err();
    assert!(matches!(err, NomadErr::AddressResolution { rank: 1, .. }));

    let err = clusters[1].segment(1).unwrap().resolve().await.unwrap_err();
    assert!(matches!(err, NomadErr::AddressResolution { rank: 1, .. }));

    assert!(clusters[0].segment(5).is_err());

    shutdown(clusters).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_bounds_remote_access_is_reported() {
    let Group { clusters, .. } = group(2, 2, 2).await;

    let handle = clusters[1].segment(COLUMN_HOME).unwrap().resolve().await.unwrap();
    let err = handle.write(3, &[1., 2.]).await.unwrap_err();

    assert!(matches!(
        err,
        NomadErr::RemoteAccess {
            rank: COLUMN_HOME,
            op: "put",
            ..
        }
    ));

    shutdown(clusters).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn transfers_land_in_the_destination_queue() {
    let Group {
        clusters,
        mut queues,
        ..
    } = group(3, 5, 1).await;

    clusters[0].transfer(4, 1).await.unwrap();
    clusters[2].transfer(2, 1).await.unwrap();
    clusters[1].transfer(0, 1).await.unwrap();

    assert_eq!(clusters[0].queue_depth(1).await.unwrap(), 3);
    assert_eq!(clusters[1].queue_depth(1).await.unwrap(), 3);
    assert_eq!(clusters[2].queue_depth(0).await.unwrap(), 0);

    let mut received: Vec<_> = std::iter::from_fn(|| queues[1].pop_front()).collect();
    received.sort_unstable();
    assert_eq!(received, [0, 2, 4]);
    assert_eq!(clusters[2].queue_depth(1).await.unwrap(), 0);

    shutdown(clusters).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn balancer_picks_the_idle_process() {
    let Group {
        clusters,
        queues: _queues,
        ..
    } = group(3, 6, 1).await;

    for item in 0..3 {
        clusters[1].transfer(item, 0).await.unwrap();
    }
    clusters[0].transfer(3, 2).await.unwrap();

    assert_eq!(LoadBalancer::choose(&clusters[0]).await.unwrap(), 1);
    assert_eq!(LoadBalancer::choose(&clusters[2]).await.unwrap(), 1);

    shutdown(clusters).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn barrier_releases_once_everyone_arrives() {
    let Group { clusters, .. } = group(3, 1, 1).await;

    let tasks: Vec<_> = clusters
        .into_iter()
        .map(|cluster| {
            tokio::spawn(async move {
                cluster.barrier().await.unwrap();
                cluster.barrier().await.unwrap();
                cluster
            })
        })
        .collect();

    let mut clusters = Vec::new();
    for task in tasks {
        clusters.push(task.await.unwrap());
    }

    shutdown(clusters).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn published_shards_can_be_fetched() {
    let Group { clusters, .. } = group(2, 1, 2).await;

    let err = clusters[0].fetch_shard(1, 2).await.unwrap_err();
    assert_eq!(err.operation(), "fetch_shard");

    let snapshot = ShardSnapshot::new(vec![3, 1], 2, vec![0.5, 1.5, 2.5, 3.5]).unwrap();
    clusters[1].publish_shard(snapshot.clone()).unwrap();
    assert!(clusters[1].publish_shard(snapshot.clone()).is_err());

    assert_eq!(clusters[0].fetch_shard(1, 2).await.unwrap(), snapshot);
    assert_eq!(clusters[1].fetch_shard(1, 2).await.unwrap(), snapshot);

    shutdown(clusters).await;
}
