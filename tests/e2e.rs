use std::{
    env, fs,
    net::{SocketAddr, TcpListener},
    process,
};

use nomad::{
    RatingMatrix, TrainConfig,
    matrix::{evaluate, generate_ratings, write_matrix},
    run_local, run_tcp,
};
use rand::{SeedableRng, rngs::StdRng};

const SMALL: &str = "4 3\n5 3 0\n4 0 0\n1 1 0\n0 1 5\n";

fn config(epochs: usize, seed: u64) -> TrainConfig {
    TrainConfig {
        epochs,
        alpha: 0.05,
        seed: Some(seed),
        ..TrainConfig::default()
    }
}

async fn rmse(matrix: &RatingMatrix, world: usize, epochs: usize, seed: u64) -> f64 {
    let reports = run_local(&config(epochs, seed), matrix, world).await.unwrap();
    let prediction = reports[0].prediction.as_ref().unwrap();
    evaluate(prediction, matrix.values()).unwrap().rmse
}

#[tokio::test(flavor = "multi_thread")]
async fn more_epochs_fit_better_on_average() {
    const SEEDS: u64 = 5;
    let matrix = RatingMatrix::parse(SMALL).unwrap();

    let mut short = 0.;
    let mut long = 0.;
    for seed in 0..SEEDS {
        short += rmse(&matrix, 2, 5, seed).await;
        long += rmse(&matrix, 2, 50, seed).await;
    }

    assert!(long < short, "50 epochs: {long}, 5 epochs: {short}");
}

#[tokio::test(flavor = "multi_thread")]
async fn every_token_survives_the_run() {
    let matrix = RatingMatrix::parse(SMALL).unwrap();

    for world in 1..=3 {
        let reports = run_local(&config(40, 7), &matrix, world).await.unwrap();

        assert_eq!(reports.len(), world);
        assert_eq!(reports.iter().map(|r| r.tokens).sum::<usize>(), matrix.cols());
        assert!(reports.iter().map(|r| r.updates).sum::<u64>() > 0);
        assert!(reports.iter().skip(1).all(|r| r.prediction.is_none()));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn output_file_has_the_input_shape() {
    let matrix = RatingMatrix::parse(SMALL).unwrap();
    let reports = run_local(&config(50, 1), &matrix, 2).await.unwrap();
    let prediction = reports[0].prediction.as_ref().unwrap();

    let path = env::temp_dir().join(format!("nomad-e2e-{}.txt", process::id()));
    write_matrix(&path, prediction, 4).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert!(text.starts_with("4 3\n"));
    let written = RatingMatrix::parse(&text).unwrap();
    assert_eq!(written.shape(), (4, 3));
    assert!(written.values().iter().all(|v| v.is_finite()));
}

#[tokio::test(flavor = "multi_thread")]
async fn training_beats_the_initial_factors() {
    let mut rng = StdRng::seed_from_u64(21);
    let matrix = RatingMatrix::new(generate_ratings(30, 20, &mut rng));

    let untrained = rmse(&matrix, 3, 0, 4).await;
    let trained = rmse(&matrix, 3, 300, 4).await;

    assert!(trained < untrained, "trained: {trained}, untrained: {untrained}");
}

fn free_addrs(n: usize) -> Vec<SocketAddr> {
    let listeners: Vec<_> = (0..n)
        .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();

    listeners.iter().map(|l| l.local_addr().unwrap()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn processes_over_tcp() {
    let matrix = RatingMatrix::parse(SMALL).unwrap();
    let peers = free_addrs(2);

    let tasks: Vec<_> = (0..peers.len())
        .map(|rank| {
            let matrix = matrix.clone();
            let peers = peers.clone();
            tokio::spawn(async move { run_tcp(&config(30, 3), &matrix, rank, &peers).await })
        })
        .collect();

    let mut reports = Vec::new();
    for task in tasks {
        reports.push(task.await.unwrap().unwrap());
    }

    assert_eq!(reports.iter().map(|r| r.tokens).sum::<usize>(), 3);
    assert_eq!(reports[0].prediction.as_ref().unwrap().dim(), (4, 3));
    assert!(reports[1].prediction.is_none());
}
