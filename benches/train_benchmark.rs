use criterion::{black_box, criterion_group, criterion_main, Criterion};
use letter_nn::network::{GraphNetwork, InitConfig, MatrixNetwork, Network, NetworkKind};

fn small_config(kind: NetworkKind) -> InitConfig {
    InitConfig {
        num_inputs: 16,
        num_hidden_layers: 1,
        num_hidden: 8,
        num_outputs: 4,
        kind,
    }
}

fn medium_config(kind: NetworkKind) -> InitConfig {
    InitConfig {
        num_inputs: 64,
        num_hidden_layers: 2,
        num_hidden: 32,
        num_outputs: 26,
        kind,
    }
}

fn ramp(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 / len as f64).collect()
}

fn one_hot(len: usize) -> Vec<f64> {
    let mut res = vec![0.0; len];
    res[0] = 1.0;
    res
}

fn activate(net: &mut dyn Network, input: &[f64], iterations: usize) {
    for _ in 0..iterations {
        net.activate(input).unwrap();
    }
}

fn train(net: &mut dyn Network, input: &[f64], target: &[f64], iterations: usize) {
    for _ in 0..iterations {
        net.activate(input).unwrap();
        net.train(target).unwrap();
    }
}

fn bench_activate(c: &mut Criterion) {
    let mut small_matrix = MatrixNetwork::new(&small_config(NetworkKind::Matrix)).unwrap();
    let mut small_graph = GraphNetwork::new(&small_config(NetworkKind::Graph)).unwrap();
    let mut medium_matrix = MatrixNetwork::new(&medium_config(NetworkKind::Matrix)).unwrap();
    let mut medium_graph = GraphNetwork::new(&medium_config(NetworkKind::Graph)).unwrap();

    let small_input = ramp(16);
    let medium_input = ramp(64);

    c.bench_function("activate matrix small 100 inputs", |b| {
        b.iter(|| activate(&mut small_matrix, black_box(&small_input), 100))
    });
    c.bench_function("activate graph small 100 inputs", |b| {
        b.iter(|| activate(&mut small_graph, black_box(&small_input), 100))
    });

    c.bench_function("activate matrix medium 100 inputs", |b| {
        b.iter(|| activate(&mut medium_matrix, black_box(&medium_input), 100))
    });
    c.bench_function("activate graph medium 100 inputs", |b| {
        b.iter(|| activate(&mut medium_graph, black_box(&medium_input), 100))
    });
}

fn bench_train(c: &mut Criterion) {
    let small_input = ramp(16);
    let small_target = one_hot(4);
    let medium_input = ramp(64);
    let medium_target = one_hot(26);

    c.bench_function("train matrix small 100 steps", |b| {
        let mut net = MatrixNetwork::new(&small_config(NetworkKind::Matrix)).unwrap();
        b.iter(|| train(&mut net, black_box(&small_input), &small_target, 100))
    });
    c.bench_function("train graph small 100 steps", |b| {
        let mut net = GraphNetwork::new(&small_config(NetworkKind::Graph)).unwrap();
        b.iter(|| train(&mut net, black_box(&small_input), &small_target, 100))
    });

    c.bench_function("train matrix medium 100 steps", |b| {
        let mut net = MatrixNetwork::new(&medium_config(NetworkKind::Matrix)).unwrap();
        b.iter(|| train(&mut net, black_box(&medium_input), &medium_target, 100))
    });
    c.bench_function("train graph medium 100 steps", |b| {
        let mut net = GraphNetwork::new(&medium_config(NetworkKind::Graph)).unwrap();
        b.iter(|| train(&mut net, black_box(&medium_input), &medium_target, 100))
    });
}

criterion_group!(benches, bench_activate, bench_train);
criterion_main!(benches);
