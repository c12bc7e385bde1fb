use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sanger_con::consensus::ConsensusBuilder;
use sanger_con::consensus_config::{ConsensusAlgorithm, ConsensusSettingsBuilder};
use sanger_con::example_gen::generate_read_pair;

pub fn bench_consensus(c: &mut Criterion) {
    let seq_lens = [500, 1000];
    let error_rates = [0.0, 0.01, 0.02];
    let algorithms = [ConsensusAlgorithm::Bayesian, ConsensusAlgorithm::Legacy];

    let mut benchmark_group = c.benchmark_group("consensus-group");
    benchmark_group.sample_size(10);

    for &sl in seq_lens.iter() {
        // reads cover 80% of the truth each, so they overlap in the middle
        let read_len = sl * 4 / 5;
        for &algorithm in algorithms.iter() {
            let settings = ConsensusSettingsBuilder::default()
                .consensus_algorithm(algorithm)
                .trim_primers(true)
                .forward_primer("ATGAAGCTT")
                .reverse_primer("CCGTACATTAA")
                .build().unwrap();
            for &er in error_rates.iter() {
                let (_truth, forward, reverse) = generate_read_pair(sl, read_len, er, 0).unwrap();
                let test_label = format!("consensus_{algorithm}_{sl}x{read_len}_{er}");
                benchmark_group.bench_function(&test_label, |b| b.iter(|| {
                    black_box({
                        let builder = ConsensusBuilder::new(vec![forward.clone(), reverse.clone()], settings.clone()).unwrap();
                        builder.compact_consensus()
                    });
                }));
            }
        }
    }

    benchmark_group.finish();
}

criterion_group!(benches, bench_consensus);
criterion_main!(benches);
