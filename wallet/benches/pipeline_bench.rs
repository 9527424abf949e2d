// Signing pipeline benchmarks for the Vela wallet.
//
// Covers manifest address analysis at growing manifest sizes and the
// notarization step (signature checks, notary signature, compilation).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vela_wallet::config::{PipelineConfig, NETWORK_ID_STOKENET};
use vela_wallet::crypto::Keypair;
use vela_wallet::manifest::{
    addresses_requiring_auth, involved_addresses, Amount, EntityAddress, ManifestBuilder,
    TransactionManifest,
};
use vela_wallet::transaction::{notarize, HeaderBuilder, TransactionIntent};

/// A manifest withdrawing from `n` distinct accounts into one.
fn transfer_manifest(n: usize) -> TransactionManifest {
    let xrd = EntityAddress::new("resource_tdx_2_1xrd");
    let mut builder = ManifestBuilder::new();
    for i in 0..n {
        let account = EntityAddress::new(format!("account_tdx_2_1sender{i}"));
        builder = builder.withdraw(&account, &xrd, Amount::from_whole(1));
    }
    builder
        .deposit_batch(&EntityAddress::new("account_tdx_2_1receiver"))
        .build()
}

fn bench_address_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest/analysis");

    for n in [1usize, 10, 100] {
        let manifest = transfer_manifest(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("involved", n), &manifest, |b, m| {
            b.iter(|| involved_addresses(m));
        });
        group.bench_with_input(BenchmarkId::new("requiring_auth", n), &manifest, |b, m| {
            b.iter(|| addresses_requiring_auth(m));
        });
    }

    group.finish();
}

fn bench_notarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction/notarize");
    let config = PipelineConfig::default();

    for signers in [1usize, 4, 16] {
        let notary = Keypair::generate();
        let keys: Vec<Keypair> = (0..signers).map(|_| Keypair::generate()).collect();
        let header = HeaderBuilder::new(NETWORK_ID_STOKENET, &config)
            .build_with_nonce(1_000, 7, notary.public_key())
            .expect("valid header");
        let intent = TransactionIntent::new(header, transfer_manifest(signers), None);
        let hash = intent.hash().expect("intent hash");
        let signatures: Vec<_> = keys
            .iter()
            .map(|kp| kp.sign_with_public_key(hash.as_bytes()))
            .collect();

        group.throughput(Throughput::Elements(signers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(signers), &signers, |b, _| {
            b.iter(|| notarize(intent.clone(), signatures.clone(), &notary).expect("notarized"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_address_analysis, bench_notarize);
criterion_main!(benches);
