use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use zkct_primitives::{encrypt, keygen, random_nonzero};
use zkct_sigma::{
    prove_transfer, prove_withdraw, TransferInput, TransferRelation, WithdrawInput,
    WithdrawRelation,
};

fn bench_verify(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::from_seed([9u8; 32]);

    let sender = keygen(&mut rng);
    let recipient = keygen(&mut rng);
    let ct = encrypt(900, &random_nonzero(&mut rng), &sender.pk);

    let transfer_rel = TransferRelation::new(
        &TransferInput {
            sk: sender.sk,
            pk_to: recipient.pk,
            c: ct,
            b: 900,
            b_delta: 250,
            asset_id: 0,
            fee_asset_id: 0,
            fee: 4,
            fee_balance: None,
        },
        &mut rng,
    )
    .expect("transfer relation");
    let transfer = prove_transfer(&transfer_rel, &mut rng).expect("transfer proof");

    let withdraw_rel = WithdrawRelation::new(
        &WithdrawInput {
            sk: sender.sk,
            c: ct,
            b: 900,
            b_delta: 250,
            asset_id: 0,
            receive_addr: b"l1-recipient".to_vec(),
            fee_asset_id: 0,
            fee: 1,
            fee_balance: None,
        },
        &mut rng,
    )
    .expect("withdraw relation");
    let withdraw = prove_withdraw(&withdraw_rel, &mut rng).expect("withdraw proof");

    c.bench_function("verify_transfer", |b| {
        b.iter(|| transfer.verify().expect("verify"))
    });
    c.bench_function("verify_withdraw", |b| {
        b.iter(|| withdraw.verify().expect("verify"))
    });
}

criterion_group!(benches, bench_verify);
criterion_main!(benches);
