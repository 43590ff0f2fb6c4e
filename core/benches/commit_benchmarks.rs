use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use marketplace_commit::admin::InventoryAdmin;
use marketplace_commit::models::{CartLine, DeliveryMethod, ItemKind, PricedLine, ShopVariant};
use marketplace_commit::payment::MockCardProvider;
use marketplace_commit::pricing::{self, PricingPolicy};
use marketplace_commit::{
  CommerceStore, CommitRequest, MemoryStore, NeutralScorer, OrderCommitter, PaymentGateways, PaymentProviderKind,
  StatusBroadcaster,
};
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

fn priced_lines(count: usize) -> Vec<PricedLine> {
  (0..count)
    .map(|i| PricedLine {
      item_kind: if i % 2 == 0 {
        ItemKind::ShopVariant
      } else {
        ItemKind::MarketplaceListing
      },
      item_id: Uuid::new_v4(),
      source_item_id: Uuid::new_v4(),
      quantity: 1 + (i as u32 % 3),
      unit_price_cents: 999 + i as i64,
      seller_id: None,
    })
    .collect()
}

fn bench_quote(c: &mut Criterion) {
  let mut group = c.benchmark_group("pricing_quote");
  let policy = PricingPolicy::default();
  for size in [1usize, 10, 100] {
    let lines = priced_lines(size);
    group.throughput(Throughput::Elements(size as u64));
    group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
      b.iter(|| pricing::quote(lines, DeliveryMethod::Doorstep, None, &policy));
    });
  }
  group.finish();
}

fn bench_memory_commit(c: &mut Criterion) {
  let rt = Runtime::new().expect("tokio runtime");
  let store = MemoryStore::new();
  let shared: Arc<dyn CommerceStore> = Arc::new(store.clone());
  let card = Arc::new(MockCardProvider::new());
  let committer = OrderCommitter::new(
    shared.clone(),
    PaymentGateways::new().with_provider(card.clone()),
    Arc::new(NeutralScorer),
    StatusBroadcaster::new(),
  );
  let variant = ShopVariant {
    id: Uuid::new_v4(),
    product_id: Uuid::new_v4(),
    size: "L".to_string(),
    price_cents: 1500,
    stock_amt: i64::MAX / 2,
  };
  rt.block_on(InventoryAdmin::new(shared).load_catalog(std::slice::from_ref(&variant), &[], &[]))
    .expect("seed catalog");

  c.bench_function("memory_commit_single_line", |b| {
    b.to_async(&rt).iter(|| {
      let committer = committer.clone();
      let user_id = Uuid::new_v4();
      let payment_ref = card.settle(user_id, 1500, "usd");
      let request = CommitRequest {
        user_id,
        lines: vec![CartLine::variant(variant.id, 1, 1500)],
        delivery_method: DeliveryMethod::Collection,
        voucher_id: None,
        declared_total_cents: None,
        payment_ref,
        provider: PaymentProviderKind::Card,
      };
      async move {
        committer.commit(request).await.expect("commit");
      }
    });
  });
}

criterion_group!(benches, bench_quote, bench_memory_commit);
criterion_main!(benches);
