use common::{Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CartService, CatalogService, OrderService, ProductInput, Registration, ShippingInfo,
    UserLocks, UserService,
};
use store::InMemoryStore;

struct Bench {
    carts: CartService<InMemoryStore>,
    orders: OrderService<InMemoryStore>,
    user: UserId,
    products: Vec<ProductId>,
}

async fn setup(lines: usize) -> Bench {
    let store = InMemoryStore::new();
    let locks = UserLocks::new();
    let catalog = CatalogService::new(store.clone());
    let users = UserService::new(store.clone());

    let user = users
        .register(Registration {
            email: "bench@example.com".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;

    let mut products = Vec::with_capacity(lines);
    for i in 0..lines {
        let product = catalog
            .create_product(ProductInput {
                name: format!("Product {i}"),
                price: Money::from_cents(1000 + i as i64),
                stock_quantity: u32::MAX / 2,
                ..Default::default()
            })
            .await
            .unwrap();
        products.push(product.id);
    }

    Bench {
        carts: CartService::new(store.clone(), locks.clone()),
        orders: OrderService::new(store, locks),
        user,
        products,
    }
}

fn bench_add_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bench = rt.block_on(setup(1));

    c.bench_function("cart/add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                bench
                    .carts
                    .add_item(bench.user, bench.products[0], 1)
                    .await
                    .unwrap();
                bench.carts.clear_cart(bench.user).await.unwrap();
            });
        });
    });
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for lines in [1, 10] {
        let bench = rt.block_on(setup(lines));

        c.bench_function(&format!("order/checkout_{lines}_lines"), |b| {
            b.iter(|| {
                rt.block_on(async {
                    for &product in &bench.products {
                        bench.carts.add_item(bench.user, product, 1).await.unwrap();
                    }
                    bench
                        .orders
                        .create_order(bench.user, ShippingInfo::default())
                        .await
                        .unwrap();
                });
            });
        });
    }
}

fn bench_checkout_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bench = rt.block_on(setup(5));

    c.bench_function("order/checkout_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                for &product in &bench.products {
                    bench.carts.add_item(bench.user, product, 2).await.unwrap();
                }
                let order = bench
                    .orders
                    .create_order(bench.user, ShippingInfo::default())
                    .await
                    .unwrap();
                bench
                    .orders
                    .cancel_order(bench.user, order.id)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_add_item,
    bench_checkout,
    bench_checkout_and_cancel
);
criterion_main!(benches);
