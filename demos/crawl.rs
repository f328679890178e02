use frontier::{Config, Order, OrderKind, Target};

#[tokio::main]
async fn main() {
    env_logger::init();

    let seeds = [
        ("https://www.rust-lang.org/", Some((OrderKind::Page, 2.0))),
        ("https://blog.rust-lang.org/feed.xml", Some((OrderKind::Feed, 3.0))),
        ("https://blog.rust-lang.org/", None),
        ("https://docs.rs/", None),
    ];
    let orders = seeds.iter().map(|(url, kind_priority)| {
        let target = Target::parse(url).expect("invalid seed url");
        match kind_priority {
            Some((kind, priority)) => Order::new(target, *kind, *priority),
            None => Order::from(target),
        }
    });

    let engine = match std::env::args().nth(1) {
        Some(path) => {
            let config = Config::from_file(path).expect("invalid config");
            frontier::engine_with_config(config, orders)
        }
        None => frontier::engine(orders),
    }
    .expect("invalid config");
    engine.start().await;

    println!(
        "fetched: {}, failed: {}",
        engine.stats().total_fetched(),
        engine.stats().total_failed()
    );
}
