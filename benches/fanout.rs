use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mpc_proxy_client::{
    Aggregator, Delivery, MeowCipher, PartyEndpoint, PartyRecord, ProtocolParameters,
    ProxyTransport, SessionId, TransportError,
};

/// A transport whose proxies answer instantly, so only coordination is measured.
struct Loopback;

impl ProxyTransport for Loopback {
    async fn connect(
        &self,
        endpoint: &PartyEndpoint,
        _params: &ProtocolParameters,
    ) -> Result<SessionId, TransportError> {
        Ok(SessionId::new(endpoint.as_str()))
    }

    async fn check(
        &self,
        _endpoint: &PartyEndpoint,
        _api_root: &str,
        _session: &SessionId,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(
        &self,
        _endpoint: &PartyEndpoint,
        _api_root: &str,
        _session: &SessionId,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn consume(
        &self,
        _endpoint: &PartyEndpoint,
        _api_root: &str,
        _session: &SessionId,
        _wait: Duration,
    ) -> Result<Delivery, TransportError> {
        Ok(Delivery::Payload(vec![0u8; 256]))
    }

    async fn send(
        &self,
        _endpoint: &PartyEndpoint,
        _api_root: &str,
        _session: &SessionId,
        _payload: &[u8],
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

fn parties(n: usize) -> Vec<PartyRecord> {
    (0..n)
        .map(|i| PartyRecord::new(format!("http://party-{}:8080", i)))
        .collect()
}

fn bench_fanout(c: &mut Criterion) {
    let parties = parties(16);
    let mut aggregator = Aggregator::new(Loopback, MeowCipher, ProtocolParameters::new("/api"));
    let inputs: Vec<f64> = (0..64).map(|i| i as f64).collect();

    c.bench_function("connect_all 16 parties", |b| {
        b.iter(|| smol::block_on(aggregator.connect_all(black_box(&parties))).unwrap())
    });
    c.bench_function("send_all 16 parties", |b| {
        b.iter(|| smol::block_on(aggregator.send_all(black_box(&parties), &inputs)).unwrap())
    });
    c.bench_function("consume_all 16 parties", |b| {
        b.iter(|| {
            smol::block_on(aggregator.consume_all(black_box(&parties), Duration::from_millis(10)))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_fanout);
criterion_main!(benches);
