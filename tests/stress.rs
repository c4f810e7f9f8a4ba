//! Stress tests for collectd-emitter
//!
//! Run with: cargo test --release stress -- --ignored

use collectd_emitter::*;
use std::time::Instant;

fn client() -> Collectd<MemoryTransport, FixedClock> {
    let config = ClientConfig::new()
        .with_destination("127.0.0.1", 25826)
        .with_hostname("stress-host");
    Collectd::with_parts(config, MemoryTransport::new(), FixedClock::new(1_700_000_000)).unwrap()
}

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_flush() {
    let mut client = client();
    for plugin in 0..100 {
        let instance = client.plugin_instance(&format!("plugin-{}", plugin), "0");
        for series in 0..100u64 {
            instance.add_counter("ops", &format!("series-{}", series), series);
            instance.set_gauge("load", &format!("series-{}", series), series as f64);
        }
    }

    let iterations = 100;
    let start = Instant::now();
    let mut packets = 0;

    for _ in 0..iterations {
        // Gauges are reset by each flush; record them again
        for plugin in 0..100 {
            let instance = client.plugin_instance(&format!("plugin-{}", plugin), "0");
            for series in 0..100u64 {
                instance.set_gauge("load", &format!("series-{}", series), series as f64);
            }
        }
        let report = client.flush();
        assert_eq!(report.metrics_written, 20_000);
        assert_eq!(report.metrics_dropped, 0);
        packets += report.packets;
        client.transport_mut().take_sent();
    }

    let elapsed = start.elapsed();
    let rate = (iterations * 20_000) as f64 / elapsed.as_secs_f64();

    println!("Flushed {} metrics in {} packets in {:?}", iterations * 20_000, packets, elapsed);
    println!("Rate: {:.0} metrics/second", rate);

    assert!(
        rate > 100_000.0,
        "Should flush at least 100k metrics/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_encrypted_roundtrip() {
    let config = ClientConfig::new()
        .with_destination("127.0.0.1", 25826)
        .with_hostname("stress-host")
        .with_security(SecurityLevel::Encrypt, "stress", "hunter2");
    let mut client =
        Collectd::with_parts(config, MemoryTransport::new(), FixedClock::new(0)).unwrap();
    let decoder = Decoder::with_credentials(Credentials::new("stress", "hunter2"));

    let iterations = 1_000;
    let start = Instant::now();

    for i in 0..iterations {
        client.clock().set(i);
        for series in 0..50u64 {
            client
                .plugin_instance("roundtrip", "")
                .add_counter("ops", &format!("{:02}", series), 1u64);
        }
        client.flush();

        for packet in client.transport_mut().take_sent() {
            assert!(packet.bytes.len() <= MAX_PACKET_SIZE);
            let parts = decoder.decode(&packet.bytes).unwrap();
            assert!(parts.contains(&Part::Time(i as u64)));
        }
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Encrypted {} flushes in {:?}", iterations, elapsed);
    println!("Rate: {:.0} flushes/second", rate);

    assert!(
        rate > 1_000.0,
        "Should seal and open at least 1k flushes/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_notifications() {
    let mut client = client();

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let notif = Notification::new(format!("event {}", i))
            .with_severity(Severity::Warning)
            .with_host("")
            .with_plugin("stress");
        assert_eq!(client.send_notification(&notif).unwrap(), Delivery::Sent);
        if i % 1_000 == 0 {
            client.transport_mut().take_sent();
        }
    }

    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Sent {} notifications in {:?}", iterations, elapsed);
    println!("Rate: {:.0} notifications/second", rate);

    assert_eq!(client.stats().notifications_sent, iterations);
    assert!(
        rate > 100_000.0,
        "Should send at least 100k notifications/s, got {:.0}",
        rate
    );
}
