//! End-to-end tests for the client facade against the in-process hub.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use chrono::Local;
use rstest::rstest;

use crate::{
    ClientError, ClientOptions, LogHubClient,
    test_utils::{MockHub, ServerEvent},
};

const WAIT: Duration = Duration::from_secs(2);

fn make_client(hub: &MockHub) -> LogHubClient {
    LogHubClient::connect(
        "127.0.0.1",
        hub.addr.port(),
        ClientOptions {
            max_connections: 2,
            ..ClientOptions::default()
        },
    )
    .expect("connect client")
}

/// Wait until the hub has parsed a full write batch.
fn wait_for_batch(hub: &MockHub) {
    loop {
        match hub.events.recv_timeout(WAIT) {
            Ok(ServerEvent::BatchEnd) => return,
            Ok(_) => continue,
            Err(_) => panic!("write batch never reached the hub"),
        }
    }
}

/// Wait until the hub has applied a truncate directive.
fn wait_for_directive(hub: &MockHub) {
    loop {
        match hub.events.recv_timeout(WAIT) {
            Ok(ServerEvent::Directive(_)) => return,
            Ok(_) => continue,
            Err(_) => panic!("truncate directive never reached the hub"),
        }
    }
}

#[rstest]
fn written_entries_can_be_read_back() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);

    client.write(1, "Test", "hello").expect("write");
    client.flush();
    wait_for_batch(&hub);

    let now = Local::now();
    let entries: Vec<_> = client
        .read(now - chrono::Duration::seconds(5), now, 0, 10, &["Test"])
        .expect("read")
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "hello");
    assert_eq!(entries[0].source, "Test");
    assert_eq!(entries[0].severity, 1);

    client.close();
}

#[rstest]
fn truncate_removes_prior_entries() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);

    client.write(1, "Test", "hello").expect("write");
    client.flush();
    wait_for_batch(&hub);

    // Step past the entry's millisecond stamp so it falls below the limit.
    thread::sleep(Duration::from_millis(10));
    client.truncate(Local::now(), &[]).expect("truncate");
    wait_for_directive(&hub);

    let now = Local::now();
    let entries: Vec<_> = client
        .read(now - chrono::Duration::seconds(5), now, 0, 10, &["Test"])
        .expect("read")
        .collect();
    assert!(entries.is_empty(), "truncated entries must be gone");

    client.close();
}

#[rstest]
fn read_filters_by_source() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);

    client.write(1, "Alpha", "from alpha").expect("write");
    client.write(1, "Beta", "from beta").expect("write");
    client.flush();
    wait_for_batch(&hub);

    let now = Local::now();
    let from = now - chrono::Duration::seconds(5);
    let entries: Vec<_> = client
        .read(from, now, 0, 10, &["Alpha"])
        .expect("read")
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "from alpha");

    // No filter matches every source.
    let entries: Vec<_> = client.read(from, now, 0, 10, &[]).expect("read").collect();
    assert_eq!(entries.len(), 2);

    client.close();
}

#[rstest]
fn stat_streams_log_information() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);

    let infos: Vec<_> = client.stat().expect("stat").collect();
    assert_eq!(infos.len(), 1);
    assert!(!infos[0].address.is_empty());
    assert!(infos[0].limit > 0);

    client.close();
}

#[rstest]
#[case(-1)]
#[case(256)]
fn write_rejects_out_of_range_severity(#[case] severity: i32) {
    let hub = MockHub::start();
    let mut client = make_client(&hub);
    let err = client
        .write(severity, "Test", "message")
        .expect_err("severity must be rejected");
    assert!(matches!(err, ClientError::Validation(_)));
    client.close();
}

#[rstest]
#[case(0)]
#[case(255)]
fn write_accepts_boundary_severities(#[case] severity: i32) {
    let hub = MockHub::start();
    let mut client = make_client(&hub);
    client
        .write(severity, "Test", "message")
        .expect("boundary severities are valid");
    client.close();
}

#[rstest]
fn write_rejects_empty_source_and_message() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);
    assert!(matches!(
        client.write(1, "", "message"),
        Err(ClientError::Validation(_))
    ));
    assert!(matches!(
        client.write(1, "Test", ""),
        Err(ClientError::Validation(_))
    ));
    client.close();
}

#[rstest]
fn connect_validates_its_arguments() {
    assert!(matches!(
        LogHubClient::connect("", 10001, ClientOptions::default()),
        Err(ClientError::Validation(_))
    ));
    assert!(matches!(
        LogHubClient::connect("localhost", 0, ClientOptions::default()),
        Err(ClientError::Validation(_))
    ));
    let options = ClientOptions {
        max_connections: 0,
        ..ClientOptions::default()
    };
    assert!(matches!(
        LogHubClient::connect("localhost", 10001, options),
        Err(ClientError::Validation(_))
    ));
}

#[rstest]
fn operations_after_close_fail_immediately() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);
    client.close();
    client.close();

    assert!(matches!(
        client.write(1, "Test", "message"),
        Err(ClientError::Shutdown)
    ));
    let now = Local::now();
    assert!(matches!(
        client.read(now, now, 0, 10, &[]),
        Err(ClientError::Shutdown)
    ));
    assert!(matches!(client.stat(), Err(ClientError::Shutdown)));
    assert!(matches!(
        client.truncate(now, &[]),
        Err(ClientError::Shutdown)
    ));
}

#[rstest]
fn close_flushes_pending_writes() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);

    client.write(1, "Test", "flushed on close").expect("write");
    client.close();

    wait_for_batch(&hub);
    let stored = hub.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].msg, "flushed on close");
}

#[rstest]
fn mid_stream_failure_ends_the_sequence_and_reports() {
    // A raw server that sends a partial frame and dies mid-stream.
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                // Consume the request up to its terminating empty frame,
                // which reads as two consecutive terminator bytes.
                let mut byte = [0u8; 1];
                let mut prev_terminator = false;
                loop {
                    match stream.read(&mut byte) {
                        Ok(1) if byte[0] == 0 => {
                            if prev_terminator {
                                break;
                            }
                            prev_terminator = true;
                        }
                        Ok(1) => prev_terminator = false,
                        _ => return,
                    }
                }
                // Then break off inside a response frame.
                let _ = stream.write_all(b"{\"Ts\":1");
                drop(stream);
            });
        }
    });

    let mut client = LogHubClient::connect("127.0.0.1", addr.port(), ClientOptions::default())
        .expect("connect client");

    let now = Local::now();
    let entries: Vec<_> = client
        .read(now - chrono::Duration::seconds(5), now, 0, 10, &[])
        .expect("read")
        .collect();
    assert!(
        entries.is_empty(),
        "the sequence must end early without yielding entries",
    );
    let err = client
        .error_events()
        .next_timeout(WAIT)
        .expect("failure must be reported out-of-band");
    assert!(matches!(err, ClientError::Connection(_)));

    client.close();
}

#[rstest]
fn dropping_a_result_iterator_leaves_the_client_usable() {
    let hub = MockHub::start();
    let mut client = make_client(&hub);

    for i in 0..3 {
        client.write(1, "Test", &format!("entry {i}")).expect("write");
    }
    client.flush();
    wait_for_batch(&hub);

    let now = Local::now();
    let from = now - chrono::Duration::seconds(5);
    let mut entries = client.read(from, now, 0, 10, &[]).expect("read");
    let first = entries.next().expect("one entry");
    assert_eq!(first.message, "entry 0");
    drop(entries);

    // Whatever happened to that connection, the client still serves.
    let infos: Vec<_> = client.stat().expect("stat").collect();
    assert_eq!(infos.len(), 1);

    client.close();
}
