use mjpeg_extract::{
    corpus::{self, Case, Recorder},
    Error, StopSignal, StreamConfig,
};
use mjpeg_extract_tokio::{AsyncConnect, AsyncStreamingClient, SessionEnd, TcpConnector};
use tokio::{
    io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream},
    net::TcpListener,
    task::JoinHandle,
};

use std::{collections::VecDeque, time::Duration};

/// Plays the server side of a duplex pipe: reads the request, then sends
/// `stream` and hangs up. Returns the request.
fn serve(mut server: DuplexStream, stream: Vec<u8>) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut request = Vec::new();
        let mut buf = [0u8; 64];
        while !request.ends_with(b"\r\n\r\n") {
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up before finishing its request");
            request.extend_from_slice(&buf[..n]);
        }
        server.write_all(&stream).await.unwrap();
        request
    })
}

/// Hands out queued connections, then asks for a stop and refuses to connect.
struct Scripted {
    streams: VecDeque<Vec<u8>>,
    servers: Vec<JoinHandle<Vec<u8>>>,
    attempts: usize,
    stop: StopSignal,
}

impl AsyncConnect for Scripted {
    type Stream = DuplexStream;

    async fn connect(&mut self, config: &StreamConfig) -> Result<DuplexStream, Error> {
        self.attempts += 1;
        match self.streams.pop_front() {
            Some(stream) => {
                let (client, server) = duplex(512);
                self.servers.push(serve(server, stream));
                Ok(client)
            }
            None => {
                self.stop.request_stop();
                Err(Error::Connect {
                    authority: config.authority(),
                })
            }
        }
    }
}

fn fast_config() -> StreamConfig {
    StreamConfig::default()
        .with_retry_delay(Duration::from_millis(1))
        .with_reconnect_delay(Duration::from_millis(1))
}

fn find_case(name: &str) -> Case {
    corpus::test_cases()
        .into_iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("case {name} should exist"))
}

fn check_images(case: &Case, rec: &Recorder) {
    assert_eq!(rec.images.len(), case.images.len(), "{}", case.name);
    assert!(rec.images == case.images, "{}: images differ", case.name);
    assert_eq!(rec.boundary_errors, case.boundary_errors, "{}", case.name);
}

#[tokio::test]
async fn corpus_over_pipes() {
    corpus::install_test_subscriber();

    for case in corpus::test_cases() {
        tracing::info!("============ testing {}", case.name);
        // a tiny pipe chops the stream in tiny reads
        for pipe_size in [64 * 1024, 7] {
            let mut client = AsyncStreamingClient::with_connector(
                fast_config(),
                TcpConnector,
                Recorder::default(),
            )
            .unwrap();
            let (io, server) = duplex(pipe_size);
            let server = serve(server, case.stream.clone());

            let end = client.stream_from(io).await.unwrap();
            assert_eq!(end, SessionEnd::Closed);
            assert_eq!(server.await.unwrap(), b"GET /?action=stream HTTP/1.0\r\n\r\n");
            check_images(&case, client.sink());
        }
    }
}

#[tokio::test]
async fn every_connection_relearns_the_boundary() {
    corpus::install_test_subscriber();

    let first = find_case("boundary-not-on-last-header-line.mjpeg");
    let second = find_case("boundary-with-parameters.mjpeg");

    let stop = StopSignal::new();
    let connector = Scripted {
        streams: [first.stream.clone(), second.stream.clone()].into(),
        servers: vec![],
        attempts: 0,
        stop: stop.clone(),
    };
    let mut client =
        AsyncStreamingClient::with_connector(fast_config(), connector, Recorder::default())
            .unwrap()
            .with_stop_signal(stop);
    client.run().await;

    assert_eq!(client.connector().attempts, 3);
    assert_eq!(client.extractor().boundary(), b"myboundary");
    let rec = client.into_sink();
    let expected: Vec<Vec<u8>> = first
        .images
        .iter()
        .chain(second.images.iter())
        .cloned()
        .collect();
    assert!(rec.images == expected, "images differ");
}

#[tokio::test]
async fn stop_interrupts_a_long_pause() {
    corpus::install_test_subscriber();

    let stop = StopSignal::new();
    let connector = Scripted {
        streams: VecDeque::new(),
        servers: vec![],
        attempts: 0,
        stop: StopSignal::new(),
    };
    let config = fast_config().with_retry_delay(Duration::from_secs(3600));
    let mut client = AsyncStreamingClient::with_connector(config, connector, Recorder::default())
        .unwrap()
        .with_stop_signal(stop.clone());

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.request_stop();
    });
    client.run().await;
    stopper.await.unwrap();
    assert_eq!(client.connector().attempts, 1);
}

#[tokio::test]
async fn stream_over_tcp() {
    corpus::install_test_subscriber();

    let case = find_case("large-frames.mjpeg");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let stream = case.stream.clone();
    let server = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 64];
        while !request.ends_with(b"\r\n\r\n") {
            let n = conn.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up before finishing its request");
            request.extend_from_slice(&buf[..n]);
        }
        conn.write_all(&stream).await.unwrap();
        request
    });

    let config = fast_config().with_host("127.0.0.1").with_port(port);
    let mut client = AsyncStreamingClient::new(config, Recorder::default()).unwrap();
    assert_eq!(client.stream_once().await.unwrap(), SessionEnd::Closed);

    assert_eq!(server.await.unwrap(), b"GET /?action=stream HTTP/1.0\r\n\r\n");
    check_images(&case, client.sink());
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    corpus::install_test_subscriber();

    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = fast_config().with_host("127.0.0.1").with_port(port);
    let err = TcpConnector.connect(&config).await.unwrap_err();
    assert!(err.is_unreachable(), "unexpected error: {err}");
}
