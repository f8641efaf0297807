//! `TcpTransport` against a local listener acting as a broker.

use std::time::Duration;

use cobalt_stomp::{
    AckDirective, AckMode, ConnectOptions, ConnectionState, StompClient, TcpTransport, Transport,
    TransportEvent,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Read from `stream` until a NUL terminated frame has arrived; returns
/// its text.
async fn read_frame(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await.expect("read");
        assert!(n > 0, "peer closed before NUL");
        if byte[0] == 0 {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).expect("utf8")
}

async fn wait_for<T: Transport>(transport: &mut T) -> TransportEvent {
    for _ in 0..200 {
        if let Some(event) = transport.poll() {
            return event;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no transport event within 2s");
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_reports_connect_text_and_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let frame = read_frame(&mut stream).await;
        assert_eq!(frame, "SEND\ndestination:/q\n\nping");
        stream
            .write_all(b"\nMESSAGE\nsubscription:sub-0\n\npong\0\n")
            .await
            .expect("write");
        stream.shutdown().await.expect("shutdown");
    });

    let mut transport = TcpTransport::current();
    transport.open("127.0.0.1", port, "/", false);
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Connected);

    transport.send(b"SEND\ndestination:/q\n\nping\0");
    assert_eq!(
        wait_for(&mut transport).await,
        TransportEvent::Text("MESSAGE\nsubscription:sub-0\n\npong".to_string())
    );
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Disconnected);

    server.await.expect("server task");
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_utf8_frame_is_dropped_and_session_survives() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        stream
            .write_all(b"MESSAGE\nsubscription:sub-0\n\ncaf\xe9\0RECEIPT\nreceipt-id:1\n\n\0")
            .await
            .expect("write");
        // still connected: the client can keep sending
        let frame = read_frame(&mut stream).await;
        assert_eq!(frame, "SEND\ndestination:/q\n\nafter");
    });

    let mut transport = TcpTransport::current();
    transport.open("127.0.0.1", port, "/", false);
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Connected);
    assert_eq!(
        wait_for(&mut transport).await,
        TransportEvent::Text("RECEIPT\nreceipt-id:1\n\n".to_string())
    );

    transport.send(b"SEND\ndestination:/q\n\nafter\0");
    server.await.expect("server task");
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_reports_disconnected_once_and_peer_sees_eof() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.expect("read");
        assert_eq!(n, 0, "expected EOF after close");
    });

    let mut transport = TcpTransport::current();
    transport.open("127.0.0.1", port, "/", false);
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Connected);

    transport.close();
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Disconnected);
    server.await.expect("server task");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.poll(), None);

    // sending after close is dropped without a new event
    transport.send(b"SEND\n\n\0");
    assert_eq!(transport.poll(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_frame_drops_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let _ = stream.write_all(&[b'x'; 64]).await;
        let mut buf = [0u8; 16];
        let _ = stream.read(&mut buf).await;
    });

    let mut transport = TcpTransport::current().with_max_frame_len(32);
    transport.open("127.0.0.1", port, "/", false);
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Connected);
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Disconnected);
    server.await.expect("server task");
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_reports_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let mut transport = TcpTransport::current();
    transport.open("127.0.0.1", port, "/", false);
    assert_eq!(wait_for(&mut transport).await, TransportEvent::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn send_before_open_is_dropped() {
    let mut transport = TcpTransport::current();
    transport.send(b"SEND\n\n\0");
    assert!(transport.poll().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn client_session_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let connect = read_frame(&mut stream).await;
        assert!(connect.starts_with("CONNECT\naccept-version:1.1,1.0\n"));
        stream
            .write_all(b"CONNECTED\nversion:1.1\nheart-beat:0,0\n\n\0")
            .await
            .expect("write");

        let subscribe = read_frame(&mut stream).await;
        assert_eq!(subscribe, "SUBSCRIBE\nid:sub-0\ndestination:/queue/a\nack:client\n\n");
        stream
            .write_all(b"MESSAGE\nsubscription:sub-0\nack:m-1\n\nhello\0")
            .await
            .expect("write");

        let ack = read_frame(&mut stream).await;
        assert_eq!(ack, "ACK\nid:m-1\n\n");

        let disconnect = read_frame(&mut stream).await;
        assert_eq!(disconnect, "DISCONNECT\nreceipt:3\n\n");
        stream
            .write_all(b"RECEIPT\nreceipt-id:3\n\n\0")
            .await
            .expect("write");
    });

    let options = ConnectOptions::new("127.0.0.1", port, "/");
    let mut client = StompClient::new(TcpTransport::current(), options);
    client.begin();

    let mut subscribed = false;
    let mut disconnecting = false;
    for _ in 0..500 {
        client.tick();
        match client.state() {
            ConnectionState::Connected if !subscribed => {
                client
                    .subscribe("/queue/a", AckMode::Client, |_| AckDirective::Ack)
                    .expect("subscribe");
                subscribed = true;
            }
            ConnectionState::Connected if client.command_count() == 3 && !disconnecting => {
                client.disconnect();
                disconnecting = true;
            }
            ConnectionState::Disconnected if disconnecting => break,
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(disconnecting);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    server.await.expect("server task");
}
