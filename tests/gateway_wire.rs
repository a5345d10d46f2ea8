mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use heistline::game::{MemoryProfileStore, ProfileStore};
use heistline::server::{gateway, GameServer, LogPushSender, PushSender};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

async fn next_line(reader: &mut BufReader<OwnedReadHalf>) -> Value {
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("timeout waiting for line")
        .expect("read");
    serde_json::from_str(&line).expect("server sent valid json")
}

async fn start_server() -> (Arc<GameServer>, SocketAddr) {
    let store: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
    let push: Arc<dyn PushSender> = Arc::new(LogPushSender);
    let server = Arc::new(GameServer::new(common::fast_config(100), store, push).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(gateway::serve(server.clone(), listener));
    (server, addr)
}

const REGISTER_ALICE: &[u8] =
    b"{\"event\":\"register\",\"data\":{\"accountKey\":\"acct-1\",\"displayName\":\"Alice\"}}\n";

#[tokio::test]
async fn json_lines_round_trip_over_tcp() {
    let (server, addr) = start_server().await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(REGISTER_ALICE).await.unwrap();
    let init = next_line(&mut reader).await;
    assert_eq!(init["event"], "init");
    assert_eq!(init["data"]["profile"]["displayName"], "Alice");
    assert_eq!(init["data"]["profile"]["health"], 100);
    assert_eq!(init["data"]["travelCosts"]["London"], 50);
    let online = next_line(&mut reader).await;
    assert_eq!(online["event"], "online-players");
    assert_eq!(online["data"]["players"][0], "Alice");

    // Garbage is ignored; the connection stays usable.
    write_half.write_all(b"this is not json\n").await.unwrap();
    write_half
        .write_all(b"{\"event\":\"rob-bank\"}\n")
        .await
        .unwrap();
    let stats = next_line(&mut reader).await;
    assert_eq!(stats["event"], "update-stats");
    let balance = stats["data"]["profile"]["balance"].as_u64().unwrap();
    assert!((10..=100).contains(&balance));

    drop(write_half);
    drop(reader);
    let server_ref = server.clone();
    assert!(
        common::eventually(Duration::from_secs(2), move || server_ref
            .online_players()
            .is_empty())
        .await
    );
}

#[tokio::test]
async fn non_utf8_line_is_dropped_and_connection_survives() {
    let (_server, addr) = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"\xff\xfe garbage\n").await.unwrap();
    write_half.write_all(REGISTER_ALICE).await.unwrap();

    let init = next_line(&mut reader).await;
    assert_eq!(init["event"], "init");
    assert_eq!(init["data"]["profile"]["displayName"], "Alice");
}

#[tokio::test]
async fn endless_line_closes_the_connection() {
    let (server, addr) = start_server().await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(REGISTER_ALICE).await.unwrap();
    assert_eq!(next_line(&mut reader).await["event"], "init");
    assert_eq!(next_line(&mut reader).await["event"], "online-players");

    // No newline ever arrives; the server gives up instead of buffering it all.
    let chunk = vec![b'a'; 8 * 1024];
    for _ in 0..4 {
        if write_half.write_all(&chunk).await.is_err() {
            break;
        }
    }

    // EOF or a reset both count as closed; only a hang fails.
    let mut rest = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), reader.read_to_end(&mut rest))
        .await
        .expect("server should close the socket");
    let server_ref = server.clone();
    assert!(
        common::eventually(Duration::from_secs(2), move || server_ref
            .online_players()
            .is_empty())
        .await
    );
}
