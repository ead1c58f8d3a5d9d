//! In-process HTTP server for transfer tests
//!
//! Serves fixed bodies over HTTP/1.1 with `Connection: close`, honours
//! `Range: bytes=N-`, and can inject failures per route.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Behaviour of one path
#[derive(Debug, Clone, Default)]
pub struct Route {
    pub body: Vec<u8>,
    /// Answer the first N requests with 500
    pub fail_first: u32,
    /// Cut the body in half for the first N answered requests
    pub truncate_first: u32,
    /// Always answer 200 with the full body
    pub ignore_range: bool,
}

impl Route {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct RouteState {
    route: Route,
    requests: AtomicU32,
    ranges: Mutex<Vec<Option<u64>>>,
}

#[derive(Debug, Default)]
struct ServerState {
    routes: HashMap<String, RouteState>,
    delay: Duration,
    total_requests: AtomicU32,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// A running test server, stopped on drop
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(routes: Vec<(&str, Route)>) -> Self {
        Self::start_with_delay(routes, Duration::ZERO).await
    }

    /// Every response waits `delay` before it is written
    pub async fn start_with_delay(routes: Vec<(&str, Route)>, delay: Duration) -> Self {
        let routes = routes
            .into_iter()
            .map(|(path, route)| {
                (
                    path.to_string(),
                    RouteState {
                        route,
                        ..Default::default()
                    },
                )
            })
            .collect();
        let state = Arc::new(ServerState {
            routes,
            delay,
            ..Default::default()
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(handle_connection(socket, accept_state.clone()));
            }
        });

        Self { addr, state, handle }
    }

    pub fn url(&self, path: &str) -> url::Url {
        url::Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn total_requests(&self) -> u32 {
        self.state.total_requests.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, path: &str) -> u32 {
        self.state.routes.get(path).map_or(0, |r| r.requests.load(Ordering::SeqCst))
    }

    /// Range start of every request to `path`, in arrival order
    pub fn ranges_for(&self, path: &str) -> Vec<Option<u64>> {
        self.state
            .routes
            .get(path)
            .map(|r| r.ranges.lock().unwrap().clone())
            .unwrap_or_default()
    }

    pub fn peak_active(&self) -> usize {
        self.state.peak_active.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(mut socket: TcpStream, state: Arc<ServerState>) {
    let Some((path, range)) = read_request(&mut socket).await else {
        return;
    };
    state.total_requests.fetch_add(1, Ordering::SeqCst);
    let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_active.fetch_max(active, Ordering::SeqCst);

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let _ = respond(&mut socket, &state, &path, range).await;
    let _ = socket.shutdown().await;

    state.active.fetch_sub(1, Ordering::SeqCst);
}

async fn read_request(socket: &mut TcpStream) -> Option<(String, Option<u64>)> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 || buf.len() > 16 * 1024 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let range = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("range"))
        .and_then(|(_, value)| {
            value
                .trim()
                .strip_prefix("bytes=")?
                .trim_end_matches('-')
                .parse::<u64>()
                .ok()
        });
    Some((path, range))
}

async fn respond(
    socket: &mut TcpStream,
    state: &ServerState,
    path: &str,
    range: Option<u64>,
) -> std::io::Result<()> {
    let Some(route_state) = state.routes.get(path) else {
        return socket
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
    };
    route_state.ranges.lock().unwrap().push(range);
    let nth = route_state.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let route = &route_state.route;

    if nth <= route.fail_first {
        return socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
    }

    let len = route.body.len() as u64;
    let (head, body) = match range.filter(|_| !route.ignore_range) {
        Some(start) if start >= len => {
            let head = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                len
            );
            (head, &route.body[..0])
        }
        Some(start) => {
            let body = &route.body[start as usize..];
            let head = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                start,
                len - 1,
                len,
                body.len()
            );
            (head, body)
        }
        None => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                len
            );
            (head, &route.body[..])
        }
    };

    socket.write_all(head.as_bytes()).await?;
    let answered = nth - route.fail_first;
    if answered <= route.truncate_first {
        socket.write_all(&body[..body.len() / 2]).await?;
        socket.flush().await?;
        return Ok(());
    }
    socket.write_all(body).await?;
    socket.flush().await
}
