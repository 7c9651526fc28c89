//! In-process RESP server for tests
//!
//! Speaks enough of the store protocol (AUTH, GET, SET, KEYS and the CLIENT
//! handshake) to exercise the store client and repositories end to end
//! without a real Redis.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::StoreEndpoint;
use crate::protocol::{Command, Parser, Value};

/// Stored entry. `Other` stands in for non-string types so GET can answer
/// with WRONGTYPE.
#[derive(Debug, Clone)]
enum Entry {
    Str(Vec<u8>),
    Other,
}

#[derive(Default)]
struct Shared {
    data: RwLock<HashMap<String, Entry>>,
    password: Option<String>,
    auth_calls: AtomicUsize,
    connections: AtomicUsize,
    clients: Mutex<Vec<JoinHandle<()>>>,
}

pub struct TestServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server that accepts any client
    pub async fn start() -> Self {
        Self::bind(None).await
    }

    /// Start a server that requires `AUTH password`
    pub async fn with_password(password: &str) -> Self {
        Self::bind(Some(password.to_string())).await
    }

    /// Start a server on a fixed endpoint, e.g. one that was unreachable
    pub async fn bind_to(endpoint: &StoreEndpoint) -> Self {
        Self::listen(&endpoint.to_string(), None).await
    }

    async fn bind(password: Option<String>) -> Self {
        Self::listen("127.0.0.1:0", password).await
    }

    async fn listen(addr: &str, password: Option<String>) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            password,
            ..Default::default()
        });

        let accept_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_shared.connections.fetch_add(1, Ordering::SeqCst);
                let shared = Arc::clone(&accept_shared);
                let client = tokio::spawn(handle_connection(Arc::clone(&shared), stream));
                shared.clients.lock().unwrap().push(client);
            }
        });

        Self {
            addr,
            shared,
            handle,
        }
    }

    pub fn endpoint(&self) -> StoreEndpoint {
        StoreEndpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.shared
            .data
            .write()
            .unwrap()
            .insert(key.to_string(), Entry::Str(value.as_bytes().to_vec()));
    }

    /// Store a key GET cannot read
    pub fn insert_wrong_type(&self, key: &str) {
        self.shared
            .data
            .write()
            .unwrap()
            .insert(key.to_string(), Entry::Other);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.shared.data.read().unwrap().get(key) {
            Some(Entry::Str(data)) => Some(String::from_utf8_lossy(data).into_owned()),
            _ => None,
        }
    }

    pub fn auth_calls(&self) -> usize {
        self.shared.auth_calls.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Close every open client connection, as a restarting store would.
    /// The listener keeps accepting.
    pub fn drop_connections(&self) {
        for client in self.shared.clients.lock().unwrap().drain(..) {
            client.abort();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
        self.drop_connections();
    }
}

/// An endpoint nothing listens on
pub async fn dead_endpoint() -> StoreEndpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    StoreEndpoint::new(addr.ip().to_string(), addr.port())
}

async fn handle_connection(shared: Arc<Shared>, mut stream: TcpStream) {
    let mut buffer = vec![0u8; 8192];
    let mut pending = Vec::new();
    let mut authenticated = shared.password.is_none();

    loop {
        let n = match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buffer[..n]);

        let mut processed = 0;
        loop {
            let (value, consumed) = match Parser::parse(&pending[processed..]) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => break,
                Err(e) => {
                    debug!("Closing test store connection: {}", e);
                    let reply = Value::error(format!("ERR Protocol error: {}", e));
                    let _ = stream.write_all(&reply.encode()).await;
                    return;
                }
            };
            processed += consumed;
            let response = execute(&shared, &mut authenticated, value);
            if stream.write_all(&response.encode()).await.is_err() {
                return;
            }
        }

        if processed > 0 {
            pending = pending.split_off(processed);
        }
    }
}

fn execute(shared: &Shared, authenticated: &mut bool, value: Value) -> Value {
    let command = match Command::from_resp(value) {
        Ok(command) => command,
        Err(reply) => return reply,
    };

    if let Command::Auth { password } = &command {
        shared.auth_calls.fetch_add(1, Ordering::SeqCst);
        return match &shared.password {
            None => Value::error(
                "ERR AUTH <password> called without any password configured for the default user",
            ),
            Some(expected) if expected == password => {
                *authenticated = true;
                Value::ok()
            }
            Some(_) => Value::error("WRONGPASS invalid username-password pair"),
        };
    }

    if !*authenticated {
        return Value::error("NOAUTH Authentication required.");
    }

    match command {
        Command::Get { key } => match shared.data.read().unwrap().get(&key) {
            Some(Entry::Str(data)) => Value::bulk(data.clone()),
            Some(Entry::Other) => Value::error(
                "WRONGTYPE Operation against a key holding the wrong kind of value",
            ),
            None => Value::BulkString(None),
        },
        Command::Set { key, value } => {
            shared
                .data
                .write()
                .unwrap()
                .insert(key, Entry::Str(value));
            Value::ok()
        }
        Command::Keys { pattern } => {
            let data = shared.data.read().unwrap();
            let keys = data
                .keys()
                .filter(|key| pattern == "*" || **key == pattern)
                .map(|key| Value::bulk(key.as_str()))
                .collect();
            Value::Array(Some(keys))
        }
        Command::Client | Command::Auth { .. } => Value::ok(),
    }
}
