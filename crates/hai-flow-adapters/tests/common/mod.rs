#![allow(dead_code)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use alloy::primitives::Address;
use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

use hai_flow_core::{ClockPort, PortError};

#[derive(Debug, Default)]
pub struct TestClock {
    now: AtomicU64,
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.fetch_add(1, Ordering::SeqCst) + 1_739_750_400_000)
    }
}

pub fn owner_address() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid owner address")
}

/// Every request body the mock server received, in order.
pub type Calls = Arc<Mutex<Vec<Value>>>;

/// Serves `requests` JSON bodies, answering each with `handler(body)` as
/// `(status, payload)`.
pub fn spawn_json_server<F>(requests: usize, handler: F) -> (String, Calls)
where
    F: Fn(&Value) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);

    thread::spawn(move || {
        for _ in 0..requests {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut raw = String::new();
            let _ = req.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let (code, payload) = handler(&body);
            if let Ok(mut g) = seen.lock() {
                g.push(body);
            }
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, calls)
}

pub fn rpc_result(body: &Value, result: Value) -> (u16, Value) {
    (
        200,
        json!({"jsonrpc": "2.0", "id": body["id"].clone(), "result": result}),
    )
}

pub fn rpc_error(body: &Value, code: i64, message: &str) -> (u16, Value) {
    (
        200,
        json!({
            "jsonrpc": "2.0",
            "id": body["id"].clone(),
            "error": {"code": code, "message": message}
        }),
    )
}

pub fn temp_path(name: &str) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "hai-flow-{name}-{}-{seq}.json",
        std::process::id()
    ))
}
