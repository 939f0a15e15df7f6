#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rmq_engine::MemoryBackend;
use rmq_store::{fault_line, BackendError, BackendResult, FaultLog, Operation, StoreBackend, Ttl};

/// Keys with this prefix make the server answer with an error reply.
pub const BROKEN_PREFIX: &str = "broken";

#[derive(Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<(Operation, String)>>,
}

impl RecordingLog {
    pub fn lines(&self) -> Vec<(Operation, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl FaultLog for RecordingLog {
    fn fault(&self, op: Operation, error: &BackendError) {
        self.lines.lock().unwrap().push((op, fault_line(error)));
    }
}

enum Reply {
    Simple(&'static str),
    Error(String),
    Integer(i64),
    Bulk(Option<String>),
    Array(Vec<Reply>),
}

/// Spawns a RESP2 server backed by a `MemoryBackend`.
///
/// When `cluster` is set the server also answers `CLUSTER SLOTS`, claiming
/// every slot for itself. Returns the node URL and the shared store.
pub fn spawn_store(cluster: bool) -> (String, Arc<MemoryBackend>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let store = Arc::new(MemoryBackend::with_shard_count(8));

    let shared = Arc::clone(&store);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(_) => break,
            };
            let store = Arc::clone(&shared);
            let slots_port = cluster.then_some(port);
            thread::spawn(move || serve(stream, &store, slots_port));
        }
    });

    (format!("redis://127.0.0.1:{}", port), store)
}

fn serve(stream: TcpStream, store: &MemoryBackend, slots_port: Option<u16>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
    let mut writer = stream.try_clone().expect("clone");
    let mut reader = BufReader::new(stream);
    while let Ok(Some(args)) = read_command(&mut reader) {
        let reply = dispatch(&args, store, slots_port);
        let mut out = Vec::new();
        encode(&reply, &mut out);
        if writer.write_all(&out).and_then(|_| writer.flush()).is_err() {
            break;
        }
    }
}

fn dispatch(args: &[String], store: &MemoryBackend, slots_port: Option<u16>) -> Reply {
    let name = match args.first() {
        Some(name) => name.to_ascii_uppercase(),
        None => return Reply::Error("ERR empty command".to_string()),
    };
    if args[1..].iter().any(|arg| arg.starts_with(BROKEN_PREFIX)) {
        return Reply::Error("ERR injected failure".to_string());
    }

    let arg = |idx: usize| args.get(idx).map(String::as_str).unwrap_or("");
    let int = |idx: usize| arg(idx).parse::<i64>().unwrap_or(0);

    match name.as_str() {
        "PING" => Reply::Simple("PONG"),
        "CLIENT" | "SELECT" | "READONLY" | "AUTH" => Reply::Simple("OK"),
        "CLUSTER" => match slots_port {
            Some(port) if arg(1).eq_ignore_ascii_case("SLOTS") => Reply::Array(vec![Reply::Array(vec![
                Reply::Integer(0),
                Reply::Integer(16383),
                Reply::Array(vec![
                    Reply::Bulk(Some("127.0.0.1".to_string())),
                    Reply::Integer(port as i64),
                    Reply::Bulk(Some("node-1".to_string())),
                ]),
            ])]),
            _ => Reply::Error("ERR This instance has cluster support disabled".to_string()),
        },
        "SET" => {
            let expiration = match arg(3).to_ascii_uppercase().as_str() {
                "EX" => Duration::from_secs(int(4) as u64),
                "PX" => Duration::from_millis(int(4) as u64),
                _ => Duration::ZERO,
            };
            status(store.set(arg(1), arg(2), expiration))
        }
        "DEL" => integer(store.del(arg(1))),
        "TTL" => match store.ttl(arg(1)) {
            Ok(Ttl::NoExpiry) => Reply::Integer(-1),
            Ok(Ttl::ExpiresIn(left)) => Reply::Integer(((left.as_millis() + 500) / 1000) as i64),
            Err(BackendError::Nil) => Reply::Integer(-2),
            Err(err) => Reply::Error(err.to_string()),
        },
        "LPUSH" => integer(store.lpush(arg(1), arg(2))),
        "LLEN" => integer(store.llen(arg(1))),
        "LREM" => integer(store.lrem(arg(1), int(2), arg(3))),
        "LTRIM" => status(store.ltrim(arg(1), int(2), int(3))),
        "RPOPLPUSH" => match store.rpoplpush(arg(1), arg(2)) {
            Ok(value) => Reply::Bulk(Some(value)),
            Err(BackendError::Nil) => Reply::Bulk(None),
            Err(err) => Reply::Error(err.to_string()),
        },
        "SADD" => integer(store.sadd(arg(1), arg(2))),
        "SMEMBERS" => match store.smembers(arg(1)) {
            Ok(members) => Reply::Array(members.into_iter().map(|m| Reply::Bulk(Some(m))).collect()),
            Err(err) => Reply::Error(err.to_string()),
        },
        "SREM" => integer(store.srem(arg(1), arg(2))),
        "FLUSHDB" => status(store.flushdb()),
        _ => Reply::Error(format!("ERR unknown command '{}'", name)),
    }
}

fn status(result: BackendResult<()>) -> Reply {
    match result {
        Ok(()) => Reply::Simple("OK"),
        Err(err) => Reply::Error(err.to_string()),
    }
}

fn integer(result: BackendResult<u64>) -> Reply {
    match result {
        Ok(value) => Reply::Integer(value as i64),
        Err(err) => Reply::Error(err.to_string()),
    }
}

fn encode(reply: &Reply, out: &mut Vec<u8>) {
    match reply {
        Reply::Simple(text) => {
            out.push(b'+');
            out.extend_from_slice(text.as_bytes());
        }
        Reply::Error(text) => {
            out.push(b'-');
            out.extend_from_slice(text.as_bytes());
        }
        Reply::Integer(value) => {
            out.push(b':');
            out.extend_from_slice(value.to_string().as_bytes());
        }
        Reply::Bulk(None) => out.extend_from_slice(b"$-1"),
        Reply::Bulk(Some(data)) => {
            out.push(b'$');
            out.extend_from_slice(data.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(data.as_bytes());
        }
        Reply::Array(items) => {
            out.push(b'*');
            out.extend_from_slice(items.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            for item in items {
                encode(item, out);
            }
            return;
        }
    }
    out.extend_from_slice(b"\r\n");
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<String>>> {
    let mut line = Vec::new();
    if read_line(reader, &mut line)?.is_none() {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?.ok_or_else(|| invalid("eof"))?;
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(invalid("missing crlf"));
        }
        data.truncate(len);
        args.push(String::from_utf8(data).map_err(|_| invalid("utf8"))?);
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("digit"))
}

fn invalid(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.to_string())
}
