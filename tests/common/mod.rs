//! 集成测试用的进程内 memcached 兼容服务端
//! 支持文本与二进制协议的 get/set，数据存放在 mini-moka 缓存中

#![allow(dead_code)]

use kv_loadbench::endpoint::Endpoint;
use mini_moka::sync::Cache;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
use std::thread;
use tempfile::TempDir;

type Store = Cache<Vec<u8>, (Vec<u8>, u32)>;

/// 对 version 命令返回的版本号
const VERSION: &str = "1.6.21";

/// 测试服务端的内存上限（字节）
const CAPACITY_BYTES: u64 = 1 << 30;

pub struct TestServer {
    pub endpoint: Endpoint,
    store: Store,
    _dir: Option<TempDir>,
}

fn new_store() -> Store {
    Cache::builder()
        .weigher(|k: &Vec<u8>, v: &(Vec<u8>, u32)| (k.len() + v.0.len() + 48) as u32)
        .max_capacity(CAPACITY_BYTES)
        .build()
}

impl TestServer {
    pub fn tcp() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let store = new_store();
        let shared = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let _ = stream.set_nodelay(true);
                let store = shared.clone();
                thread::spawn(move || {
                    let writer = stream.try_clone().unwrap();
                    let _ = serve(BufReader::new(stream), writer, &store);
                });
            }
        });
        Self {
            endpoint: Endpoint::Tcp {
                host: "127.0.0.1".into(),
                port,
            },
            store,
            _dir: None,
        }
    }

    #[cfg(unix)]
    pub fn unix() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memcached.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let store = new_store();
        let shared = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let store = shared.clone();
                thread::spawn(move || {
                    let writer: UnixStream = stream.try_clone().unwrap();
                    let _ = serve(BufReader::new(stream), writer, &store);
                });
            }
        });
        Self {
            endpoint: Endpoint::Unix { path },
            store,
            _dir: Some(dir),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<(Vec<u8>, u32)> {
        self.store.get(&key.to_vec())
    }
}

/// 返回一个当前没有监听者的本地 TCP 地址
pub fn closed_tcp_endpoint() -> Endpoint {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    Endpoint::Tcp {
        host: "127.0.0.1".into(),
        port,
    }
}

fn serve<R: BufRead, W: Write>(mut reader: R, mut writer: W, store: &Store) -> io::Result<()> {
    let first = match reader.fill_buf()? {
        [] => return Ok(()),
        buf => buf[0],
    };
    if first == 0x80 {
        serve_binary(reader, writer, store)
    } else {
        serve_text(&mut reader, &mut writer, store)
    }
}

fn serve_text<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    store: &Store,
) -> io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let parts: Vec<&str> = line.split_ascii_whitespace().collect();
        match parts.as_slice() {
            ["set", key, flags, _exptime, bytes, rest @ ..] => {
                let len: usize = bytes.parse().unwrap_or(0);
                let mut data = vec![0u8; len + 2];
                reader.read_exact(&mut data)?;
                data.truncate(len);
                let flags: u32 = flags.parse().unwrap_or(0);
                store.insert(key.as_bytes().to_vec(), (data, flags));
                if rest.first() != Some(&"noreply") {
                    writer.write_all(b"STORED\r\n")?;
                }
            }
            [cmd @ ("get" | "gets"), keys @ ..] => {
                let mut out = Vec::new();
                for key in keys {
                    if let Some((data, flags)) = store.get(&key.as_bytes().to_vec()) {
                        write!(out, "VALUE {} {} {}", key, flags, data.len())?;
                        if *cmd == "gets" {
                            out.extend_from_slice(b" 1");
                        }
                        out.extend_from_slice(b"\r\n");
                        out.extend_from_slice(&data);
                        out.extend_from_slice(b"\r\n");
                    }
                }
                out.extend_from_slice(b"END\r\n");
                writer.write_all(&out)?;
            }
            ["version"] => write!(writer, "VERSION {}\r\n", VERSION)?,
            _ => writer.write_all(b"ERROR\r\n")?,
        }
        writer.flush()?;
    }
}

fn serve_binary<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    store: &Store,
) -> io::Result<()> {
    loop {
        let mut header = [0u8; 24];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let opcode = header[1];
        let key_len = u16::from_be_bytes([header[2], header[3]]) as usize;
        let extras_len = header[4] as usize;
        let body_len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let opaque = [header[12], header[13], header[14], header[15]];
        let mut body = vec![0u8; body_len];
        reader.read_exact(&mut body)?;
        let key = body[extras_len..extras_len + key_len].to_vec();

        let (status, extras, value): (u16, Vec<u8>, Vec<u8>) = match opcode {
            0x01 => {
                let flags = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
                let data = body[extras_len + key_len..].to_vec();
                store.insert(key, (data, flags));
                (0, Vec::new(), Vec::new())
            }
            0x0b => (0, Vec::new(), VERSION.as_bytes().to_vec()),
            0x00 => match store.get(&key) {
                Some((data, flags)) => (0, flags.to_be_bytes().to_vec(), data),
                None => (1, Vec::new(), b"Not found".to_vec()),
            },
            _ => (0x81, Vec::new(), b"Unknown command".to_vec()),
        };

        let mut out = vec![0x81, opcode, 0, 0, extras.len() as u8, 0];
        out.extend_from_slice(&status.to_be_bytes());
        out.extend_from_slice(&((extras.len() + value.len()) as u32).to_be_bytes());
        out.extend_from_slice(&opaque);
        out.extend_from_slice(&0u64.to_be_bytes());
        out.extend_from_slice(&extras);
        out.extend_from_slice(&value);
        writer.write_all(&out)?;
        writer.flush()?;
    }
}
