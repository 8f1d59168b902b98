//! Scripted fake IRC server with a ChanServ that answers from a script.

#![allow(dead_code)]

use std::collections::HashMap;

use chanaudit::config::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const SERVICE_PREFIX: &str = "ChanServ!ChanServ@services.";

enum Reply {
    Notices {
        noise: Vec<Vec<u8>>,
        texts: Vec<String>,
    },
    Close,
}

/// One-connection fake network. Build the script, then [`spawn`](Self::spawn).
#[derive(Default)]
pub struct FakeNetwork {
    script: HashMap<String, Reply>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `request` (exact line) with ChanServ NOTICEs carrying `texts`.
    pub fn reply(self, request: &str, texts: &[&str]) -> Self {
        self.reply_with_noise(request, &[], texts)
    }

    /// Like [`reply`](Self::reply), but first writes each `noise` line as raw bytes.
    pub fn reply_with_noise(mut self, request: &str, noise: &[&[u8]], texts: &[&str]) -> Self {
        let noise = noise.iter().map(|n| n.to_vec()).collect();
        let texts = texts.iter().map(|t| t.to_string()).collect();
        self.script
            .insert(request.to_string(), Reply::Notices { noise, texts });
        self
    }

    /// Drop the connection when `request` arrives.
    pub fn close_on(mut self, request: &str) -> Self {
        self.script.insert(request.to_string(), Reply::Close);
        self
    }

    /// Listen on an ephemeral port. The task yields every line the client sent.
    pub async fn spawn(self) -> anyhow::Result<(u16, JoinHandle<anyhow::Result<Vec<String>>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let handle = tokio::spawn(async move { self.serve(listener).await });
        Ok((port, handle))
    }

    async fn serve(self, listener: TcpListener) -> anyhow::Result<Vec<String>> {
        let (stream, _) = listener.accept().await?;
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();
        let mut nick = String::from("*");

        while let Some(line) = lines.next_line().await? {
            received.push(line.clone());
            let mut out = Vec::new();

            if let Some(requested) = line.strip_prefix("NICK ") {
                nick = requested.to_string();
            } else if line.starts_with("USER ") {
                out.extend_from_slice(b":services.test NOTICE * :*** Looking up your hostname\r\n");
                out.extend_from_slice(b"PING :services.test\r\n");
                out.extend(format!(":services.test 001 {} :Welcome to the test network\r\n", nick).bytes());
            } else if line.starts_with("QUIT") {
                break;
            } else {
                match self.script.get(&line) {
                    Some(Reply::Notices { noise, texts }) => {
                        // Unrelated traffic ahead of the answer.
                        out.extend(format!(":services.test 372 {} :- message of the day\r\n", nick).bytes());
                        for line in noise {
                            out.extend_from_slice(line);
                            out.extend_from_slice(b"\r\n");
                        }
                        for text in texts {
                            out.extend(format!(":{} NOTICE {} :{}\r\n", SERVICE_PREFIX, nick, text).bytes());
                        }
                    }
                    Some(Reply::Close) => return Ok(received),
                    None => {}
                }
            }

            if !out.is_empty() {
                write.write_all(&out).await?;
            }
        }
        Ok(received)
    }
}

/// Plain-TCP config pointing at a fake network on `port`.
pub fn config(port: u16, extra: &str) -> anyhow::Result<Config> {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = {port}
tls = false

[identity]
nickname = "testbot"
realname = "Test Robot"

{extra}
"#
    );
    Ok(toml::from_str(&toml)?)
}
