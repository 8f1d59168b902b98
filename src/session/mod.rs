//! Query session: request/multi-reply correlation against a service.
//!
//! For each key the session sends one request, then consumes inbound
//! messages until a terminal reply for that key arrives. Replies matching
//! none of the protocol's patterns are unrelated traffic and are skipped.
//! Keys are strictly sequential: the service ties its replies to the most
//! recent command, so a second request must not go out before the first one
//! has finished.

mod protocol;
mod table;

pub use protocol::{
    Action, Aggregate, Applied, Extractor, ProtocolConfig, RequestBuilder, RequestContext,
    RequestStyle,
};
pub use table::ResultTable;

use std::time::Duration;

use async_trait::async_trait;
use chanaudit_proto::{irc_eq, Message};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::error::{ExtractError, SessionError, TransportError};

/// Capability the session needs from a connection.
///
/// Implementations deliver inbound messages in the order the peer sent them
/// and handle connection upkeep (PING, registration) themselves.
#[async_trait]
pub trait LineTransport: Send {
    /// Send one message. Sends are ordered.
    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Wait for the next inbound message. `Ok(None)` means the peer closed
    /// the connection.
    async fn recv(&mut self) -> Result<Option<Message>, TransportError>;
}

/// Upper bound applied to [`SessionOptions::wait_timeout`].
pub const MAX_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Session-wide settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub request: RequestContext,
    /// Upper bound on the wait for the next relevant reply.
    pub wait_timeout: Duration,
    /// Value recorded for a key whose wait timed out.
    pub timeout_value: String,
}

/// How a key's query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// At least one data reply was stored.
    Data,
    /// A terminal reply arrived before any data; `reason` is the pattern name.
    Default { reason: String },
    /// No relevant reply arrived within the wait timeout.
    TimedOut,
}

/// Per-key summary kept for logging and callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub key: String,
    pub outcome: KeyOutcome,
    /// Relevant replies rejected because extraction failed.
    pub rejected: usize,
    /// Late reply blocks of earlier keys discarded while waiting.
    pub stale: usize,
}

/// Drives one protocol over one transport.
pub struct QuerySession<'p, T> {
    transport: T,
    protocol: &'p ProtocolConfig,
    options: SessionOptions,
    reports: Vec<KeyReport>,
}

impl<'p, T: LineTransport> QuerySession<'p, T> {
    pub fn new(transport: T, protocol: &'p ProtocolConfig, options: SessionOptions) -> Self {
        Self {
            transport,
            protocol,
            options,
            reports: Vec::new(),
        }
    }

    /// Query every key in order and collect the results.
    ///
    /// Per-key conditions never abort the run. A transport failure or a
    /// closed connection does, and no partial table is returned.
    pub async fn run(&mut self, keys: &[String]) -> Result<ResultTable, SessionError> {
        if !self.protocol.has_terminal() {
            return Err(SessionError::NoTerminalPattern(self.protocol.name()));
        }

        let mut table = ResultTable::new();
        for key in keys {
            let (value, report) = self.query_key(key).await?;
            info!(
                protocol = self.protocol.name(),
                key = %key,
                value = %value,
                outcome = ?report.outcome,
                rejected = report.rejected,
                stale = report.stale,
                "Key resolved"
            );
            table.insert(key, value);
            self.reports.push(report);
        }
        Ok(table)
    }

    /// Reports for every key queried so far, in query order.
    pub fn reports(&self) -> &[KeyReport] {
        &self.reports
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    async fn query_key(&mut self, key: &str) -> Result<(String, KeyReport), SessionError> {
        let protocol = self.protocol;
        let request = protocol.request(&self.options.request, key);
        debug!(key = %key, request = %request, "Sending request");
        self.transport
            .send(request)
            .await
            .map_err(|source| SessionError::Transport {
                key: key.to_string(),
                source,
            })?;

        let blocks = protocol.has_begin();
        let mut aggregate = Aggregate::default();
        let mut in_block = !blocks;
        let mut report = KeyReport {
            key: key.to_string(),
            outcome: KeyOutcome::TimedOut,
            rejected: 0,
            stale: 0,
        };
        let mut deadline = self.deadline();

        loop {
            let Some(message) = self.recv_before(deadline, key).await? else {
                warn!(
                    key = %key,
                    timeout_secs = self.options.wait_timeout.as_secs_f64(),
                    "Timed out waiting for reply"
                );
                return Ok((self.options.timeout_value.clone(), report));
            };

            let Some((pattern, action)) = protocol.classify(&message) else {
                trace!(key = %key, line = %message, "Ignoring unrelated message");
                continue;
            };
            deadline = self.deadline();

            let name = pattern.name();
            let Some(text) = pattern.text(&message) else {
                report.rejected += 1;
                warn!(key = %key, pattern = name, line = %message, error = %ExtractError::NoText, "Rejected malformed reply");
                continue;
            };

            match action {
                Action::Begin { subject } => match subject(text) {
                    Ok(named) => {
                        aggregate = Aggregate::default();
                        in_block = irc_eq(&named, key);
                        if !in_block {
                            debug!(key = %key, late = %named, "Reply block for another key");
                        }
                    }
                    Err(e) => {
                        report.rejected += 1;
                        warn!(key = %key, pattern = name, line = %message, error = %e, "Rejected malformed reply");
                    }
                },
                Action::Finish { subject } => {
                    let named = subject.and_then(|extract| extract(text).ok());
                    let ours = match &named {
                        Some(named) => irc_eq(named, key),
                        None => in_block,
                    };
                    if !ours {
                        report.stale += 1;
                        warn!(
                            key = %key,
                            late = named.as_deref().unwrap_or("unknown"),
                            "Discarded late replies for a previous key"
                        );
                        aggregate = Aggregate::default();
                        in_block = !blocks;
                        continue;
                    }

                    report.outcome = if aggregate.has_data() {
                        KeyOutcome::Data
                    } else {
                        KeyOutcome::Default {
                            reason: name.to_string(),
                        }
                    };
                    return Ok((aggregate.finish(protocol.default_value()), report));
                }
                _ if !in_block => {
                    debug!(key = %key, pattern = name, line = %message, "Ignoring reply outside the key's block");
                }
                _ => match action.apply(&mut aggregate, text) {
                    Ok(applied) => trace!(key = %key, pattern = name, ?applied, "Data reply"),
                    Err(e) => {
                        report.rejected += 1;
                        warn!(key = %key, pattern = name, line = %message, error = %e, "Rejected malformed reply");
                    }
                },
            }
        }
    }

    /// Deadline for the next relevant reply.
    fn deadline(&self) -> Instant {
        Instant::now() + self.options.wait_timeout.min(MAX_WAIT_TIMEOUT)
    }

    /// Receive the next message, or `Ok(None)` once `deadline` passes.
    async fn recv_before(
        &mut self,
        deadline: Instant,
        key: &str,
    ) -> Result<Option<Message>, SessionError> {
        match timeout_at(deadline, self.transport.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(Some(message))) => Ok(Some(message)),
            Ok(Ok(None)) => Err(SessionError::ConnectionClosed {
                key: key.to_string(),
            }),
            Ok(Err(source)) => Err(SessionError::Transport {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::{access_list, mode_lock};
    use std::collections::{HashMap, VecDeque};

    /// Replays canned replies: each request line releases its script.
    #[derive(Default)]
    struct Scripted {
        scripts: HashMap<String, Vec<Message>>,
        inbox: VecDeque<Message>,
        sent: Vec<String>,
        /// Report a closed connection once the inbox runs dry.
        close_when_idle: bool,
    }

    impl Scripted {
        fn on(mut self, request: &str, replies: &[&str]) -> Self {
            let replies = replies
                .iter()
                .map(|line| line.parse().expect("valid script line"))
                .collect();
            self.scripts.insert(request.to_string(), replies);
            self
        }
    }

    #[async_trait]
    impl LineTransport for Scripted {
        async fn send(&mut self, message: Message) -> Result<(), TransportError> {
            let line = message.to_string();
            if let Some(replies) = self.scripts.get(&line) {
                self.inbox.extend(replies.iter().cloned());
            }
            self.sent.push(line);
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
            if let Some(message) = self.inbox.pop_front() {
                return Ok(Some(message));
            }
            if self.close_when_idle {
                return Ok(None);
            }
            std::future::pending().await
        }
    }

    const CS: &str = ":ChanServ!ChanServ@services.";

    fn cs(text: &str) -> String {
        format!("{} NOTICE testbot :{}", CS, text)
    }

    fn options(wait: Duration) -> SessionOptions {
        SessionOptions {
            request: RequestContext::new("ChanServ", RequestStyle::Alias),
            wait_timeout: wait,
            timeout_value: "timeout".to_string(),
        }
    }

    fn access() -> ProtocolConfig {
        access_list("ChanServ", vec!["freenode-staff".to_string()], "N/A").unwrap()
    }

    fn mlock() -> ProtocolConfig {
        mode_lock("ChanServ", "unset").unwrap()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    async fn run<'p>(
        transport: Scripted,
        protocol: &'p ProtocolConfig,
        input: &[&str],
    ) -> (Result<ResultTable, SessionError>, QuerySession<'p, Scripted>) {
        let mut session = QuerySession::new(transport, protocol, options(Duration::from_secs(5)));
        let result = session.run(&keys(input)).await;
        (result, session)
    }

    #[tokio::test]
    async fn test_access_entries_are_joined() {
        let script = Scripted::default().on(
            "CHANSERV ACCESS #rust LIST",
            &[
                &cs("Entry Nickname/Host          Flags"),
                &cs("1     alice                  +AFRefiorstv (FOUNDER)"),
                &cs("2     bob                    +Vv"),
                &cs("End of \x02#rust\x02 FLAGS listing."),
            ],
        );
        let protocol = access();
        let (result, session) = run(script, &protocol, &["#rust"]).await;

        let table = result.unwrap();
        assert_eq!(table.get("#rust"), Some("alice, bob"));
        assert_eq!(session.reports()[0].outcome, KeyOutcome::Data);
        assert_eq!(session.into_transport().sent, vec!["CHANSERV ACCESS #rust LIST"]);
    }

    #[tokio::test]
    async fn test_bypass_entry_contributes_nothing() {
        let script = Scripted::default()
            .on(
                "CHANSERV ACCESS #rust LIST",
                &[
                    &cs("1 alice +AF"),
                    &cs("2 freenode-staff +Aiotv"),
                    &cs("3 bob +V"),
                    &cs("End of #rust FLAGS listing."),
                ],
            )
            .on(
                "CHANSERV ACCESS #staffonly LIST",
                &[
                    &cs("1 freenode-staff +Aiotv"),
                    &cs("End of #staffonly FLAGS listing."),
                ],
            );
        let protocol = access();
        let (result, session) = run(script, &protocol, &["#rust", "#staffonly"]).await;

        let table = result.unwrap();
        assert_eq!(table.get("#rust"), Some("alice, bob"));
        assert_eq!(table.get("#staffonly"), Some("N/A"));
        assert_eq!(
            session.reports()[1].outcome,
            KeyOutcome::Default {
                reason: "end".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_terminal_without_data_yields_default() {
        let script = Scripted::default()
            .on("CHANSERV ACCESS #gone LIST", &[&cs("\x02#gone\x02 is not registered.")])
            .on(
                "CHANSERV ACCESS #private LIST",
                &[&cs("You are not authorized to perform this operation.")],
            );
        let protocol = access();
        let (result, session) = run(script, &protocol, &["#gone", "#private"]).await;

        assert_eq!(result.unwrap().to_tsv(), "#gone\tN/A\n#private\tN/A\n");
        assert_eq!(
            session.reports()[1].outcome,
            KeyOutcome::Default {
                reason: "not_authorized".to_string()
            }
        );

        let script = Scripted::default()
            .on("CHANSERV INFO #gone", &[&cs("\x02#gone\x02 is not registered.")]);
        let protocol = mlock();
        let (result, _) = run(script, &protocol, &["#gone"]).await;
        assert_eq!(result.unwrap().get("#gone"), Some("unset"));
    }

    #[tokio::test]
    async fn test_mode_lock_extracted() {
        let script = Scripted::default()
            .on(
                "CHANSERV INFO #rust",
                &[
                    &cs("Information on \x02#rust\x02:"),
                    &cs("Founder    : alice"),
                    &cs("Mode lock: +nt"),
                    &cs("*** \x02End of Info\x02 ***"),
                ],
            )
            .on(
                "CHANSERV INFO #open",
                &[
                    &cs("Information on \x02#Open\x02:"),
                    &cs("Founder    : bob"),
                    &cs("*** \x02End of Info\x02 ***"),
                ],
            );
        let protocol = mlock();
        let (result, _) = run(script, &protocol, &["#rust", "#open"]).await;

        assert_eq!(result.unwrap().to_tsv(), "#rust\t+nt\n#open\tunset\n");
    }

    #[tokio::test]
    async fn test_unrelated_traffic_is_ignored() {
        let script = Scripted::default().on(
            "CHANSERV ACCESS #rust LIST",
            &[
                ":irc.example.net NOTICE testbot :*** You are connected using TLS",
                ":NickServ!NickServ@services. NOTICE testbot :1 mallory +AF",
                ":someone!u@h PRIVMSG #rust :End of #rust FLAGS listing.",
                &cs("1 alice +AF"),
                ":irc.example.net 372 testbot :- motd line",
                &cs("End of #rust FLAGS listing."),
            ],
        );
        let protocol = access();
        let (result, session) = run(script, &protocol, &["#rust"]).await;

        assert_eq!(result.unwrap().get("#rust"), Some("alice"));
        assert_eq!(session.reports()[0].rejected, 0);
    }

    #[tokio::test]
    async fn test_one_record_per_key_in_order() {
        let mut script = Scripted::default();
        let input = ["#c", "#a", "#b"];
        for key in input {
            script = script.on(
                &format!("CHANSERV INFO {}", key),
                &[&cs(&format!("\x02{}\x02 is not registered.", key))],
            );
        }
        let protocol = mlock();
        let (result, session) = run(script, &protocol, &input).await;

        let table = result.unwrap();
        let order: Vec<_> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(order, input);
        assert_eq!(session.reports().len(), 3);
        assert_eq!(
            session.into_transport().sent,
            vec!["CHANSERV INFO #c", "CHANSERV INFO #a", "CHANSERV INFO #b"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_key_is_requeried() {
        let script = Scripted::default().on(
            "CHANSERV ACCESS #rust LIST",
            &[&cs("1 alice +AF"), &cs("End of #rust FLAGS listing.")],
        );
        let protocol = access();
        let (result, session) = run(script, &protocol, &["#rust", "#rust"]).await;

        let table = result.unwrap();
        assert_eq!(table.to_tsv(), "#rust\talice\n");
        assert_eq!(session.into_transport().sent.len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_is_identical() {
        let build = || {
            Scripted::default()
                .on(
                    "CHANSERV ACCESS #rust LIST",
                    &[&cs("1 alice +AF"), &cs("2 bob +V"), &cs("End of #rust FLAGS listing.")],
                )
                .on("CHANSERV ACCESS #gone LIST", &[&cs("#gone is not registered.")])
        };
        let protocol = access();
        let (first, _) = run(build(), &protocol, &["#rust", "#gone"]).await;
        let (second, _) = run(build(), &protocol, &["#rust", "#gone"]).await;

        assert_eq!(first.unwrap().to_tsv(), second.unwrap().to_tsv());
    }

    #[tokio::test]
    async fn test_empty_key_list_sends_nothing() {
        let protocol = access();
        let (result, session) = run(Scripted::default(), &protocol, &[]).await;

        assert!(result.unwrap().is_empty());
        assert!(session.into_transport().sent.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_records_sentinel_and_moves_on() {
        let script = Scripted::default()
            .on("CHANSERV INFO #silent", &[&cs("Founder    : alice")])
            .on(
                "CHANSERV INFO #rust",
                &[
                    &cs("Information on #rust:"),
                    &cs("Mode lock  : +nt"),
                    &cs("*** End of Info ***"),
                ],
            );
        let protocol = mlock();
        let mut session =
            QuerySession::new(script, &protocol, options(Duration::from_millis(50)));

        let table = session.run(&keys(&["#silent", "#rust"])).await.unwrap();
        assert_eq!(table.to_tsv(), "#silent\ttimeout\n#rust\t+nt\n");
        assert_eq!(session.reports()[0].outcome, KeyOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_late_access_replies_stay_with_their_key() {
        let script = Scripted::default().on(
            "CHANSERV ACCESS #next LIST",
            &[
                &cs("1 mallory +AF"),
                &cs("End of \x02#slow\x02 FLAGS listing."),
                &cs("1 bob +V"),
                &cs("End of \x02#next\x02 FLAGS listing."),
            ],
        );
        let protocol = access();
        let mut session =
            QuerySession::new(script, &protocol, options(Duration::from_millis(50)));

        let table = session.run(&keys(&["#slow", "#next"])).await.unwrap();
        assert_eq!(table.to_tsv(), "#slow\ttimeout\n#next\tbob\n");
        assert_eq!(session.reports()[1].stale, 1);
        assert_eq!(session.reports()[1].outcome, KeyOutcome::Data);
    }

    #[tokio::test]
    async fn test_late_unregistered_reply_does_not_end_next_key() {
        let script = Scripted::default().on(
            "CHANSERV ACCESS #next LIST",
            &[
                &cs("#slow is not registered."),
                &cs("1 bob +V"),
                &cs("End of #NEXT FLAGS listing."),
            ],
        );
        let protocol = access();
        let mut session =
            QuerySession::new(script, &protocol, options(Duration::from_millis(50)));

        let table = session.run(&keys(&["#slow", "#next"])).await.unwrap();
        assert_eq!(table.get("#next"), Some("bob"));
        assert_eq!(session.reports()[1].stale, 1);
    }

    #[tokio::test]
    async fn test_late_info_block_is_skipped() {
        let script = Scripted::default().on(
            "CHANSERV INFO #next",
            &[
                &cs("Information on \x02#slow\x02:"),
                &cs("Mode lock  : +s"),
                &cs("*** \x02End of Info\x02 ***"),
                &cs("Information on \x02#next\x02:"),
                &cs("Mode lock  : +nt"),
                &cs("*** \x02End of Info\x02 ***"),
            ],
        );
        let protocol = mlock();
        let mut session =
            QuerySession::new(script, &protocol, options(Duration::from_millis(50)));

        let table = session.run(&keys(&["#slow", "#next"])).await.unwrap();
        assert_eq!(table.to_tsv(), "#slow\ttimeout\n#next\t+nt\n");
        assert_eq!(session.reports()[1].stale, 1);
    }

    #[tokio::test]
    async fn test_tail_of_late_info_block_is_skipped() {
        // #slow's header arrived before its timeout; the rest arrives late.
        let script = Scripted::default()
            .on("CHANSERV INFO #slow", &[&cs("Information on #slow:")])
            .on(
                "CHANSERV INFO #next",
                &[
                    &cs("Mode lock  : +s"),
                    &cs("*** End of Info ***"),
                    &cs("Information on #next:"),
                    &cs("Founder    : bob"),
                    &cs("*** End of Info ***"),
                ],
            );
        let protocol = mlock();
        let mut session =
            QuerySession::new(script, &protocol, options(Duration::from_millis(50)));

        let table = session.run(&keys(&["#slow", "#next"])).await.unwrap();
        assert_eq!(table.to_tsv(), "#slow\ttimeout\n#next\tunset\n");
        assert_eq!(
            session.reports()[1].outcome,
            KeyOutcome::Default {
                reason: "end".to_string()
            }
        );
        assert_eq!(session.reports()[1].stale, 1);
    }

    #[tokio::test]
    async fn test_oversized_wait_timeout_is_clamped() {
        let script = Scripted::default().on(
            "CHANSERV ACCESS #rust LIST",
            &[&cs("1 alice +AF"), &cs("End of #rust FLAGS listing.")],
        );
        let protocol = access();
        let mut session =
            QuerySession::new(script, &protocol, options(Duration::from_secs(u64::MAX)));

        let table = session.run(&keys(&["#rust"])).await.unwrap();
        assert_eq!(table.get("#rust"), Some("alice"));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_rejected_not_stored() {
        let script = Scripted::default().on(
            "CHANSERV INFO #odd",
            &[
                &cs("Information on #odd:"),
                &cs("Mode lock (none)"),
                &cs("*** End of Info ***"),
            ],
        );
        let protocol = mlock();
        let (result, session) = run(script, &protocol, &["#odd"]).await;

        assert_eq!(result.unwrap().get("#odd"), Some("unset"));
        assert_eq!(session.reports()[0].rejected, 1);
    }

    #[tokio::test]
    async fn test_connection_close_aborts_without_table() {
        let mut script = Scripted::default().on(
            "CHANSERV ACCESS #rust LIST",
            &[&cs("1 alice +AF"), &cs("End of #rust FLAGS listing.")],
        );
        script.close_when_idle = true;
        let protocol = access();
        let (result, _) = run(script, &protocol, &["#rust", "#next"]).await;

        match result {
            Err(SessionError::ConnectionClosed { key }) => assert_eq!(key, "#next"),
            other => panic!("expected ConnectionClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_protocol_without_terminal_is_rejected() {
        fn request(ctx: &RequestContext, key: &str) -> Message {
            ctx.command(&["INFO", key])
        }
        let protocol = ProtocolConfig::new("broken", request, "unset");
        let (result, session) = run(Scripted::default(), &protocol, &["#rust"]).await;

        assert!(matches!(result, Err(SessionError::NoTerminalPattern("broken"))));
        assert!(session.into_transport().sent.is_empty());
    }
}
