//! chanaudit - query a services bot for a list of channels and record the answers.
//!
//! A run connects to the network, registers, then asks the service about each
//! key from the input file in turn, collecting the multi-line replies into one
//! value per key. See [`protocols`] for the supported audits.

pub mod client;
pub mod config;
pub mod error;
pub mod matching;
pub mod output;
pub mod protocols;
pub mod session;

use tracing::info;

use crate::client::IrcConnection;
use crate::config::Config;
use crate::error::AuditError;
use crate::protocols::Protocol;
use crate::session::{KeyReport, QuerySession, RequestContext, ResultTable, SessionOptions};

/// Results of one completed run.
#[derive(Debug)]
pub struct AuditOutcome {
    pub table: ResultTable,
    pub reports: Vec<KeyReport>,
}

/// Connect, register and query every key with `protocol`.
///
/// Nothing is written here; the caller decides what to do with the table.
pub async fn audit(
    config: &Config,
    protocol: Protocol,
    keys: &[String],
) -> Result<AuditOutcome, AuditError> {
    let protocol_config = protocol.build(config)?;

    let mut conn = IrcConnection::connect(&config.server).await?;
    conn.register(&config.identity, config.query.registration_timeout())
        .await?;

    let options = SessionOptions {
        request: RequestContext::new(&config.query.service, config.query.request_style),
        wait_timeout: config.query.wait_timeout(),
        timeout_value: config.query.timeout_value.clone(),
    };
    let mut session = QuerySession::new(conn, &protocol_config, options);
    let table = session.run(keys).await?;
    let reports = session.reports().to_vec();

    info!(
        protocol = %protocol,
        keys = keys.len(),
        records = table.len(),
        "Audit complete"
    );
    session.into_transport().quit("audit complete").await;

    Ok(AuditOutcome { table, reports })
}
