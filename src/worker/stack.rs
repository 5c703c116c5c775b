//! # Request stack: what a worker serves.
//!
//! The worker runtime only knows two things about the application: how to
//! check its database before accepting traffic, and which [`Router`] to serve.
//! Both sit behind [`RequestStack`].
//!
//! [`DefaultStack`] serves `GET /health` and, when a database URL is
//! configured, checks that at least one database host accepts a TCP connection
//! within the connect timeout.

use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpStream;
use url::{Host, Url};

use crate::config::WorkerConfig;
use crate::error::WorkerError;

/// Application collaborator served by each worker.
#[async_trait]
pub trait RequestStack: Send + Sync + 'static {
    /// Verifies the database is usable. An error is fatal to the worker.
    async fn connect_database(&self, cfg: &WorkerConfig) -> Result<(), WorkerError>;

    /// Routes served on the shared listener.
    fn router(&self) -> Router;
}

/// Health endpoint plus a TCP reachability check of the database.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStack;

#[async_trait]
impl RequestStack for DefaultStack {
    async fn connect_database(&self, cfg: &WorkerConfig) -> Result<(), WorkerError> {
        let Some(url) = cfg.database_url.as_deref() else {
            return Ok(());
        };
        let hosts = database_hosts(url)?;
        if hosts.is_empty() {
            tracing::debug!("database hosts resolved through DNS SRV, probe skipped");
            return Ok(());
        }
        probe(&hosts, cfg.db_connect_timeout).await
    }

    fn router(&self) -> Router {
        Router::new().route("/health", get(health))
    }
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn probe(hosts: &[(String, u16)], limit: Duration) -> Result<(), WorkerError> {
    let attempt = async {
        let mut last = None;
        for (host, port) in hosts {
            match TcpStream::connect((host.as_str(), *port)).await {
                Ok(_) => {
                    tracing::debug!(host = %host, port, "database reachable");
                    return Ok(());
                }
                Err(e) => last = Some(format!("{host}:{port}: {e}")),
            }
        }
        Err(last.unwrap_or_else(|| "no database host".to_string()))
    };

    match tokio::time::timeout(limit, attempt).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(WorkerError::Database(reason)),
        Err(_) => Err(WorkerError::Database(format!(
            "no database host reachable within {}ms",
            limit.as_millis()
        ))),
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "mongodb" => Some(27017),
        "postgres" | "postgresql" => Some(5432),
        "redis" | "rediss" => Some(6379),
        "mysql" | "mariadb" => Some(3306),
        _ => None,
    }
}

/// Extracts `(host, port)` pairs from a database URL.
///
/// Accepts `scheme://[user[:pass]@]host[:port][,host[:port]...][/path][?query]`.
/// A seed list is not a valid URL, so each host is parsed as its own URL
/// sharing the scheme, credentials and path. SRV schemes (`mongodb+srv`)
/// resolve their hosts through DNS and yield an empty list.
pub fn database_hosts(raw: &str) -> Result<Vec<(String, u16)>, WorkerError> {
    let invalid = |why: String| WorkerError::Config(format!("invalid database url: {why}"));

    let (scheme, rest) = raw
        .split_once("://")
        .ok_or_else(|| invalid("missing scheme".into()))?;
    if scheme.ends_with("+srv") {
        Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        return Ok(Vec::new());
    }
    let fallback = default_port(scheme);

    let (authority, tail) = rest.split_at(rest.find(['/', '?']).unwrap_or(rest.len()));
    let (credentials, seeds) = match authority.rsplit_once('@') {
        Some((user, seeds)) => (format!("{user}@"), seeds),
        None => (String::new(), authority),
    };
    if seeds.is_empty() {
        return Err(invalid("missing host".into()));
    }

    seeds
        .split(',')
        .map(|seed| {
            let url = Url::parse(&format!("{scheme}://{credentials}{seed}{tail}"))
                .map_err(|e| invalid(format!("{seed}: {e}")))?;
            let host = match url.host() {
                Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
                Some(Host::Ipv4(ip)) => ip.to_string(),
                Some(Host::Ipv6(ip)) => ip.to_string(),
                _ => return Err(invalid(format!("{seed}: empty host"))),
            };
            let port = url
                .port()
                .or(fallback)
                .ok_or_else(|| invalid(format!("{seed}: port required for {scheme}")))?;
            Ok((host, port))
        })
        .collect()
}
