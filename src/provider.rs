//! The record provider: list, append, set and delete records in a zone
//!
//! Every operation holds one provider-wide lock for its whole duration, so
//! calls on a provider are serialized: the message of a later call is sent
//! only after the reply to the earlier call has been received.

use crate::config::ProviderConfig;
use crate::dynamic_update::tsig::TsigSigner;
use crate::dynamic_update::{UpdateMode, build_transaction};
use crate::error::{Result, Rfc2136Error};
use crate::nameserver::normalize;
use crate::query::{build_query, records_from_response};
use crate::record::Record;
use crate::transport::{DnsTransport, Exchanger, TransportClient};
use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Generic record management over a DNS zone
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Every record the nameserver returns for the zone
    async fn get_records(&self, zone: &str, cancel: &CancellationToken) -> Result<Vec<Record>>;

    /// Add records, keeping existing records of the same name and type
    async fn append_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>>;

    /// Replace the set of each record's name and type with that record
    async fn set_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>>;

    /// Delete records matching name, type and value
    async fn delete_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>>;
}

/// State guarded by the provider lock
#[derive(Debug)]
struct ProviderState<E: Exchanger> {
    config: ProviderConfig,
    client: TransportClient<E>,
}

/// RFC 2136 provider talking to one nameserver
#[derive(Debug)]
pub struct Rfc2136Provider<E: Exchanger = DnsTransport> {
    state: Mutex<ProviderState<E>>,
}

impl Rfc2136Provider<DnsTransport> {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let transport = DnsTransport::new(config.protocol, config.timeout());
        Self::with_exchanger(config, transport)
    }
}

impl<E: Exchanger> Rfc2136Provider<E> {
    /// Build a provider sending through `exchanger`
    pub fn with_exchanger(config: ProviderConfig, exchanger: E) -> Result<Self> {
        config.validate()?;
        let signer = config.tsig_key()?.map(TsigSigner::new);

        info!(
            "RFC 2136 provider for {} ({:?}, TSIG {})",
            config.nameserver,
            config.protocol,
            signer
                .as_ref()
                .map(|s| s.key().name.as_str())
                .unwrap_or("disabled")
        );

        Ok(Self {
            state: Mutex::new(ProviderState {
                config,
                client: TransportClient::new(exchanger, signer),
            }),
        })
    }

    /// A copy of the configuration the provider runs with
    pub async fn config(&self) -> ProviderConfig {
        self.state.lock().await.config.clone()
    }

    async fn lock(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, ProviderState<E>>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled while waiting for the provider lock");
                Err(Rfc2136Error::Cancelled)
            }
            guard = self.state.lock() => Ok(guard),
        }
    }

    /// Apply `records` one transaction at a time, stopping at the first failure
    async fn apply(
        &self,
        zone: &str,
        records: &[Record],
        mode: UpdateMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        let state = self.lock(cancel).await?;
        let server = normalize(&state.config.nameserver);
        let mut applied = Vec::with_capacity(records.len());

        for record in records {
            if let Err(source) = apply_one(&state, zone, record, mode, &server, cancel).await {
                warn!(
                    "Failed to {} {} in {} after {} records: {}",
                    mode,
                    record,
                    zone,
                    applied.len(),
                    source
                );
                return Err(Rfc2136Error::Update {
                    operation: mode,
                    name: record.name.clone(),
                    rtype: record.rtype.clone(),
                    applied,
                    source: Box::new(source),
                });
            }
            applied.push(record.clone());
        }

        info!("{} {} records in {} via {}", mode, applied.len(), zone, server);
        Ok(applied)
    }
}

async fn apply_one<E: Exchanger>(
    state: &ProviderState<E>,
    zone: &str,
    record: &Record,
    mode: UpdateMode,
    server: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Rfc2136Error::Cancelled);
    }
    let transaction = build_transaction(zone, record, mode, state.config.owner_scope)?;
    state
        .client
        .send(transaction.to_packet(), server, cancel)
        .await?;
    debug!("Applied {} {}", mode, record);
    Ok(())
}

#[async_trait]
impl<E: Exchanger> RecordProvider for Rfc2136Provider<E> {
    async fn get_records(&self, zone: &str, cancel: &CancellationToken) -> Result<Vec<Record>> {
        let state = self.lock(cancel).await?;
        let server = normalize(&state.config.nameserver);

        let reply = state.client.send(build_query(zone), &server, cancel).await?;
        records_from_response(&reply)
    }

    async fn append_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        self.apply(zone, records, UpdateMode::Append, cancel).await
    }

    async fn set_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        self.apply(zone, records, UpdateMode::Set, cancel).await
    }

    async fn delete_records(
        &self,
        zone: &str,
        records: &[Record],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        self.apply(zone, records, UpdateMode::Delete, cancel).await
    }
}
