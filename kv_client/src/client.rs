//! This is the actual App.

use protocol::meta_store::{
    store_client::StoreClient, BatchDeleteRequest, BatchGetRequest, BatchPutRequest,
    CompareAndPutRequest, DeleteRangeRequest, MoveValueRequest, PutRequest, RangeRequest,
    RequestHeader,
};
use shared::key::{Key, KeyRange, UNBOUNDED_END};
use shared::retry::{ExponentialBackoff, Retry};
use shared::value::{KeyValue, Value};
use std::net::SocketAddr;
use thiserror::Error;
use tonic::transport::Channel;
use tracing::{info, instrument};

const CONNECT_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not connected to any server, use 'connect <address> <port>' first")]
    NotConnected,
    #[error("Could not connect: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("Server answered {}: {}", .0.code(), .0.message())]
    Status(#[from] tonic::Status),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// The pairs of a range read plus whether the server had more to give.
#[derive(Debug, PartialEq, Eq)]
pub struct RangeResult {
    pub kvs: Vec<KeyValue>,
    pub more: bool,
}

#[derive(Debug)]
pub struct Client {
    cluster_id: u64,
    member_id: u64,
    connection: Option<(SocketAddr, StoreClient<Channel>)>,
}

impl Client {
    pub fn new(cluster_id: u64, member_id: u64) -> Self {
        Self {
            cluster_id,
            member_id,
            connection: None,
        }
    }
    pub async fn connect(&mut self, addr: &SocketAddr) -> ClientResult<()> {
        let endpoint = format!("http://{}", addr);
        let retry = Retry::new(ExponentialBackoff::default());
        let client = retry
            .with_max_attempts(|| StoreClient::connect(endpoint.clone()), CONNECT_ATTEMPTS)
            .await?;
        info!("Connected to {}", addr);
        self.connection = Some((*addr, client));
        Ok(())
    }
    pub fn is_connected(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|(addr, _)| *addr)
    }
    pub fn disconnect(&mut self) -> ClientResult<SocketAddr> {
        let (addr, _) = self.connection.take().ok_or(ClientError::NotConnected)?;
        info!("Disconnected from {}", addr);
        Ok(addr)
    }
    fn header(&self) -> Option<RequestHeader> {
        Some(RequestHeader {
            cluster_id: self.cluster_id,
            member_id: self.member_id,
        })
    }
    fn store(&mut self) -> ClientResult<&mut StoreClient<Channel>> {
        self.connection
            .as_mut()
            .map(|(_, client)| client)
            .ok_or(ClientError::NotConnected)
    }

    #[instrument(skip(self))]
    pub async fn range(
        &mut self,
        range: &KeyRange,
        limit: Option<u32>,
        keys_only: bool,
    ) -> ClientResult<RangeResult> {
        let (key, range_end) = to_wire(range);
        let request = RangeRequest {
            header: self.header(),
            key,
            range_end,
            limit: limit.map_or(0, i64::from),
            keys_only,
        };
        let response = self.store()?.range(request).await?.into_inner();
        info!(count = response.kvs.len(), more = response.more, "received");
        Ok(RangeResult {
            kvs: response.kvs.into_iter().map(KeyValue::from).collect(),
            more: response.more,
        })
    }
    #[instrument(skip(self))]
    pub async fn put(&mut self, kv: KeyValue) -> ClientResult<Option<KeyValue>> {
        let request = PutRequest {
            header: self.header(),
            key: kv.key.into_bytes(),
            value: kv.value.into_bytes(),
            prev_kv: true,
        };
        let response = self.store()?.put(request).await?.into_inner();
        Ok(response.prev_kv.map(KeyValue::from))
    }
    #[instrument(skip(self))]
    pub async fn batch_get(&mut self, keys: Vec<Key>) -> ClientResult<Vec<KeyValue>> {
        let request = BatchGetRequest {
            header: self.header(),
            keys: keys.into_iter().map(Key::into_bytes).collect(),
        };
        let response = self.store()?.batch_get(request).await?.into_inner();
        Ok(response.kvs.into_iter().map(KeyValue::from).collect())
    }
    #[instrument(skip(self))]
    pub async fn batch_put(&mut self, kvs: Vec<KeyValue>) -> ClientResult<Vec<KeyValue>> {
        let request = BatchPutRequest {
            header: self.header(),
            kvs: kvs.into_iter().map(Into::into).collect(),
            prev_kv: true,
        };
        let response = self.store()?.batch_put(request).await?.into_inner();
        Ok(response.prev_kvs.into_iter().map(KeyValue::from).collect())
    }
    #[instrument(skip(self))]
    pub async fn batch_delete(&mut self, keys: Vec<Key>) -> ClientResult<Vec<KeyValue>> {
        let request = BatchDeleteRequest {
            header: self.header(),
            keys: keys.into_iter().map(Key::into_bytes).collect(),
            prev_kv: true,
        };
        let response = self.store()?.batch_delete(request).await?.into_inner();
        Ok(response.prev_kvs.into_iter().map(KeyValue::from).collect())
    }
    #[instrument(skip(self))]
    pub async fn compare_and_put(
        &mut self,
        key: Key,
        expect: Value,
        value: Value,
    ) -> ClientResult<(bool, Option<KeyValue>)> {
        let request = CompareAndPutRequest {
            header: self.header(),
            key: key.into_bytes(),
            expect: expect.into_bytes(),
            value: value.into_bytes(),
        };
        let response = self.store()?.compare_and_put(request).await?.into_inner();
        Ok((response.success, response.prev_kv.map(KeyValue::from)))
    }
    #[instrument(skip(self))]
    pub async fn delete_range(&mut self, range: &KeyRange) -> ClientResult<(i64, Vec<KeyValue>)> {
        let (key, range_end) = to_wire(range);
        let request = DeleteRangeRequest {
            header: self.header(),
            key,
            range_end,
            prev_kv: true,
        };
        let response = self.store()?.delete_range(request).await?.into_inner();
        Ok((
            response.deleted,
            response.prev_kvs.into_iter().map(KeyValue::from).collect(),
        ))
    }
    #[instrument(skip(self))]
    pub async fn move_value(&mut self, from_key: Key, to_key: Key) -> ClientResult<Option<KeyValue>> {
        let request = MoveValueRequest {
            header: self.header(),
            from_key: from_key.into_bytes(),
            to_key: to_key.into_bytes(),
        };
        let response = self.store()?.move_value(request).await?.into_inner();
        Ok(response.kv.map(KeyValue::from))
    }
}

/// Turns a range back into the `(key, range_end)` pair the server expects.
pub fn to_wire(range: &KeyRange) -> (Vec<u8>, Vec<u8>) {
    match range {
        KeyRange::Single(key) => (key.as_bytes().to_vec(), Vec::new()),
        KeyRange::From(start) if start.is_empty() => {
            (UNBOUNDED_END.to_vec(), UNBOUNDED_END.to_vec())
        }
        KeyRange::From(start) => (start.as_bytes().to_vec(), UNBOUNDED_END.to_vec()),
        KeyRange::Between { start, end } => (start.as_bytes().to_vec(), end.as_bytes().to_vec()),
    }
}
