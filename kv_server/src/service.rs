//! The gRPC face of the store: translates protobuf messages into store
//! commands and back.
use crate::error::StoreError;
use crate::store::{Command, Output, Request as StoreRequest};
use protocol::meta_store::{
    store_server::Store as StoreRpc, BatchDeleteRequest, BatchDeleteResponse, BatchGetRequest,
    BatchGetResponse, BatchPutRequest, BatchPutResponse, CompareAndPutRequest,
    CompareAndPutResponse, DeleteRangeRequest, DeleteRangeResponse, KeyValue as PbKeyValue,
    MoveValueRequest, MoveValueResponse, PutRequest, PutResponse, RangeRequest, RangeResponse,
    RequestHeader, ResponseHeader,
};
use shared::envelope::Envelope;
use shared::key::{Key, KeyRange};
use shared::value::{KeyValue, Value};
use tokio::sync::mpsc;
use tonic::{Request, Response, Status};
use tracing::{instrument, trace};

#[derive(Debug, Clone)]
pub struct StoreService {
    cluster_id: u64,
    store_tx: mpsc::Sender<StoreRequest>,
}

impl StoreService {
    pub fn new(cluster_id: u64, store_tx: mpsc::Sender<StoreRequest>) -> Self {
        Self {
            cluster_id,
            store_tx,
        }
    }

    fn header(&self) -> Option<ResponseHeader> {
        Some(ResponseHeader {
            cluster_id: self.cluster_id,
        })
    }

    async fn execute(&self, header: Option<&RequestHeader>, cmd: Command) -> Result<Output, Status> {
        if let Some(header) = header {
            trace!(
                "Request from member {} of cluster {}",
                header.member_id,
                header.cluster_id
            );
        }
        let output = Envelope::send(cmd, &self.store_tx)
            .await
            .map_err(|_| StoreError::Unavailable)??;
        Ok(output)
    }
}

fn unexpected(output: Output) -> Status {
    Status::internal(format!("Unexpected store output: {:?}", output))
}

fn to_pb(kvs: Vec<KeyValue>) -> Vec<PbKeyValue> {
    kvs.into_iter().map(PbKeyValue::from).collect()
}

#[tonic::async_trait]
impl StoreRpc for StoreService {
    #[instrument(skip_all)]
    async fn range(
        &self,
        request: Request<RangeRequest>,
    ) -> Result<Response<RangeResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::Range {
            range: KeyRange::new(req.key, req.range_end),
            // zero or less means unlimited
            limit: usize::try_from(req.limit).ok().filter(|limit| *limit > 0),
            keys_only: req.keys_only,
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::Range { kvs, more } => Ok(Response::new(RangeResponse {
                header: self.header(),
                kvs: to_pb(kvs),
                more,
            })),
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::Put {
            kv: KeyValue::new(req.key, req.value),
            prev_kv: req.prev_kv,
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::Put(prev_kv) => Ok(Response::new(PutResponse {
                header: self.header(),
                prev_kv: prev_kv.map(PbKeyValue::from),
            })),
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn batch_get(
        &self,
        request: Request<BatchGetRequest>,
    ) -> Result<Response<BatchGetResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::BatchGet(req.keys.into_iter().map(Key::from).collect());
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::BatchGet(kvs) => Ok(Response::new(BatchGetResponse {
                header: self.header(),
                kvs: to_pb(kvs),
            })),
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn batch_put(
        &self,
        request: Request<BatchPutRequest>,
    ) -> Result<Response<BatchPutResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::BatchPut {
            kvs: req.kvs.into_iter().map(KeyValue::from).collect(),
            prev_kv: req.prev_kv,
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::BatchPut(prev_kvs) => Ok(Response::new(BatchPutResponse {
                header: self.header(),
                prev_kvs: to_pb(prev_kvs),
            })),
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn batch_delete(
        &self,
        request: Request<BatchDeleteRequest>,
    ) -> Result<Response<BatchDeleteResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::BatchDelete {
            keys: req.keys.into_iter().map(Key::from).collect(),
            prev_kv: req.prev_kv,
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::BatchDelete(prev_kvs) => Ok(Response::new(BatchDeleteResponse {
                header: self.header(),
                prev_kvs: to_pb(prev_kvs),
            })),
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn compare_and_put(
        &self,
        request: Request<CompareAndPutRequest>,
    ) -> Result<Response<CompareAndPutResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::CompareAndPut {
            key: Key::from(req.key),
            expect: Value::from(req.expect),
            value: Value::from(req.value),
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::CompareAndPut { success, prev_kv } => {
                Ok(Response::new(CompareAndPutResponse {
                    header: self.header(),
                    success,
                    prev_kv: prev_kv.map(PbKeyValue::from),
                }))
            }
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn delete_range(
        &self,
        request: Request<DeleteRangeRequest>,
    ) -> Result<Response<DeleteRangeResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::DeleteRange {
            range: KeyRange::new(req.key, req.range_end),
            prev_kv: req.prev_kv,
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::DeleteRange { deleted, prev_kvs } => Ok(Response::new(DeleteRangeResponse {
                header: self.header(),
                deleted: deleted as i64,
                prev_kvs: to_pb(prev_kvs),
            })),
            output => Err(unexpected(output)),
        }
    }

    #[instrument(skip_all)]
    async fn move_value(
        &self,
        request: Request<MoveValueRequest>,
    ) -> Result<Response<MoveValueResponse>, Status> {
        let req = request.into_inner();
        let cmd = Command::MoveValue {
            from_key: Key::from(req.from_key),
            to_key: Key::from(req.to_key),
        };
        match self.execute(req.header.as_ref(), cmd).await? {
            Output::MoveValue(kv) => Ok(Response::new(MoveValueResponse {
                header: self.header(),
                kv: kv.map(PbKeyValue::from),
            })),
            output => Err(unexpected(output)),
        }
    }
}
