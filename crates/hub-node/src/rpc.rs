//! RPC surface
//!
//! The wire types and the service trait the gRPC binding implements
//! against. The trait mirrors what tonic's codegen would produce; binding
//! it to a listener is the server collaborator's concern. Returned hashes
//! are hex-lowercase strings, prefixes are raw bytes.
//!
//! [`ServiceSyncClient`] adapts any [`HubService`] back into the sync
//! engine's [`PeerSyncClient`], which is how two in-process hubs - or a
//! remote channel wrapped in the same trait - are driven by diff sync.

use async_trait::async_trait;
use std::sync::Arc;
use tonic::{Request, Response, Status};

use hub_core::error::{ErrorClass, HubError};
use hub_core::message::Message;
use hub_sync::engine::{HubInfo, PeerSyncClient};
use hub_sync::{NodeMetadata, SyncId, TrieSnapshot};

use crate::hub::Hub;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetInfoResponse {
    #[prost(string, tag = "1")]
    pub version: String,
    #[prost(bool, tag = "2")]
    pub is_synced: bool,
    #[prost(string, tag = "3")]
    pub nickname: String,
    #[prost(string, tag = "4")]
    pub root_hash: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TrieNodePrefix {
    #[prost(bytes = "vec", tag = "1")]
    pub prefix: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SyncIds {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub sync_ids: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TrieNodeMetadataResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub prefix: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub num_messages: u64,
    #[prost(string, tag = "3")]
    pub hash: String,
    #[prost(message, repeated, tag = "4")]
    pub children: Vec<TrieNodeMetadataResponse>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TrieNodeSnapshotResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub prefix: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub excluded_hashes: Vec<String>,
    #[prost(uint64, tag = "3")]
    pub num_messages: u64,
    #[prost(string, tag = "4")]
    pub root_hash: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessagesResponse {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Message>,
}

/// The sync RPC service, shaped like tonic codegen output
#[async_trait]
pub trait HubService: Send + Sync + 'static {
    async fn get_info(
        &self,
        request: Request<GetInfoRequest>,
    ) -> Result<Response<GetInfoResponse>, Status>;

    async fn get_all_sync_ids_by_prefix(
        &self,
        request: Request<TrieNodePrefix>,
    ) -> Result<Response<SyncIds>, Status>;

    async fn get_all_messages_by_sync_ids(
        &self,
        request: Request<SyncIds>,
    ) -> Result<Response<MessagesResponse>, Status>;

    async fn get_sync_metadata_by_prefix(
        &self,
        request: Request<TrieNodePrefix>,
    ) -> Result<Response<TrieNodeMetadataResponse>, Status>;

    async fn get_sync_snapshot_by_prefix(
        &self,
        request: Request<TrieNodePrefix>,
    ) -> Result<Response<TrieNodeSnapshotResponse>, Status>;
}

/// Service implementation over a hub
pub struct HubServiceHandler {
    hub: Arc<Hub>,
}

impl HubServiceHandler {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

fn metadata_response(meta: &NodeMetadata) -> TrieNodeMetadataResponse {
    TrieNodeMetadataResponse {
        prefix: meta.prefix.clone(),
        num_messages: meta.num_messages as u64,
        hash: hex::encode(meta.hash),
        children: meta.children.iter().map(metadata_response).collect(),
    }
}

#[async_trait]
impl HubService for HubServiceHandler {
    async fn get_info(
        &self,
        _request: Request<GetInfoRequest>,
    ) -> Result<Response<GetInfoResponse>, Status> {
        let info = self.hub.info();
        Ok(Response::new(GetInfoResponse {
            version: info.version,
            is_synced: info.is_synced,
            nickname: info.nickname,
            root_hash: info.root_hash,
        }))
    }

    async fn get_all_sync_ids_by_prefix(
        &self,
        request: Request<TrieNodePrefix>,
    ) -> Result<Response<SyncIds>, Status> {
        let prefix = request.into_inner().prefix;
        let sync_ids = self
            .hub
            .sync_ids_by_prefix(&prefix)
            .into_iter()
            .map(|id| id.to_vec())
            .collect();
        Ok(Response::new(SyncIds { sync_ids }))
    }

    async fn get_all_messages_by_sync_ids(
        &self,
        request: Request<SyncIds>,
    ) -> Result<Response<MessagesResponse>, Status> {
        let raw = request.into_inner().sync_ids;
        let mut ids = Vec::with_capacity(raw.len());
        for bytes in &raw {
            ids.push(
                SyncId::from_bytes(bytes)
                    .map_err(|e| Status::invalid_argument(e.to_string()))?,
            );
        }
        Ok(Response::new(MessagesResponse {
            messages: self.hub.messages_by_sync_ids(&ids),
        }))
    }

    async fn get_sync_metadata_by_prefix(
        &self,
        request: Request<TrieNodePrefix>,
    ) -> Result<Response<TrieNodeMetadataResponse>, Status> {
        let prefix = request.into_inner().prefix;
        Ok(Response::new(metadata_response(&self.hub.metadata(&prefix))))
    }

    async fn get_sync_snapshot_by_prefix(
        &self,
        request: Request<TrieNodePrefix>,
    ) -> Result<Response<TrieNodeSnapshotResponse>, Status> {
        let prefix = request.into_inner().prefix;
        let snapshot = self.hub.snapshot(&prefix);
        Ok(Response::new(TrieNodeSnapshotResponse {
            prefix: snapshot.prefix,
            excluded_hashes: snapshot.excluded_hashes.iter().map(hex::encode).collect(),
            num_messages: snapshot.num_messages as u64,
            root_hash: hex::encode(snapshot.root_hash),
        }))
    }
}

/// Map a hub error onto a gRPC status
pub fn status_from_error(err: &HubError) -> Status {
    match err.class() {
        ErrorClass::Rejection => Status::invalid_argument(err.to_string()),
        ErrorClass::Transient => Status::unavailable(err.to_string()),
        ErrorClass::Integrity => Status::failed_precondition(err.to_string()),
        ErrorClass::Fatal => Status::internal(err.to_string()),
    }
}

fn error_from_status(status: Status) -> HubError {
    match status.code() {
        tonic::Code::DeadlineExceeded => HubError::RpcTimeout,
        tonic::Code::Unavailable => HubError::RpcUnavailable(status.message().to_string()),
        _ => HubError::RpcUnavailable(format!("{:?}: {}", status.code(), status.message())),
    }
}

fn decode_digest(text: &str) -> Result<[u8; 20], HubError> {
    let bytes = hex::decode(text)
        .map_err(|_| HubError::MalformedBytes("hash must be hex".into()))?;
    bytes
        .try_into()
        .map_err(|_| HubError::MalformedBytes("hash must be 20 bytes".into()))
}

/// Drive any [`HubService`] as a sync peer
pub struct ServiceSyncClient<S: HubService> {
    service: Arc<S>,
}

impl<S: HubService> ServiceSyncClient<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: HubService> PeerSyncClient for ServiceSyncClient<S> {
    async fn get_info(&self) -> Result<HubInfo, HubError> {
        let response = self
            .service
            .get_info(Request::new(GetInfoRequest {}))
            .await
            .map_err(error_from_status)?
            .into_inner();
        Ok(HubInfo {
            version: response.version,
            is_synced: response.is_synced,
            nickname: response.nickname,
            root_hash: response.root_hash,
        })
    }

    async fn get_snapshot(&self, prefix: &[u8]) -> Result<TrieSnapshot, HubError> {
        let response = self
            .service
            .get_sync_snapshot_by_prefix(Request::new(TrieNodePrefix {
                prefix: prefix.to_vec(),
            }))
            .await
            .map_err(error_from_status)?
            .into_inner();

        let mut excluded_hashes = Vec::with_capacity(response.excluded_hashes.len());
        for text in &response.excluded_hashes {
            excluded_hashes.push(decode_digest(text)?);
        }
        Ok(TrieSnapshot {
            prefix: response.prefix,
            excluded_hashes,
            num_messages: response.num_messages as usize,
            root_hash: decode_digest(&response.root_hash)?,
        })
    }

    async fn get_metadata(&self, prefix: &[u8]) -> Result<NodeMetadata, HubError> {
        let response = self
            .service
            .get_sync_metadata_by_prefix(Request::new(TrieNodePrefix {
                prefix: prefix.to_vec(),
            }))
            .await
            .map_err(error_from_status)?
            .into_inner();

        fn convert(node: &TrieNodeMetadataResponse) -> Result<NodeMetadata, HubError> {
            let mut children = Vec::with_capacity(node.children.len());
            for child in &node.children {
                children.push(convert(child)?);
            }
            Ok(NodeMetadata {
                prefix: node.prefix.clone(),
                num_messages: node.num_messages as usize,
                hash: decode_digest(&node.hash)?,
                children,
            })
        }
        convert(&response)
    }

    async fn get_sync_ids(&self, prefix: &[u8]) -> Result<Vec<SyncId>, HubError> {
        let response = self
            .service
            .get_all_sync_ids_by_prefix(Request::new(TrieNodePrefix {
                prefix: prefix.to_vec(),
            }))
            .await
            .map_err(error_from_status)?
            .into_inner();
        response
            .sync_ids
            .iter()
            .map(|bytes| SyncId::from_bytes(bytes))
            .collect()
    }

    async fn get_messages(&self, ids: &[SyncId]) -> Result<Vec<Message>, HubError> {
        let response = self
            .service
            .get_all_messages_by_sync_ids(Request::new(SyncIds {
                sync_ids: ids.iter().map(|id| id.to_vec()).collect(),
            }))
            .await
            .map_err(error_from_status)?
            .into_inner();
        Ok(response.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use hub_core::factory::{self, Fixtures};
    use hub_storage::{IdRegistryEvent, IdRegistryEventType, StoreLimits};

    fn hub_with_messages() -> Arc<Hub> {
        let fx = Fixtures::new();
        let mut config = HubConfig::devnet();
        config.limits = StoreLimits::unlimited();
        let hub = Hub::new(config).unwrap();
        hub.apply_id_registry_event(&IdRegistryEvent {
            fid: 1,
            to: fx.custody_address(),
            event_type: IdRegistryEventType::Register,
            block_number: 1,
            log_index: 0,
        })
        .unwrap();
        hub.submit_message_at(factory::signer_add(&fx, 1, 100), 1_000)
            .unwrap();
        hub.submit_message_at(factory::cast_add(&fx, 1, 200, "hi"), 1_000)
            .unwrap();
        hub
    }

    #[tokio::test]
    async fn test_info_reports_root() {
        let hub = hub_with_messages();
        let handler = HubServiceHandler::new(hub.clone());

        let response = handler
            .get_info(Request::new(GetInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.root_hash, hex::encode(hub.root_hash()));
        assert_eq!(response.root_hash.len(), 40);
    }

    #[tokio::test]
    async fn test_sync_ids_and_messages_roundtrip() {
        let hub = hub_with_messages();
        let handler = Arc::new(HubServiceHandler::new(hub.clone()));
        let client = ServiceSyncClient::new(handler);

        let ids = client.get_sync_ids(&[]).await.unwrap();
        assert_eq!(ids.len(), 2);

        let messages = client.get_messages(&ids).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_roundtrips_through_hex() {
        let hub = hub_with_messages();
        let handler = Arc::new(HubServiceHandler::new(hub.clone()));
        let client = ServiceSyncClient::new(handler);

        let direct = hub.snapshot(b"00000");
        let via_rpc = client.get_snapshot(b"00000").await.unwrap();
        assert_eq!(via_rpc, direct);
    }

    #[tokio::test]
    async fn test_malformed_sync_id_rejected() {
        let hub = hub_with_messages();
        let handler = HubServiceHandler::new(hub);

        let status = handler
            .get_all_messages_by_sync_ids(Request::new(SyncIds {
                sync_ids: vec![vec![1, 2, 3]],
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
}
