//! Node and beacon endpoints served by the shipped binary.
//!
//! Upstream integers are protobuf `uint64`s and arrive as JSON strings, so
//! they are declared as strings here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::gateway::{
    BoxedError, DefaultError, Endpoint, ExtendedError, HookAction, ProxyRequest, QueryParam, RegistryFactory,
};
use crate::payload::{Payload, Shape};

pub const GENESIS_PATH: &str = "/eth/v1/beacon/genesis";
pub const NODE_VERSION_PATH: &str = "/eth/v1/node/version";
pub const BLOCK_HEADER_PATH: &str = "/eth/v1/beacon/headers/{block_id}";
pub const STATE_VALIDATORS_PATH: &str = "/eth/v1/beacon/states/{state_id}/validators";
pub const ATTESTATION_POOL_PATH: &str = "/eth/v1/beacon/pool/attestations";

/// One rejected item of a batch submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexedFailure {
    pub index: u64,
    pub message: String,
}

/// Extension fields of a batch submission error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexedFailures {
    pub failures: Vec<IndexedFailure>,
}

pub type IndexedVerificationError = ExtendedError<IndexedFailures>;

struct Shapes {
    genesis: Arc<Shape>,
    version: Arc<Shape>,
    header: Arc<Shape>,
    validators: Arc<Shape>,
    attestations: Arc<Shape>,
    empty: Arc<Shape>,
}

fn data(name: &str, inner: &Arc<Shape>) -> Arc<Shape> {
    Shape::new(name).object("data", inner).build()
}

fn data_list(name: &str, item: &Arc<Shape>) -> Arc<Shape> {
    Shape::new(name).array_of("data", item).build()
}

impl Shapes {
    fn build() -> Self {
        let genesis = Shape::new("Genesis")
            .time("genesis_time")
            .hex("genesis_validators_root")
            .hex("genesis_fork_version")
            .build();

        let version = Shape::new("Version").string("version").build();

        let header_message = Shape::new("BeaconBlockHeader")
            .string("slot")
            .string("proposer_index")
            .hex("parent_root")
            .hex("state_root")
            .hex("body_root")
            .build();
        let signed_header = Shape::new("SignedBeaconBlockHeader")
            .object("message", &header_message)
            .hex("signature")
            .build();
        let header_container = Shape::new("BlockHeaderContainer")
            .hex("root")
            .boolean("canonical")
            .object("header", &signed_header)
            .build();

        let validator = Shape::new("Validator")
            .hex("pubkey")
            .hex("withdrawal_credentials")
            .string("effective_balance")
            .boolean("slashed")
            .string("activation_eligibility_epoch")
            .string("activation_epoch")
            .string("exit_epoch")
            .string("withdrawable_epoch")
            .build();
        let validator_container = Shape::new("ValidatorContainer")
            .string("index")
            .string("balance")
            .enumeration("status")
            .object("validator", &validator)
            .build();

        let checkpoint = Shape::new("Checkpoint").string("epoch").hex("root").build();
        let attestation_data = Shape::new("AttestationData")
            .string("slot")
            .string("index")
            .hex("beacon_block_root")
            .object("source", &checkpoint)
            .object("target", &checkpoint)
            .build();
        let attestation = Shape::new("Attestation")
            .hex("aggregation_bits")
            .object("data", &attestation_data)
            .hex("signature")
            .build();

        Self {
            genesis: data("GenesisResponse", &genesis),
            version: data("VersionResponse", &version),
            header: data("BlockHeaderResponse", &header_container),
            validators: data_list("StateValidatorsResponse", &validator_container),
            attestations: data_list("AttestationsPool", &attestation),
            empty: Shape::new("Empty").build(),
        }
    }
}

/// The REST API accepts a bare attestation array; the gateway wants it
/// under `data`.
fn wrap_attestations_array(_: &mut Endpoint, request: &mut ProxyRequest) -> Result<HookAction, BoxedError> {
    let starts_with_array = request
        .body
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'[');
    if !starts_with_array {
        return Ok(HookAction::RunDefault);
    }

    let items: Value = serde_json::from_slice(&request.body)
        .map_err(|e| Box::new(DefaultError::internal_server_error(e, "could not decode body")) as BoxedError)?;
    let wrapped = serde_json::to_vec(&json!({ "data": items }))
        .map_err(|e| Box::new(DefaultError::internal_server_error(e, "could not marshal wrapped body")) as BoxedError)?;
    request.set_body(wrapped);
    Ok(HookAction::RunDefault)
}

/// Factory for the node/beacon endpoint set.
pub fn beacon_factory() -> RegistryFactory {
    let shapes = Arc::new(Shapes::build());

    let s = shapes.clone();
    let genesis = move || {
        let mut e = Endpoint::new(GENESIS_PATH);
        e.get_response = Some(Payload::new(s.genesis.clone()));
        e
    };

    let s = shapes.clone();
    let version = move || {
        let mut e = Endpoint::new(NODE_VERSION_PATH);
        e.get_response = Some(Payload::new(s.version.clone()));
        e
    };

    let s = shapes.clone();
    let header = move || {
        let mut e = Endpoint::new(BLOCK_HEADER_PATH);
        e.get_response = Some(Payload::new(s.header.clone()));
        e
    };

    let s = shapes.clone();
    let validators = move || {
        let mut e = Endpoint::new(STATE_VALIDATORS_PATH);
        e.get_response = Some(Payload::new(s.validators.clone()));
        e.request_url_literals = vec!["state_id".to_string()];
        e.request_query_params = vec![QueryParam::hex("id"), QueryParam::enumeration("status")];
        e
    };

    let s = shapes;
    let attestations = move || {
        let mut e = Endpoint::new(ATTESTATION_POOL_PATH);
        e.get_response = Some(Payload::new(s.attestations.clone()));
        e.post_request = Some(Payload::new(s.attestations.clone()));
        e.post_response = Some(Payload::new(s.empty.clone()));
        e.request_query_params = vec![QueryParam::new("slot", false, false)];
        e.err = Box::new(IndexedVerificationError::default());
        e.hooks.on_pre_deserialize_request_body = Some(Arc::new(wrap_attestations_array));
        e
    };

    RegistryFactory::new()
        .register(GENESIS_PATH, genesis)
        .register(NODE_VERSION_PATH, version)
        .register(BLOCK_HEADER_PATH, header)
        .register(STATE_VALIDATORS_PATH, validators)
        .register(ATTESTATION_POOL_PATH, attestations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::dispatch::handle_post_request_body;
    use crate::gateway::EndpointFactory;
    use crate::payload::{process_response_fields, DecodeMode};
    use axum::http::{Method, Uri};

    #[test]
    fn test_paths() {
        assert_eq!(
            beacon_factory().paths(),
            vec![
                GENESIS_PATH,
                NODE_VERSION_PATH,
                BLOCK_HEADER_PATH,
                STATE_VALIDATORS_PATH,
                ATTESTATION_POOL_PATH
            ]
        );
    }

    #[test]
    fn test_genesis_response_processing() {
        let mut endpoint = beacon_factory().create(GENESIS_PATH).unwrap();
        let container = endpoint.get_response.as_mut().unwrap();
        container
            .decode(
                br#"{"data":{"genesis_time":"2020-12-01T12:00:23Z","genesis_validators_root":"S7sEkqbo","genesis_fork_version":"AAAAAA=="}}"#,
                DecodeMode::Lenient,
            )
            .unwrap();
        process_response_fields(container).unwrap();

        let out: Value = serde_json::from_slice(&container.encode().unwrap()).unwrap();
        assert_eq!(
            out,
            json!({"data": {
                "genesis_time": "1606824023",
                "genesis_validators_root": "0x4bbb0492a6e8",
                "genesis_fork_version": "0x00000000"
            }})
        );
    }

    #[test]
    fn test_validator_status_is_lowercased() {
        let mut endpoint = beacon_factory().create(STATE_VALIDATORS_PATH).unwrap();
        let container = endpoint.get_response.as_mut().unwrap();
        container
            .decode(
                br#"{"data":[{"index":"1","balance":"32","status":"ACTIVE_ONGOING","validator":{"pubkey":"Zm9v"}}]}"#,
                DecodeMode::Lenient,
            )
            .unwrap();
        process_response_fields(container).unwrap();
        assert_eq!(container.value()["data"][0]["status"], "active_ongoing");
        assert_eq!(container.value()["data"][0]["validator"]["pubkey"], "0x666f6f");
    }

    #[test]
    fn test_bare_attestation_array_is_wrapped() {
        let mut endpoint = beacon_factory().create(ATTESTATION_POOL_PATH).unwrap();
        let mut request = ProxyRequest::new(
            Method::POST,
            Uri::from_static(ATTESTATION_POOL_PATH),
            r#" [{"aggregation_bits":"0x01","signature":"0x666f6f"}]"#,
        );
        handle_post_request_body(&mut endpoint, &mut request).unwrap();

        let sent: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(sent["data"][0]["aggregation_bits"], "AQ==");
        assert_eq!(sent["data"][0]["signature"], "Zm9v");
        assert_eq!(sent["data"][0]["data"], Value::Null);
    }

    #[test]
    fn test_attestation_error_carries_failures() {
        let mut endpoint = beacon_factory().create(ATTESTATION_POOL_PATH).unwrap();
        endpoint
            .err
            .merge_json(br#"{"message":"some failed","code":400,"failures":[{"index":2,"message":"bad sig"}]}"#)
            .unwrap();
        let json: Value = serde_json::from_slice(&endpoint.err.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"message": "some failed", "code": 400, "failures": [{"index": 2, "message": "bad sig"}]})
        );
    }
}
