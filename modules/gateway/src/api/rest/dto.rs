//! Wire shapes for the gateway REST surface.
//!
//! DTOs stay decoupled from the discovery-layer types so the wire contract
//! can evolve independently. Payloads travel as JSON byte arrays.

use coordgate_discovery::{ConnectionConfig, InstanceKind, SelectionStrategy, ServiceInstance};
use serde::{Deserialize, Serialize};

/// Request body for opening a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionReq {
    /// Connection parameters; omitted fields take server defaults.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Response carrying a freshly minted session handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResp {
    pub session_id: String,
}

/// REST DTO for a service instance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceInstanceDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub port: u16,
    pub kind: InstanceKind,
}

impl From<ServiceInstance> for ServiceInstanceDto {
    fn from(inst: ServiceInstance) -> Self {
        Self {
            id: inst.id,
            name: inst.name,
            payload: inst.payload,
            port: inst.port,
            kind: inst.kind,
        }
    }
}

impl From<ServiceInstanceDto> for ServiceInstance {
    fn from(dto: ServiceInstanceDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            payload: dto.payload,
            port: dto.port,
            kind: dto.kind,
        }
    }
}

/// Request body for building an instance record for the calling process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MakeInstanceReq {
    pub name: String,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub port: u16,
}

/// Request body for starting a discovery registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartDiscoveryReq {
    pub base_path: String,
    /// Instance to advertise for the registry's lifetime, if any.
    #[serde(default)]
    pub self_instance: Option<ServiceInstanceDto>,
}

/// Request body for starting a provider over one service name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartProviderReq {
    pub discovery_id: String,
    pub service_name: String,
    #[serde(default)]
    pub strategy: SelectionStrategy,
    #[serde(default = "default_down_timeout_ms")]
    pub down_timeout_ms: u64,
    #[serde(default = "default_down_error_threshold")]
    pub down_error_threshold: u32,
}

fn default_down_timeout_ms() -> u64 {
    30_000
}

fn default_down_error_threshold() -> u32 {
    2
}

/// Response carrying a projected resource handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionResp {
    pub resource_id: String,
}

/// Request body for reporting an instance error to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoteErrorReq {
    pub instance_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_defaults() {
        let req: StartProviderReq = serde_json::from_str(
            r#"{"discovery_id":"d-1","service_name":"foo"}"#,
        )
        .unwrap();
        assert_eq!(req.strategy, SelectionStrategy::Random);
        assert_eq!(req.down_timeout_ms, 30_000);
        assert_eq!(req.down_error_threshold, 2);
    }

    #[test]
    fn strategy_uses_wire_names() {
        let req: StartProviderReq = serde_json::from_str(
            r#"{"discovery_id":"d-1","service_name":"foo","strategy":"STICKY_ROUND_ROBIN"}"#,
        )
        .unwrap();
        assert_eq!(req.strategy, SelectionStrategy::StickyRoundRobin);
    }

    #[test]
    fn instance_dto_round_trips_through_the_discovery_type() {
        let inst = ServiceInstance::new("web")
            .with_id("i1")
            .with_payload(b"m".to_vec())
            .with_port(8080);
        let dto = ServiceInstanceDto::from(inst.clone());
        let back = ServiceInstance::from(dto);
        assert_eq!(back.id, inst.id);
        assert_eq!(back.kind, inst.kind);
    }
}
