use std::time::Duration;

use rkyv::rancor;
use rkyv::util::AlignedVec;

use crate::command::Command;

use super::NetworkError;

pub const DEFAULT_PORT: u16 = 19014;
pub const DEFAULT_DISCOVERY_PORT: u16 = 19015;
pub const TICKS_PER_SECOND: u32 = 15;

pub fn tick_interval() -> Duration {
    Duration::from_secs(1) / TICKS_PER_SECOND
}

pub fn encode(command: &Command) -> Result<Vec<u8>, NetworkError> {
    rkyv::to_bytes::<rancor::Error>(command)
        .map(|aligned| aligned.into_vec())
        .map_err(NetworkError::Encode)
}

/// Decodes an archived command. The bytes are copied into an aligned buffer
/// first since frames come off the socket with no alignment guarantee.
pub fn decode(bytes: &[u8]) -> Result<Command, NetworkError> {
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<Command, rancor::Error>(&aligned).map_err(NetworkError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ApplicationCommand, EntitySnapshot, WorldCommand};
    use crate::sim::{EntityId, EntityKind};

    #[test]
    fn identifiers_survive_the_wire() {
        let id = EntityId::random();
        let owner = EntityId::random();
        let command: Command = WorldCommand::CreateActor {
            kind: EntityKind::Mine,
            id,
            x: 3.5,
            y: -8.0,
            rotation: 1.25,
            owner,
        }
        .into();

        let decoded = decode(&encode(&command).unwrap()).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(decoded.target(), Some(id));
    }

    #[test]
    fn decodes_from_unaligned_slice() {
        let command: Command = WorldCommand::SendMap {
            columns: 2,
            rows: 2,
            entities: vec![EntitySnapshot {
                kind: EntityKind::Grass,
                id: EntityId::random(),
                x: 0.0,
                y: 0.0,
                rotation: 0.0,
                owner: None,
            }],
        }
        .into();
        let bytes = encode(&command).unwrap();

        let mut shifted = vec![0u8; bytes.len() + 1];
        shifted[1..].copy_from_slice(&bytes);
        assert_eq!(decode(&shifted[1..]).unwrap(), command);
    }

    #[test]
    fn garbage_is_rejected() {
        let bytes = encode(&ApplicationCommand::chat("Alice", "hi").into()).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() / 2]),
            Err(NetworkError::Decode(_))
        ));
        assert!(decode(&[0xff; 3]).is_err());
    }

    #[test]
    fn fifteen_ticks_per_second() {
        assert_eq!(tick_interval().as_millis(), 66);
    }
}
