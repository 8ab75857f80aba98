//! Deterministic port derivation.
//!
//! Every program on a host owns one slot (1..=10). Each system id (1..=10)
//! gets one port per slot, so independent programs never contend for a port
//! and no coordination is needed to find one another.

use std::ops::RangeInclusive;

/// Base of the multicast advertisement ports.
pub const ADVERTISEMENT_BASE_PORT: u16 = 30000;
/// Base of the direct message ports.
pub const DIRECT_BASE_PORT: u16 = 31000;

pub const PROGRAM_SLOTS: RangeInclusive<u8> = 1..=10;
pub const SYSTEM_IDS: RangeInclusive<u32> = 1..=10;

/// Port owned by `program_slot` within `system_id`, relative to `base`.
pub fn port_for_slot_and_system(
    base: u16,
    program_slot: u8,
    system_id: u32,
) -> Result<u16, PortError> {
    if !PROGRAM_SLOTS.contains(&program_slot) {
        return Err(PortError::SlotOutOfRange(program_slot));
    }
    if !SYSTEM_IDS.contains(&system_id) {
        return Err(PortError::SystemOutOfRange(system_id));
    }
    // system_id - 1 < 10 and slot * 10 <= 100, so this stays within base + 109.
    let offset = u16::from(program_slot) * 10 + (system_id - 1) as u16;
    base.checked_add(offset).ok_or(PortError::Overflow { base, offset })
}

pub fn advertisement_port(program_slot: u8, system_id: u32) -> Result<u16, PortError> {
    port_for_slot_and_system(ADVERTISEMENT_BASE_PORT, program_slot, system_id)
}

pub fn direct_port(program_slot: u8, system_id: u32) -> Result<u16, PortError> {
    port_for_slot_and_system(DIRECT_BASE_PORT, program_slot, system_id)
}

/// All ten slot ports of `system_id`, in slot order.
pub fn ports_for_system(base: u16, system_id: u32) -> Result<Vec<u16>, PortError> {
    PROGRAM_SLOTS
        .map(|slot| port_for_slot_and_system(base, slot, system_id))
        .collect()
}

pub fn advertisement_ports(system_id: u32) -> Result<Vec<u16>, PortError> {
    ports_for_system(ADVERTISEMENT_BASE_PORT, system_id)
}

pub fn direct_ports(system_id: u32) -> Result<Vec<u16>, PortError> {
    ports_for_system(DIRECT_BASE_PORT, system_id)
}

/// The port this process owns, given its own program slot.
pub fn port_for_system(base: u16, system_id: u32, program_slot: u8) -> Result<u16, PortError> {
    port_for_slot_and_system(base, program_slot, system_id)
}

/// Direct port of the program that owns `advertisement_port`.
pub fn direct_port_for(advertisement_port: u16) -> Option<u16> {
    let offset = advertisement_port.checked_sub(ADVERTISEMENT_BASE_PORT)?;
    let slot = offset / 10;
    let system = offset % 10;
    if !PROGRAM_SLOTS.contains(&u8::try_from(slot).ok()?) {
        return None;
    }
    direct_port(slot as u8, u32::from(system) + 1).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("program slot {0} is outside 1..=10")]
    SlotOutOfRange(u8),
    #[error("system id {0} is outside 1..=10")]
    SystemOutOfRange(u32),
    #[error("base port {base} + {offset} overflows")]
    Overflow { base: u16, offset: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn known_ports() {
        assert_eq!(advertisement_port(1, 1), Ok(30010));
        assert_eq!(advertisement_port(2, 1), Ok(30020));
        assert_eq!(advertisement_port(1, 2), Ok(30011));
        assert_eq!(direct_port(1, 1), Ok(31010));
    }

    #[test]
    fn ten_distinct_ports_per_system() {
        let mut seen = HashSet::new();
        for system in SYSTEM_IDS {
            let ports = advertisement_ports(system).unwrap();
            assert_eq!(ports.len(), 10);
            for port in ports {
                assert!(seen.insert(port), "port {port} reused");
            }
        }
        let direct: HashSet<_> = (1..=10).flat_map(|s| direct_ports(s).unwrap()).collect();
        assert!(direct.is_disjoint(&seen));
    }

    #[test]
    fn out_of_range_rejected() {
        assert_eq!(advertisement_port(0, 1), Err(PortError::SlotOutOfRange(0)));
        assert_eq!(advertisement_port(11, 1), Err(PortError::SlotOutOfRange(11)));
        assert_eq!(advertisement_port(1, 0), Err(PortError::SystemOutOfRange(0)));
        assert_eq!(
            port_for_slot_and_system(65500, 10, 10),
            Err(PortError::Overflow {
                base: 65500,
                offset: 109
            })
        );
    }

    #[test]
    fn direct_counterpart() {
        assert_eq!(direct_port_for(30042), Some(31042));
        assert_eq!(direct_port_for(30005), None);
        assert_eq!(direct_port_for(30110), None);
        assert_eq!(direct_port_for(8080), None);
    }

    #[test]
    fn own_slot_lookup() {
        assert_eq!(port_for_system(ADVERTISEMENT_BASE_PORT, 3, 4), Ok(30042));
    }
}
