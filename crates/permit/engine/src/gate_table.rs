//! Gate field table: which record each gate name reads and writes
//!
//! Gate advancement never branches on the gate name to find the fields it
//! updates. It looks the gate up here, so the mapping stays a single piece
//! of data.

use permit_types::{GateName, GateRecord, Gates};

/// Accessors for one gate's record inside [`Gates`]
pub struct GateField {
    pub gate: GateName,
    pub get: fn(&Gates) -> &GateRecord,
    pub get_mut: fn(&mut Gates) -> &mut GateRecord,
}

impl std::fmt::Debug for GateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateField").field("gate", &self.gate).finish()
    }
}

fn iss(gates: &Gates) -> &GateRecord {
    &gates.iss
}

fn iss_mut(gates: &mut Gates) -> &mut GateRecord {
    &mut gates.iss
}

fn hod(gates: &Gates) -> &GateRecord {
    &gates.hod
}

fn hod_mut(gates: &mut Gates) -> &mut GateRecord {
    &mut gates.hod
}

fn qa(gates: &Gates) -> &GateRecord {
    &gates.qa
}

fn qa_mut(gates: &mut Gates) -> &mut GateRecord {
    &mut gates.qa
}

/// Indexed by [`GateName::index`], in gate order
pub static GATE_FIELDS: [GateField; 3] = [
    GateField {
        gate: GateName::Iss,
        get: iss,
        get_mut: iss_mut,
    },
    GateField {
        gate: GateName::Hod,
        get: hod,
        get_mut: hod_mut,
    },
    GateField {
        gate: GateName::Qa,
        get: qa,
        get_mut: qa_mut,
    },
];

pub fn gate_field(gate: GateName) -> &'static GateField {
    &GATE_FIELDS[gate.index()]
}

pub fn gate_record(gates: &Gates, gate: GateName) -> &GateRecord {
    (gate_field(gate).get)(gates)
}

pub fn gate_record_mut(gates: &mut Gates, gate: GateName) -> &mut GateRecord {
    (gate_field(gate).get_mut)(gates)
}

/// First gate, in order, whose status is still `Pending`
pub fn first_pending(gates: &Gates) -> Option<GateName> {
    GATE_FIELDS
        .iter()
        .find(|field| (field.get)(gates).is_pending())
        .map(|field| field.gate)
}
