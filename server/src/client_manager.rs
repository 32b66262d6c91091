//! Player slot registry for the two-seat server
//!
//! This module tracks which endpoints hold the two player slots and what each
//! of them has signalled since the last simulation step:
//! - Slot allocation on first contact, capped at two endpoints
//! - Ready and reset acknowledgement flags for the match handshakes
//! - Input buffering between ticks, keeping jump presses as edges and crouch
//!   as held state
//!
//! Endpoints are identified only by source address and port. There is no
//! authentication, so two players behind one NAT mapping would alias.

use log::info;
use shared::MAX_CLIENTS;
use std::net::SocketAddr;

/// Input buffered for one slot until the next tick consumes it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingInput {
    /// Jump pressed at least once since the last tick
    pub jump: bool,
    /// Most recently reported crouch state
    pub crouch: bool,
}

impl PendingInput {
    /// Folds one more input report into the buffer
    ///
    /// Jump presses are OR-combined so that several datagrams arriving within
    /// one tick never lose a press. Crouch is a held state, the latest report
    /// wins.
    pub fn merge(&mut self, jump: bool, crouch: bool) {
        self.jump |= jump;
        self.crouch = crouch;
    }
}

/// One player seat bound to a network endpoint
#[derive(Debug)]
pub struct ClientSlot {
    /// Player number minus one
    pub index: usize,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Sent `Listo`
    pub ready: bool,
    /// Sent `RESET` after the current match ended
    pub reset_ready: bool,
    /// Input waiting for the next tick
    pub input: PendingInput,
}

impl ClientSlot {
    pub fn new(index: usize, addr: SocketAddr) -> Self {
        Self {
            index,
            addr,
            ready: false,
            reset_ready: false,
            input: PendingInput::default(),
        }
    }
}

/// Outcome of a connection request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new slot was allocated
    Accepted(usize),
    /// The endpoint already holds this slot
    AlreadyConnected(usize),
    /// Both slots are taken by other endpoints
    Full,
}

/// Owns the player slots
///
/// Slots are allocated in order and never released while the process runs.
/// They are reused from one match to the next.
#[derive(Debug, Default)]
pub struct ClientManager {
    slots: Vec<ClientSlot>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_CLIENTS),
        }
    }

    /// Acknowledges a connection request
    ///
    /// Idempotent for endpoints that already hold a slot. A request that finds
    /// both slots taken leaves the registry untouched.
    pub fn register_or_ack(&mut self, addr: SocketAddr) -> Registration {
        if let Some(index) = self.find_client_by_addr(addr) {
            return Registration::AlreadyConnected(index);
        }

        if self.slots.len() >= MAX_CLIENTS {
            return Registration::Full;
        }

        let index = self.slots.len();
        self.slots.push(ClientSlot::new(index, addr));
        info!(
            "Client {} connected from {} ({}/{})",
            index + 1,
            addr,
            self.slots.len(),
            MAX_CLIENTS
        );

        Registration::Accepted(index)
    }

    /// Finds the slot index held by a network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.addr == addr)
            .map(|slot| slot.index)
    }

    /// Marks the endpoint's slot as ready
    ///
    /// Returns None for unknown endpoints, otherwise whether every seat is now
    /// taken and ready.
    pub fn mark_ready(&mut self, addr: SocketAddr) -> Option<bool> {
        let index = self.find_client_by_addr(addr)?;
        let slot = &mut self.slots[index];
        if !slot.ready {
            slot.ready = true;
            info!("Client {} ready", index + 1);
        }
        Some(self.all_ready())
    }

    /// Records a reset acknowledgement
    ///
    /// Returns None for unknown endpoints, otherwise the number of slots that
    /// have acknowledged so far.
    pub fn mark_reset_ready(&mut self, addr: SocketAddr) -> Option<usize> {
        let index = self.find_client_by_addr(addr)?;
        self.slots[index].reset_ready = true;
        let count = self.reset_ack_count();
        info!(
            "Client {} ready for reset ({}/{})",
            index + 1,
            count,
            MAX_CLIENTS
        );
        Some(count)
    }

    /// Buffers one input report for a slot
    ///
    /// Returns false if the slot does not exist.
    pub fn accumulate_input(&mut self, index: usize, jump: bool, crouch: bool) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.input.merge(jump, crouch);
                true
            }
            None => false,
        }
    }

    /// Hands the buffered input of both seats to the simulation
    ///
    /// Jump edges are consumed, crouch states stay until the next report.
    /// Empty seats report no input.
    pub fn take_inputs(&mut self) -> [PendingInput; MAX_CLIENTS] {
        let mut inputs = [PendingInput::default(); MAX_CLIENTS];
        for slot in &mut self.slots {
            inputs[slot.index] = slot.input;
            slot.input.jump = false;
        }
        inputs
    }

    /// Drops all buffered input, held crouch included
    pub fn clear_inputs(&mut self) {
        for slot in &mut self.slots {
            slot.input = PendingInput::default();
        }
    }

    pub fn clear_reset_flags(&mut self) {
        for slot in &mut self.slots {
            slot.reset_ready = false;
        }
    }

    pub fn reset_ack_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.reset_ready).count()
    }

    /// True when both seats are taken and ready
    pub fn all_ready(&self) -> bool {
        self.slots.len() == MAX_CLIENTS && self.slots.iter().all(|slot| slot.ready)
    }

    /// True when both seats are taken and acknowledged a reset
    pub fn all_reset_ready(&self) -> bool {
        self.slots.len() == MAX_CLIENTS && self.slots.iter().all(|slot| slot.reset_ready)
    }

    /// Gets the addresses of all seated clients, in slot order
    pub fn get_client_addrs(&self) -> Vec<SocketAddr> {
        self.slots.iter().map(|slot| slot.addr).collect()
    }

    pub fn slots(&self) -> &[ClientSlot] {
        &self.slots
    }

    /// Returns the number of seated clients
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no client has connected yet
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
