//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Catalog synchronization and command translation core."
//! gw_version: "v0.0.0-prealpha"
//! gw_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;

use crate::descriptor::Register;
use crate::error::{GatewayError, Result};

/// Register storage owned by the host platform.
///
/// Registers are append-only: the gateway inserts each one once during
/// synchronization and never mutates it afterwards.
pub trait RegisterProvider: Send + Sync {
    fn insert_register(&mut self, register: Register) -> Result<()>;

    fn register_by_name(&self, name: &str) -> Option<Arc<Register>>;

    fn register_names(&self) -> Vec<String>;
}

/// Insertion-ordered in-memory register store.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    registers: IndexMap<String, Arc<Register>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.registers.values().map(Arc::as_ref)
    }
}

impl RegisterProvider for MemoryRegistry {
    fn insert_register(&mut self, register: Register) -> Result<()> {
        if self.registers.contains_key(register.name()) {
            return Err(GatewayError::Consistency(format!(
                "register name '{}' already in use",
                register.name()
            )));
        }
        self.registers
            .insert(register.name().to_owned(), Arc::new(register));
        Ok(())
    }

    fn register_by_name(&self, name: &str) -> Option<Arc<Register>> {
        self.registers.get(name).cloned()
    }

    fn register_names(&self) -> Vec<String> {
        self.registers.keys().cloned().collect()
    }
}
