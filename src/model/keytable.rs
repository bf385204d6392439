//! Key tables & bindings (§3; supplemented per SPEC_FULL.md §C).

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub key_code: String,
    pub command: String,
    pub repeatable: bool,
    pub dest_table: String,
}

#[derive(Debug, Clone)]
pub struct KeyTable {
    pub name: String,
    pub bindings: HashMap<String, KeyBinding>,
}

impl KeyTable {
    pub fn new(name: impl Into<String>) -> Self {
        KeyTable {
            name: name.into(),
            bindings: HashMap::new(),
        }
    }

    pub fn binding(&self, key_code: &str) -> Option<&KeyBinding> {
        self.bindings.get(key_code)
    }
}
