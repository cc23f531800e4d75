//! Named global slots, addressed by integer index in the bytecode.

use super::result::{RuntimeErr, RuntimeErrKind};
use super::value::Value;

#[derive(Clone, Debug)]
pub struct GlobalVar {
    pub name: String,
    pub value: Value,
}

/// The global table is append-only once a name is defined. Lookup by
/// name scans from the back so later definitions shadow earlier ones.
#[derive(Debug, Default)]
pub struct GlobalTable {
    globals: Vec<GlobalVar>,
}

impl GlobalTable {
    pub fn new() -> Self {
        Self { globals: vec![] }
    }

    pub fn get(&self, index: usize) -> Result<Value, RuntimeErr> {
        match self.globals.get(index) {
            Some(var) => Ok(var.value),
            None => Err(RuntimeErr::new(RuntimeErrKind::UndefinedGlobal(index))),
        }
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), RuntimeErr> {
        match self.globals.get_mut(index) {
            Some(var) => {
                var.value = value;
                Ok(())
            }
            None => Err(RuntimeErr::new(RuntimeErrKind::UndefinedGlobal(index))),
        }
    }

    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.globals.iter().rposition(|var| var.name == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.globals.get(index).map(|var| var.name.as_str())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get_index(name).is_some()
    }

    /// Register a global, defaulting its value to the number 0. Does
    /// nothing if the name is already defined.
    pub fn define(&mut self, name: &str) {
        if !self.exists(name) {
            self.globals.push(GlobalVar { name: name.to_owned(), value: Value::Number(0.0) });
        }
    }

    /// Register a global with an initial value. Does nothing if the name
    /// is already defined.
    pub fn define_value(&mut self, name: &str, value: Value) {
        if !self.exists(name) {
            self.globals.push(GlobalVar { name: name.to_owned(), value });
        }
    }

    pub fn add_const(&mut self, name: &str, value: f64) {
        self.define_value(name, Value::Number(value));
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlobalVar> {
        self.globals.iter()
    }
}
