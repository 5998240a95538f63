//! MIR module: functions in declaration order.

use indexmap::IndexMap;

use crate::function::MirFunction;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirModule {
    pub name: String,
    pub functions: IndexMap<String, MirFunction>,
}

impl MirModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: IndexMap::new(),
        }
    }

    pub fn add_function(&mut self, function: MirFunction) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn function(&self, name: &str) -> Option<&MirFunction> {
        self.functions.get(name)
    }
}
