use std::{collections::HashMap, rc::Rc};

use crate::{
    val::{NativeFunc, Value},
    vm::Vm,
};

/// Host callable: `(engine, name it was invoked as, args)`.
pub type NativeFn = fn(&mut Vm, &str, &[Value]) -> anyhow::Result<Value>;

/// Name -> native function table shared by an engine and its duplicates.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    funcs: HashMap<Rc<str>, NativeFunc>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last registration under a name wins.
    pub fn register(&mut self, name: &str, func: NativeFn) {
        let name: Rc<str> = Rc::from(name);
        let nf = NativeFunc {
            func,
            name: Rc::clone(&name),
        };
        if self.funcs.insert(Rc::clone(&name), nf).is_some() {
            log::warn!("builtin `{name}` re-registered, replacing previous definition");
        }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<NativeFunc> {
        self.funcs.get(name).cloned()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}
