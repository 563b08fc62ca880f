use std::{cell::RefCell, collections::HashMap, rc::Rc};

use ember_core::sym::SymbolId;

use crate::val::Value;

/// One link of an environment chain. Lookups walk outward through `parent`
/// until the global scope, which has none.
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<SymbolId, Value>>,
    pub parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn global() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn with_bindings(parent: &Rc<Self>, bindings: HashMap<SymbolId, Value>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::new(bindings),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn lookup(&self, id: SymbolId) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(&id) {
            return Some(v.clone());
        }
        let mut cur = self.parent.as_ref();
        while let Some(scope) = cur {
            if let Some(v) = scope.vars.borrow().get(&id) {
                return Some(v.clone());
            }
            cur = scope.parent.as_ref();
        }
        None
    }

    /// Binds `id` in this scope, shadowing any outer binding.
    pub fn define(&self, id: SymbolId, val: Value) {
        self.vars.borrow_mut().insert(id, val);
    }

    /// Rebinds the innermost existing binding of `id`. Returns false when
    /// nothing in the chain binds it.
    pub fn set(&self, id: SymbolId, val: Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(&id) {
            *slot = val;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.set(id, val),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.vars.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.borrow().is_empty()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut depth = 0;
        let mut cur = self.parent.as_ref();
        while let Some(p) = cur {
            depth += 1;
            cur = p.parent.as_ref();
        }
        write!(f, "Scope {{ vars: {}, depth: {depth} }}", self.len())
    }
}
