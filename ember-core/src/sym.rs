use std::{collections::HashMap, fmt::Display, ops::Deref, rc::Rc};

/// Interned id of a symbol name. Two symbols with equal names always share an id
/// for the lifetime of the [SymbolTable] that produced them.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub(crate) usize);

impl SymbolId {
    pub const fn get(&self) -> usize {
        self.0
    }
}

impl Deref for SymbolId {
    type Target = usize;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A symbol as it travels through the value model: the interned id plus a shared
/// handle to its name so printing never needs the table.
#[derive(Debug, Clone)]
pub struct Symbol {
    id: SymbolId,
    name: Rc<str>,
}

impl Symbol {
    #[inline]
    pub const fn id(&self) -> SymbolId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Append-only name <-> id table. Populated while reading and compiling,
/// only read from while a program runs.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    ids: HashMap<Rc<str>, SymbolId>,
    names: Vec<Rc<str>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            ids: HashMap::with_capacity(cap),
            names: Vec::with_capacity(cap),
        }
    }

    /// Returns the symbol for `name`, allocating the next id on first sight.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(id) = self.ids.get(name) {
            return Symbol {
                id: *id,
                name: Rc::clone(&self.names[id.0]),
            };
        }

        let id = SymbolId(self.names.len());
        let name: Rc<str> = Rc::from(name);
        self.names.push(Rc::clone(&name));
        self.ids.insert(Rc::clone(&name), id);
        Symbol { id, name }
    }

    #[inline]
    pub fn get_id(&self, name: &str) -> Option<SymbolId> {
        self.ids.get(name).copied()
    }

    #[inline]
    pub fn lookup_id(&self, id: SymbolId) -> Option<Symbol> {
        let name = self.names.get(id.0)?;
        Some(Symbol {
            id,
            name: Rc::clone(name),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Deref for SymbolTable {
    type Target = [Rc<str>];

    fn deref(&self) -> &Self::Target {
        self.names.as_slice()
    }
}
