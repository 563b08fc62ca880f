use std::{collections::HashMap, rc::Rc};

use ember_core::sym::SymbolId;

use crate::{err::RuntimeError, val::Value};

/// Hashable projection of a [Value]. Arrays and lists hash by a snapshot of
/// their contents taken when the key is stored. Mutating an array key later
/// (`aset!`) does not rehash the entry: it stays reachable under the old
/// contents only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Char(char),
    Str(Rc<str>),
    Symbol(SymbolId),
    Array(Vec<HashKey>),
    List(Vec<HashKey>, Option<Box<HashKey>>),
}

impl HashKey {
    pub fn from_value(v: &Value) -> anyhow::Result<Self> {
        let key = match v {
            Value::Null => HashKey::Null,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Int(n) => HashKey::Int(*n),
            Value::Float(n) => HashKey::Float(n.to_bits()),
            Value::Char(c) => HashKey::Char(*c),
            Value::Str(s) => HashKey::Str(Rc::clone(s)),
            Value::Symbol(sym) => HashKey::Symbol(sym.id()),
            Value::Array(arr) => HashKey::Array(
                arr.borrow()
                    .iter()
                    .map(HashKey::from_value)
                    .collect::<anyhow::Result<Vec<_>>>()?,
            ),
            Value::Pair(_) => {
                let mut items = Vec::new();
                let mut cur = v;
                let tail = loop {
                    match cur {
                        Value::Pair(p) => {
                            items.push(HashKey::from_value(&p.head)?);
                            cur = &p.tail;
                        }
                        Value::Null => break None,
                        other => break Some(Box::new(HashKey::from_value(other)?)),
                    }
                };
                HashKey::List(items, tail)
            }
            _ => return Err(RuntimeError::mismatch("hash", "hashable key", v).into()),
        };
        Ok(key)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    hkey: HashKey,
    key: Value,
    val: Value,
}

/// Value -> value map. Iterates in insertion order until an entry is deleted,
/// after which the last entry takes the deleted one's place.
#[derive(Debug, Clone, Default)]
pub struct HTable {
    index: HashMap<HashKey, usize>,
    entries: Vec<Entry>,
}

impl HTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from alternating keys and values.
    pub fn from_pairs(name: &str, kvs: &[Value]) -> anyhow::Result<Self> {
        if kvs.len() % 2 != 0 {
            return Err(RuntimeError::arity(name, "an even number", kvs.len()).into());
        }
        let mut table = Self::new();
        for kv in kvs.chunks_exact(2) {
            table.set(kv[0].clone(), kv[1].clone())?;
        }
        Ok(table)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> anyhow::Result<Option<Value>> {
        let hkey = HashKey::from_value(key)?;
        Ok(self.index.get(&hkey).map(|i| self.entries[*i].val.clone()))
    }

    pub fn set(&mut self, key: Value, val: Value) -> anyhow::Result<()> {
        let hkey = HashKey::from_value(&key)?;
        if let Some(i) = self.index.get(&hkey) {
            self.entries[*i].val = val;
        } else {
            self.index.insert(hkey.clone(), self.entries.len());
            self.entries.push(Entry { hkey, key, val });
        }
        Ok(())
    }

    /// Removes `key`, returning its value if it was present.
    pub fn delete(&mut self, key: &Value) -> anyhow::Result<Option<Value>> {
        let hkey = HashKey::from_value(key)?;
        let Some(i) = self.index.remove(&hkey) else {
            return Ok(None);
        };
        let removed = self.entries.swap_remove(i);
        if let Some(moved) = self.entries.get(i) {
            self.index.insert(moved.hkey.clone(), i);
        }
        Ok(Some(removed.val))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|e| (&e.key, &e.val))
    }
}
